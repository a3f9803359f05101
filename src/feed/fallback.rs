// src/feed/fallback.rs
//
// Curated placeholder headlines served when every access strategy fails.
// Entries carry a cached-origin label so the UI can tell degraded data apart.

use crate::feed::types::FeedItem;

pub const DEGRADED_SOURCE_LABEL: &str = "캐시된 뉴스";

const HEADLINES: &[(&str, &str)] = &[
    ("군산시, 내년 국가예산 확보 총력전... 국회 방문", "전북일보"),
    ("군산 은파호수공원, 맨발 걷기 산책로 조성 완료", "군산미래신문"),
    ("군산대, '글로컬대학30' 재도전 위한 혁신안 마련", "뉴스1"),
    ("새만금 이차전지 특화단지, 투자 유치 순항 중", "연합뉴스"),
    ("군산 선유도 해수욕장, 관광객 편의 시설 대폭 확충", "노컷뉴스"),
    ("군산시의회, 임시회 개회... 추경 예산안 심사", "KBS 전주"),
    ("군산 근대역사박물관, 주말 야간 개장 인기", "이뉴스투데이"),
    ("군산 철길마을, 레트로 감성 여행지로 각광", "여행신문"),
];

/// Build the static dataset fresh on each use; links point at a web search
/// for the headline since no article URL is known.
pub fn fallback_items() -> Vec<FeedItem> {
    HEADLINES
        .iter()
        .enumerate()
        .map(|(idx, (title, source))| FeedItem {
            id: format!("fallback-{idx}"),
            title: (*title).to_string(),
            source_name: format!("{source} ({DEGRADED_SOURCE_LABEL})"),
            link: super::search_link(title),
            published_display: "최근".to_string(),
            summary: format!("{title}에 대한 주요 내용이 보도되었습니다. 자세한 내용은 기사를 확인하세요."),
            image_url: None,
        })
        .collect()
}
