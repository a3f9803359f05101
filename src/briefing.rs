// src/briefing.rs
//
// Daily briefing and chat: the two human-facing callers of the Generative
// Request Runner, plus the markdown digest assembled from live feeds and the
// exchange-rate endpoint. Every path ends in a display-safe string.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, Utc, Weekday};
use serde::Deserialize;

use crate::feed::{kst_offset, FeedFetcher};
use crate::genai::{GenAiRunner, GenError, GenOutcome, GenReply, GenRequest};

pub const SLOW_SERVICE_PLACEHOLDER: &str =
    "오늘도 활기찬 군산의 하루가 시작되었습니다! (연결 지연으로 기본 인사가 제공됩니다)";
const FAILURE_GREETING: &str = "오늘도 행복한 하루 보내세요! (데이터를 불러오는데 실패했습니다)";
pub const CHAT_FAILURE_REPLY: &str = "네트워크가 좀 느린가벼. 다시 한번 말해줄래요?";
const CHAT_EMPTY_REPLY: &str =
    "죄송해유, 지금은 대답하기가 좀 거시기하네요. 잠시 뒤에 다시 물어봐주세요.";

const CHAT_PERSONA: &str = "당신은 전라북도 군산시에 거주하는 주민들을 위한 친절한 '군산 AI 비서'입니다. \
군산의 뉴스, 날씨, 생활 정보를 거주민 입장에서 간결하고 따뜻하게 안내하고, 군산 사투리를 아주 살짝 섞어 친근감을 줍니다.";

const NATIONAL_FEED_URL: &str = "https://news.google.com/rss?hl=ko&gl=KR&ceid=KR:ko";
const PROVINCE_FEED_URL: &str =
    "https://news.google.com/rss/search?q=전북&hl=ko&gl=KR&ceid=KR:ko";
const CITY_FEED_URL: &str = "https://news.google.com/rss/search?q=군산&hl=ko&gl=KR&ceid=KR:ko";

const EXCHANGE_RATE_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

pub struct BriefingService {
    runner: Arc<GenAiRunner>,
    http: reqwest::Client,
    debug_diagnostics: bool,
}

impl BriefingService {
    pub fn new(runner: Arc<GenAiRunner>, debug_diagnostics: bool) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("gunsan-info-hub/0.1 (+github.com/gunsan-hub/gunsan-info-hub)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            runner,
            http,
            debug_diagnostics,
        }
    }

    /// Morning greeting for the home screen. Search tools stay off here: the
    /// dated context is already in the prompt, and a tool failure would cost
    /// the greeting.
    pub async fn daily_greeting(&self) -> String {
        let date_str = korean_date(now_kst());
        let prompt = format!(
            "오늘은 {date_str}입니다. 전라북도 군산 시민들에게 건네는 따뜻하고 활기찬 아침 인사말을 \
             3문장 이내로 작성해줘. (군산 사투리 '거시기', '~했어유' 등을 아주 살짝 섞어서 친근하게)"
        );

        match self
            .runner
            .run(GenRequest {
                prompt,
                ..Default::default()
            })
            .await
        {
            GenOutcome::Ok(reply) => reply.text,
            GenOutcome::TimedOut => SLOW_SERVICE_PLACEHOLDER.to_string(),
            GenOutcome::Failed(e) => self.failure_greeting(&date_str, &e),
        }
    }

    /// The greeting shown when every candidate model failed. Always carries
    /// the date; the last error only when operator diagnostics are on.
    fn failure_greeting(&self, date_str: &str, err: &GenError) -> String {
        if self.debug_diagnostics {
            format!("{date_str}, {FAILURE_GREETING} [{err}]")
        } else {
            format!("{date_str}, {FAILURE_GREETING}")
        }
    }

    /// One chat turn with the resident-assistant persona, web search enabled.
    pub async fn chat_reply(&self, message: &str) -> String {
        let prompt = format!("{CHAT_PERSONA}\n\n사용자: {message}");
        match self
            .runner
            .run(GenRequest {
                prompt,
                enable_search: true,
                response_schema: None,
            })
            .await
        {
            GenOutcome::Ok(reply) => render_chat_reply(reply),
            GenOutcome::TimedOut | GenOutcome::Failed(_) => CHAT_FAILURE_REPLY.to_string(),
        }
    }

    /// Markdown digest: dated header, exchange rate, three news sections.
    pub async fn daily_digest(&self, feeds: &FeedFetcher) -> String {
        let date_str = korean_long_date(now_kst());
        let rate = self.fetch_usd_krw().await;

        let national = feeds.fetch(NATIONAL_FEED_URL).await;
        let province = feeds.fetch(PROVINCE_FEED_URL).await;
        let city = feeds.fetch(CITY_FEED_URL).await;

        let sections = [
            ("🇰🇷 대한민국 주요 뉴스", &national, 10usize),
            ("🚩 전북특별자치도 뉴스", &province, 5),
            ("⚓ 군산시 주요 뉴스", &city, 5),
        ];
        compose_digest(&date_str, rate, &sections)
    }

    async fn fetch_usd_krw(&self) -> Option<f64> {
        #[derive(Deserialize)]
        struct ExchangeResp {
            rates: Rates,
        }
        #[derive(Deserialize)]
        struct Rates {
            #[serde(rename = "KRW")]
            krw: f64,
        }

        let resp = self.http.get(EXCHANGE_RATE_URL).send().await.ok()?;
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "exchange rate endpoint unhappy");
            return None;
        }
        resp.json::<ExchangeResp>().await.ok().map(|r| r.rates.krw)
    }
}

fn render_chat_reply(reply: GenReply) -> String {
    let mut text = if reply.text.trim().is_empty() {
        CHAT_EMPTY_REPLY.to_string()
    } else {
        reply.text
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let links: Vec<String> = reply
        .grounding
        .iter()
        .filter(|l| seen.insert(l.uri.as_str()))
        .map(|l| format!("- [{}]({})", l.title, l.uri))
        .collect();
    if !links.is_empty() {
        text.push_str("\n\n**관련 정보:**\n");
        text.push_str(&links.join("\n"));
    }
    text
}

/// Assemble the digest markdown from already-fetched sections. Pure so the
/// layout is testable without the network.
pub fn compose_digest(
    date_str: &str,
    usd_krw: Option<f64>,
    sections: &[(&str, &crate::feed::types::FeedOutcome, usize)],
) -> String {
    let mut md = format!("# 📅 {date_str} 브리핑\n\n");

    md.push_str("### 💰 경제 지표\n");
    match usd_krw {
        Some(rate) => {
            md.push_str(&format!("- *원/달러 환율*: **{rate:.2}원**\n"));
            md.push_str("- *증시/유가*: [네이버 증권 확인하기](https://m.stock.naver.com)\n\n");
        }
        None => md.push_str("- 데이터 수신 실패\n\n"),
    }
    md.push_str("---\n\n");

    for (heading, outcome, limit) in sections {
        md.push_str(&format!("### {heading}\n"));
        let items = outcome.items();
        if items.is_empty() {
            md.push_str("뉴스 데이터를 불러오는 중 오류가 발생했습니다.\n\n");
            continue;
        }
        for (i, item) in items.iter().take(*limit).enumerate() {
            md.push_str(&format!("{}. [{}]({})\n", i + 1, item.title, item.link));
        }
        md.push('\n');
    }

    md.push_str("---\n*이 브리핑은 실시간 데이터를 기반으로 자동 생성되었습니다.*");
    md
}

fn now_kst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&kst_offset())
}

/// "2025년 6월 10일"
pub fn korean_date(dt: DateTime<FixedOffset>) -> String {
    format!("{}년 {}월 {}일", dt.year(), dt.month(), dt.day())
}

/// "2025년 6월 10일 화요일"
pub fn korean_long_date(dt: DateTime<FixedOffset>) -> String {
    format!("{} {}", korean_date(dt), korean_weekday(dt.weekday()))
}

pub fn korean_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "월요일",
        Weekday::Tue => "화요일",
        Weekday::Wed => "수요일",
        Weekday::Thu => "목요일",
        Weekday::Fri => "금요일",
        Weekday::Sat => "토요일",
        Weekday::Sun => "일요일",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::{FeedItem, FeedOutcome, StrategyKind};
    use crate::genai::GroundingLink;

    fn item(n: usize) -> FeedItem {
        FeedItem {
            id: format!("rss-{n}"),
            title: format!("헤드라인 {n}"),
            source_name: "테스트".into(),
            link: format!("https://news.test/{n}"),
            published_display: "방금 전".into(),
            summary: "요약".into(),
            image_url: None,
        }
    }

    #[test]
    fn digest_lists_items_up_to_the_section_limit() {
        let outcome = FeedOutcome::Fresh {
            strategy: StrategyKind::Direct,
            items: (0..7).map(item).collect(),
        };
        let md = compose_digest(
            "2025년 6월 10일 화요일",
            Some(1385.2),
            &[("⚓ 군산시 주요 뉴스", &outcome, 5)],
        );
        assert!(md.contains("# 📅 2025년 6월 10일 화요일 브리핑"));
        assert!(md.contains("**1385.20원**"));
        assert!(md.contains("5. [헤드라인 4](https://news.test/4)"));
        assert!(!md.contains("헤드라인 5"));
    }

    #[test]
    fn digest_degrades_per_section_and_for_the_rate() {
        let empty = FeedOutcome::Unavailable;
        let md = compose_digest("2025년 6월 10일", None, &[("🇰🇷 대한민국 주요 뉴스", &empty, 10)]);
        assert!(md.contains("- 데이터 수신 실패"));
        assert!(md.contains("뉴스 데이터를 불러오는 중 오류가 발생했습니다."));
    }

    #[test]
    fn chat_reply_appends_deduplicated_grounding_links() {
        let reply = GenReply {
            text: "은파호수공원이 좋아유.".into(),
            grounding: vec![
                GroundingLink {
                    title: "군산시청".into(),
                    uri: "https://gunsan.go.kr".into(),
                },
                GroundingLink {
                    title: "군산시청(중복)".into(),
                    uri: "https://gunsan.go.kr".into(),
                },
                GroundingLink {
                    title: "관광공사".into(),
                    uri: "https://visit.test".into(),
                },
            ],
        };
        let out = render_chat_reply(reply);
        assert!(out.starts_with("은파호수공원이 좋아유."));
        assert!(out.contains("**관련 정보:**"));
        assert_eq!(out.matches("https://gunsan.go.kr").count(), 1);
        assert!(out.contains("- [관광공사](https://visit.test)"));
    }

    #[test]
    fn empty_chat_text_gets_the_polite_fallback() {
        let out = render_chat_reply(GenReply::default());
        assert!(out.starts_with(CHAT_EMPTY_REPLY));
    }
}
