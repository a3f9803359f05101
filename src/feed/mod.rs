// src/feed/mod.rs
//
// Feed Fetcher: retrieve an RSS document through an ordered list of access
// strategies, normalize every item, and degrade to a static dataset instead
// of surfacing errors to the caller.

pub mod fallback;
pub mod strategy;
pub mod transport;
pub mod types;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::feed::strategy::Strategy;
use crate::feed::transport::FeedTransport;
use crate::feed::types::{FeedError, FeedItem, FeedOutcome};

/// Longest trailing token still accepted as a source name when a title ends
/// with " - <token>". Longer tails are assumed to be part of the headline.
pub const SOURCE_SUFFIX_MAX_CHARS: usize = 20;

/// Character budget for item summaries.
pub const SUMMARY_MAX_CHARS: usize = 50;

pub const SUMMARY_PLACEHOLDER: &str = "내용을 보시려면 클릭하세요.";
pub const DEFAULT_SOURCE: &str = "Google News";
pub const MISSING_TITLE: &str = "제목 없음";

const JUST_NOW_LABEL: &str = "방금 전";
const RECENT_LABEL: &str = "최근";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_strategy_attempts_total",
            "Feed access strategy attempts."
        );
        describe_counter!(
            "feed_strategy_errors_total",
            "Feed strategy fetch/parse failures."
        );
        describe_counter!("feed_items_total", "Normalized feed items produced.");
        describe_counter!(
            "feed_fallback_total",
            "Fetches served from the static fallback dataset."
        );
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("feed_last_success_ts", "Unix ts of the last fresh fetch.");
    });
}

// ------------------------------------------------------------
// Fetcher
// ------------------------------------------------------------

pub struct FeedFetcher {
    transport: Arc<dyn FeedTransport>,
    strategies: Vec<Strategy>,
    fallback: Option<Vec<FeedItem>>,
}

impl FeedFetcher {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        strategies: Vec<Strategy>,
        fallback: Option<Vec<FeedItem>>,
    ) -> Self {
        Self {
            transport,
            strategies,
            fallback,
        }
    }

    /// Fetch and normalize `target`. Strategies are attempted strictly in
    /// order; the first success wins. Never returns an error: total failure
    /// is `Degraded` (when a fallback dataset exists) or `Unavailable`.
    pub async fn fetch(&self, target: &str) -> FeedOutcome {
        ensure_metrics_described();
        let now = Utc::now();

        for strategy in &self.strategies {
            counter!("feed_strategy_attempts_total").increment(1);
            match self.try_strategy(strategy, target, now).await {
                Ok(items) => {
                    counter!("feed_items_total").increment(items.len() as u64);
                    gauge!("feed_last_success_ts").set(now.timestamp() as f64);
                    return FeedOutcome::Fresh {
                        strategy: strategy.kind(),
                        items,
                    };
                }
                Err(e) => {
                    counter!("feed_strategy_errors_total").increment(1);
                    tracing::warn!(error = %e, strategy = ?strategy.kind(), "feed strategy failed");
                }
            }
        }

        match &self.fallback {
            Some(items) => {
                counter!("feed_fallback_total").increment(1);
                FeedOutcome::Degraded {
                    items: items.clone(),
                }
            }
            None => FeedOutcome::Unavailable,
        }
    }

    async fn try_strategy(
        &self,
        strategy: &Strategy,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<FeedItem>, FeedError> {
        let reply = self.transport.get(&strategy.request_url(target)).await?;
        if !(200..300).contains(&reply.status) {
            return Err(FeedError::Status(reply.status));
        }
        let raw = strategy.unwrap_body(reply.body)?;
        if !raw.trim_start().starts_with('<') {
            return Err(FeedError::Shape("body is not XML".into()));
        }
        parse_items(&raw, now)
    }
}

// ------------------------------------------------------------
// RSS document shape
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<SourceTag>,
    enclosure: Option<Enclosure>,
    #[serde(rename = "media:content")]
    media_content: Option<MediaContent>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceTag {
    #[serde(rename = "$text")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaContent {
    #[serde(rename = "@url")]
    url: Option<String>,
}

/// Parse a raw RSS body into normalized items. A malformed document is a
/// strategy failure, not a panic.
pub fn parse_items(xml: &str, now: DateTime<Utc>) -> Result<Vec<FeedItem>, FeedError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = quick_xml::de::from_str(&xml_clean)
        .map_err(|e| FeedError::Shape(format!("rss xml: {e}")))?;

    let mut out = Vec::with_capacity(rss.channel.items.len());
    for (idx, it) in rss.channel.items.into_iter().enumerate() {
        out.push(normalize_item(idx, it, now));
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("feed_parse_ms").record(ms);
    Ok(out)
}

fn normalize_item(idx: usize, it: Item, now: DateTime<Utc>) -> FeedItem {
    let image_url = extract_image(&it);

    let decoded_title = strip_html(it.title.as_deref().unwrap_or(MISSING_TITLE));
    let (title, split_source) = split_title_source(&decoded_title);

    let tag_source = it
        .source
        .and_then(|s| s.name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let source_name = split_source
        .or(tag_source)
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let link = it
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "#")
        .map(str::to_string)
        .unwrap_or_else(|| search_link(&title));

    FeedItem {
        id: format!("rss-{idx}"),
        published_display: relative_display(it.pub_date.as_deref(), now),
        summary: summarize(it.description.as_deref().unwrap_or_default()),
        title,
        source_name,
        link,
        image_url,
    }
}

// ------------------------------------------------------------
// Normalization helpers
// ------------------------------------------------------------

/// Decode HTML entities, drop tags, collapse whitespace.
pub fn strip_html(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Split "Headline - SourceName" into headline and source. Aggregator feeds
/// append the outlet after a dash; the length bound keeps headlines that
/// merely contain a dash intact.
pub fn split_title_source(title: &str) -> (String, Option<String>) {
    if let Some(pos) = title.rfind(" - ") {
        let suffix = title[pos + 3..].trim();
        if !suffix.is_empty() && suffix.chars().count() < SOURCE_SUFFIX_MAX_CHARS {
            return (
                title[..pos].trim_end().to_string(),
                Some(suffix.to_string()),
            );
        }
    }
    (title.to_string(), None)
}

/// HTML-strip and truncate a description to the summary budget.
pub fn summarize(description: &str) -> String {
    let text = strip_html(description);
    if text.is_empty() {
        return SUMMARY_PLACEHOLDER.to_string();
    }
    if text.chars().count() > SUMMARY_MAX_CHARS {
        let cut: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{}...", cut.trim_end())
    } else {
        text
    }
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    // Aggregator feeds stamp the obsolete "GMT"/"UT" zone; the parser wants
    // a numeric offset.
    let ts = ts.trim();
    let normalized = if let Some(head) = ts.strip_suffix(" GMT").or_else(|| ts.strip_suffix(" UT"))
    {
        format!("{head} +0000")
    } else {
        ts.to_string()
    };
    OffsetDateTime::parse(&normalized, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}

/// Relative Korean label for a publish date: "방금 전" under an hour,
/// "N시간 전" under a day, then a short KST month/day stamp.
pub fn relative_display(pub_date: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(ts) = pub_date.and_then(parse_rfc2822_to_unix) else {
        return RECENT_LABEL.to_string();
    };
    let diff = now.timestamp() - ts;
    if diff < 3600 {
        return JUST_NOW_LABEL.to_string();
    }
    let hours = diff / 3600;
    if hours < 24 {
        return format!("{hours}시간 전");
    }
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => {
            let kst = dt.with_timezone(&kst_offset());
            use chrono::Datelike;
            format!("{}/{}", kst.month(), kst.day())
        }
        None => RECENT_LABEL.to_string(),
    }
}

/// Web-search URL used when a feed item has no usable link.
pub fn search_link(title: &str) -> String {
    reqwest::Url::parse_with_params("https://www.google.com/search", [("q", title)])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| "https://www.google.com/search".to_string())
}

pub(crate) fn kst_offset() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("KST offset")
}

fn extract_image(it: &Item) -> Option<String> {
    if let Some(url) = it
        .enclosure
        .as_ref()
        .and_then(|e| e.url.clone())
        .filter(|u| !u.trim().is_empty())
    {
        return Some(url);
    }
    if let Some(url) = it
        .media_content
        .as_ref()
        .and_then(|m| m.url.clone())
        .filter(|u| !u.trim().is_empty())
    {
        return Some(url);
    }

    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re = RE_IMG
        .get_or_init(|| Regex::new(r#"(?is)<img[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());
    for html in [it.description.as_deref(), it.content_encoded.as_deref()]
        .into_iter()
        .flatten()
    {
        let decoded = html_escape::decode_html_entities(html);
        if let Some(cap) = re.captures(&decoded) {
            return Some(cap[1].to_string());
        }
    }
    None
}

/// Google News descriptions smuggle HTML entities that break strict XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
