// tests/feed_strategies.rs
//
// Strategy-chain behavior of the Feed Fetcher: ordered fallback across
// access strategies, the static dataset as last resort, and the distinct
// "no data" signal for empty-but-valid feeds.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gunsan_info_hub::feed::fallback::{fallback_items, DEGRADED_SOURCE_LABEL};
use gunsan_info_hub::feed::strategy::Strategy;
use gunsan_info_hub::feed::transport::{FeedTransport, TransportReply};
use gunsan_info_hub::feed::types::{FeedError, FeedOutcome, StrategyKind};
use gunsan_info_hub::feed::FeedFetcher;

/// Serves scripted replies in order; records every requested URL.
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<TransportReply, FeedError>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<TransportReply, FeedError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<TransportReply, FeedError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FeedError::Transport("script exhausted".into())))
    }
}

fn ok(body: &str) -> Result<TransportReply, FeedError> {
    Ok(TransportReply {
        status: 200,
        body: body.to_string(),
    })
}

fn status(code: u16) -> Result<TransportReply, FeedError> {
    Ok(TransportReply {
        status: code,
        body: String::new(),
    })
}

fn rss_with_items(n: usize) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>"#);
    for i in 0..n {
        xml.push_str(&format!(
            "<item><title>기사 {i} - 테스트일보</title>\
             <link>https://news.test/{i}</link>\
             <description>군산 지역 소식 {i}</description>\
             <pubDate>Tue, 10 Jun 2025 01:00:00 GMT</pubDate></item>"
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}

fn two_strategies() -> Vec<Strategy> {
    vec![
        Strategy::PassThrough {
            base: "https://relay-a.test/news".into(),
        },
        Strategy::PassThrough {
            base: "https://relay-b.test/news".into(),
        },
    ]
}

const TARGET: &str = "https://news.test/rss?q=%EA%B5%B0%EC%82%B0";

#[tokio::test]
async fn primary_500_falls_through_to_secondary_with_full_items() {
    let transport = ScriptedTransport::new(vec![status(500), ok(&rss_with_items(12))]);
    let fetcher = FeedFetcher::new(
        transport.clone(),
        two_strategies(),
        Some(fallback_items()),
    );

    let outcome = fetcher.fetch(TARGET).await;
    match &outcome {
        FeedOutcome::Fresh { strategy, items } => {
            assert_eq!(*strategy, StrategyKind::PassThrough);
            assert_eq!(items.len(), 12);
            // Normalization happened on the way through.
            assert_eq!(items[0].title, "기사 0");
            assert_eq!(items[0].source_name, "테스트일보");
        }
        other => panic!("expected Fresh via secondary, got {other:?}"),
    }
    assert!(!outcome.is_degraded(), "fallback dataset must not be used");
    assert_eq!(transport.requests().len(), 2);
    assert!(transport.requests()[0].starts_with("https://relay-a.test/news?url="));
    assert!(transport.requests()[1].starts_with("https://relay-b.test/news?url="));
}

#[tokio::test]
async fn malformed_xml_advances_to_the_next_strategy() {
    let transport = ScriptedTransport::new(vec![
        ok("<rss><channel><item><title>unclosed"),
        ok(&rss_with_items(2)),
    ]);
    let fetcher = FeedFetcher::new(transport, two_strategies(), None);

    match fetcher.fetch(TARGET).await {
        FeedOutcome::Fresh { items, .. } => assert_eq!(items.len(), 2),
        other => panic!("expected recovery on second strategy, got {other:?}"),
    }
}

#[tokio::test]
async fn non_xml_body_counts_as_a_strategy_failure() {
    let transport = ScriptedTransport::new(vec![
        ok("Internal error page, definitely not XML"),
        ok(&rss_with_items(1)),
    ]);
    let fetcher = FeedFetcher::new(transport, two_strategies(), None);

    match fetcher.fetch(TARGET).await {
        FeedOutcome::Fresh { items, .. } => assert_eq!(items.len(), 1),
        other => panic!("expected Fresh, got {other:?}"),
    }
}

#[tokio::test]
async fn total_failure_with_fallback_serves_degraded_dataset() {
    let transport = ScriptedTransport::new(vec![
        Err(FeedError::Transport("connection refused".into())),
        status(502),
    ]);
    let fetcher = FeedFetcher::new(transport, two_strategies(), Some(fallback_items()));

    match fetcher.fetch(TARGET).await {
        FeedOutcome::Degraded { items } => {
            assert!(!items.is_empty());
            // Every entry is relabeled to show its cached origin.
            assert!(items
                .iter()
                .all(|i| i.source_name.contains(DEGRADED_SOURCE_LABEL)));
            assert!(items.iter().all(|i| !i.link.is_empty()));
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
}

#[tokio::test]
async fn total_failure_without_fallback_is_unavailable() {
    let transport = ScriptedTransport::new(vec![status(500), status(500)]);
    let fetcher = FeedFetcher::new(transport, two_strategies(), None);

    assert_eq!(fetcher.fetch(TARGET).await, FeedOutcome::Unavailable);
}

#[tokio::test]
async fn empty_feed_is_fresh_no_data_not_fallback() {
    let transport = ScriptedTransport::new(vec![ok(&rss_with_items(0))]);
    let fetcher = FeedFetcher::new(
        transport,
        vec![Strategy::Direct],
        Some(fallback_items()),
    );

    match fetcher.fetch(TARGET).await {
        FeedOutcome::Fresh { items, .. } => assert!(items.is_empty()),
        other => panic!("zero items must stay Fresh, got {other:?}"),
    }
}

#[tokio::test]
async fn json_envelope_strategy_unwraps_contents() {
    let inner = rss_with_items(3).replace('"', "\\\"");
    let body = format!(r#"{{"contents":"{inner}","status":{{"http_code":200}}}}"#);
    let transport = ScriptedTransport::new(vec![ok(&body)]);
    let fetcher = FeedFetcher::new(
        transport,
        vec![Strategy::JsonEnvelope {
            base: "https://proxy.test/get".into(),
        }],
        None,
    );

    match fetcher.fetch(TARGET).await {
        FeedOutcome::Fresh { strategy, items } => {
            assert_eq!(strategy, StrategyKind::JsonEnvelope);
            assert_eq!(items.len(), 3);
        }
        other => panic!("expected Fresh via envelope, got {other:?}"),
    }
}

#[tokio::test]
async fn envelope_reporting_an_upstream_error_falls_through() {
    let wrapped_error = r#"{"contents":"<html>bad gateway</html>","status":{"http_code":502}}"#;
    let transport = ScriptedTransport::new(vec![ok(wrapped_error), ok(&rss_with_items(4))]);
    let fetcher = FeedFetcher::new(
        transport,
        vec![
            Strategy::JsonEnvelope {
                base: "https://proxy.test/get".into(),
            },
            Strategy::Direct,
        ],
        None,
    );

    match fetcher.fetch(TARGET).await {
        FeedOutcome::Fresh { strategy, items } => {
            assert_eq!(strategy, StrategyKind::Direct);
            assert_eq!(items.len(), 4);
        }
        other => panic!("expected Fresh via direct, got {other:?}"),
    }
}
