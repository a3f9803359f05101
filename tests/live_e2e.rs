#![cfg(feature = "strict-e2e")] // compile & run only when explicitly enabled

// Live smoke against the real aggregator feed. Enable via:
// `cargo test --features strict-e2e --test live_e2e`

use std::sync::Arc;

use gunsan_info_hub::feed::strategy::Strategy;
use gunsan_info_hub::feed::transport::HttpTransport;
use gunsan_info_hub::feed::types::FeedOutcome;
use gunsan_info_hub::feed::FeedFetcher;

#[tokio::test]
async fn live_city_feed_produces_normalized_items() {
    let fetcher = FeedFetcher::new(
        Arc::new(HttpTransport::new()),
        vec![Strategy::Direct],
        None,
    );
    let outcome = fetcher
        .fetch("https://news.google.com/rss/search?q=%EA%B5%B0%EC%82%B0&hl=ko&gl=KR&ceid=KR:ko")
        .await;

    match outcome {
        FeedOutcome::Fresh { items, .. } => {
            assert!(!items.is_empty(), "live feed should carry items");
            assert!(items.iter().all(|i| !i.link.is_empty()));
            assert!(items.iter().all(|i| !i.summary.is_empty()));
        }
        other => panic!("live fetch failed: {other:?}"),
    }
}
