// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod alerts;
pub mod api;
pub mod briefing;
pub mod config;
pub mod feed;
pub mod genai;
pub mod metrics;
pub mod notify;
pub mod tide;
pub mod weather;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::feed::types::{FeedItem, FeedOutcome};
pub use crate::notify::{AlertDraft, NotificationCenter, NotificationKind};

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::alerts::AlertService;
use crate::briefing::BriefingService;
use crate::feed::transport::HttpTransport;
use crate::feed::FeedFetcher;
use crate::genai::backend::{DisabledBackend, GenBackend, GeminiBackend};
use crate::genai::GenAiRunner;
use crate::tide::TideService;
use crate::weather::WeatherService;

/// Wire every service from one resolved configuration. All shared state is
/// explicit `Arc`s handed into the router; no module-level singletons.
pub fn build_state(config: &AppConfig) -> AppState {
    let transport = Arc::new(HttpTransport::new());
    let fallback = config
        .feed
        .use_fallback_dataset
        .then(feed::fallback::fallback_items);
    let feed = Arc::new(FeedFetcher::new(
        transport,
        config.feed_strategies(),
        fallback,
    ));

    let backend: Arc<dyn GenBackend> = if config.genai.enabled && !config.genai.api_key.is_empty()
    {
        Arc::new(GeminiBackend::new(config.genai.api_key.clone()))
    } else {
        tracing::warn!("generative service disabled or unconfigured; fallback strings only");
        Arc::new(DisabledBackend)
    };
    let runner = Arc::new(GenAiRunner::new(
        backend,
        config.genai.models.clone(),
        Duration::from_secs(config.genai.request_budget_secs),
    ));

    let notifications = Arc::new(NotificationCenter::new(config.notify.toast_ttl_secs));
    let alerts = Arc::new(AlertService::new(
        runner.clone(),
        notifications.clone(),
        config.notify.alert_cooldown_secs,
    ));
    let briefing = Arc::new(BriefingService::new(
        runner.clone(),
        config.genai.debug_diagnostics,
    ));

    let weather = Arc::new(WeatherService::new(some_key(&config.weather.service_key)));
    let tide = Arc::new(TideService::new(
        some_key(&config.tide.service_key),
        config.tide.station_code.clone(),
    ));

    AppState {
        feed,
        briefing,
        alerts,
        notifications,
        weather,
        tide,
        news_feed_url: Arc::new(config.news_feed_url()),
    }
}

/// Build the full application router: API + Prometheus `/metrics`.
pub async fn app() -> shuttle_axum::axum::Router {
    let config = AppConfig::load_default();
    let state = build_state(&config);
    let metrics = metrics::Metrics::init();
    api::create_router(state).merge(metrics.router())
}

/// One-off smoke test of the generative ladder after boot. It won't panic on
/// failure; it just logs the result.
pub async fn run_genai_quick_probe() {
    let config = AppConfig::load_default();
    let state = build_state(&config);
    let greeting = state.briefing.daily_greeting().await;
    info!(chars = greeting.chars().count(), "genai quick probe finished");
}

fn some_key(key: &str) -> Option<String> {
    let trimmed = key.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
