use std::sync::Arc;

use chrono::Utc;
use shuttle_axum::axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::alerts::AlertService;
use crate::briefing::BriefingService;
use crate::feed::types::FeedOutcome;
use crate::feed::FeedFetcher;
use crate::notify::{NotificationCenter, NotificationRecord};
use crate::tide::{TideOutcome, TideService};
use crate::weather::{WeatherOutcome, WeatherService};

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedFetcher>,
    pub briefing: Arc<BriefingService>,
    pub alerts: Arc<AlertService>,
    pub notifications: Arc<NotificationCenter>,
    pub weather: Arc<WeatherService>,
    pub tide: Arc<TideService>,
    pub news_feed_url: Arc<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/news", get(news))
        .route("/briefing", get(briefing))
        .route("/briefing/digest", get(digest))
        .route("/chat", post(chat))
        .route("/alerts/refresh", post(refresh_alerts))
        .route("/notifications", get(notifications))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}/dismiss", post(dismiss_toast))
        .route("/notifications/clear", post(clear_notifications))
        .route("/weather", get(weather))
        .route("/tides", get(tides))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn news(State(state): State<AppState>) -> Json<FeedOutcome> {
    Json(state.feed.fetch(&state.news_feed_url).await)
}

#[derive(serde::Serialize)]
struct BriefingResp {
    text: String,
}

async fn briefing(State(state): State<AppState>) -> Json<BriefingResp> {
    Json(BriefingResp {
        text: state.briefing.daily_greeting().await,
    })
}

#[derive(serde::Serialize)]
struct DigestResp {
    markdown: String,
}

async fn digest(State(state): State<AppState>) -> Json<DigestResp> {
    Json(DigestResp {
        markdown: state.briefing.daily_digest(&state.feed).await,
    })
}

#[derive(serde::Deserialize)]
struct ChatReq {
    message: String,
}

#[derive(serde::Serialize)]
struct ChatResp {
    reply: String,
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatReq>) -> Json<ChatResp> {
    Json(ChatResp {
        reply: state.briefing.chat_reply(&body.message).await,
    })
}

#[derive(serde::Serialize)]
struct RefreshResp {
    ingested: usize,
}

async fn refresh_alerts(State(state): State<AppState>) -> Json<RefreshResp> {
    Json(RefreshResp {
        ingested: state.alerts.refresh().await,
    })
}

#[derive(serde::Serialize)]
struct NotificationsResp {
    unread: usize,
    items: Vec<NotificationRecord>,
    active_toast: Option<NotificationRecord>,
}

async fn notifications(State(state): State<AppState>) -> Json<NotificationsResp> {
    let now = Utc::now();
    Json(NotificationsResp {
        unread: state.notifications.unread_count(),
        items: state.notifications.snapshot(),
        active_toast: state.notifications.active_toast(now),
    })
}

#[derive(serde::Serialize)]
struct AckResp {
    ok: bool,
}

async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> Json<AckResp> {
    Json(AckResp {
        ok: state.notifications.mark_read(&id),
    })
}

async fn dismiss_toast(State(state): State<AppState>, Path(id): Path<String>) -> Json<AckResp> {
    Json(AckResp {
        ok: state.notifications.dismiss_toast(&id),
    })
}

async fn clear_notifications(State(state): State<AppState>) -> Json<AckResp> {
    state.notifications.clear_all();
    Json(AckResp { ok: true })
}

async fn weather(State(state): State<AppState>) -> Json<WeatherOutcome> {
    Json(state.weather.fetch().await)
}

async fn tides(State(state): State<AppState>) -> Json<TideOutcome> {
    Json(state.tide.fetch().await)
}
