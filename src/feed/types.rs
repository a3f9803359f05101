// src/feed/types.rs
use serde::Serialize;
use thiserror::Error;

/// One normalized headline ready for the mobile front end.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub source_name: String,
    pub link: String,
    pub published_display: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Which network path produced a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Direct,
    JsonEnvelope,
    PassThrough,
}

/// Result of one fetch invocation. Never an error: total failure is a value.
///
/// `Fresh` with zero items is the "feed had no data" signal and is distinct
/// from `Degraded`, which means the static fallback dataset was served.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedOutcome {
    Fresh {
        strategy: StrategyKind,
        items: Vec<FeedItem>,
    },
    Degraded {
        items: Vec<FeedItem>,
    },
    Unavailable,
}

impl FeedOutcome {
    pub fn items(&self) -> &[FeedItem] {
        match self {
            FeedOutcome::Fresh { items, .. } | FeedOutcome::Degraded { items } => items,
            FeedOutcome::Unavailable => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FeedOutcome::Degraded { .. })
    }
}

/// Why a single strategy attempt failed. Decoded at the boundary, recovered
/// locally by advancing the strategy chain.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("upstream status {0}")]
    Status(u16),
    #[error("payload shape: {0}")]
    Shape(String),
}
