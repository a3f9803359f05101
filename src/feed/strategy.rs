// src/feed/strategy.rs
use serde::Deserialize;

use crate::feed::types::{FeedError, StrategyKind};

/// One network path to a feed: fetch it directly, through a JSON-wrapping
/// CORS proxy, or through a raw pass-through proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    /// AllOrigins-style proxy: reply is `{"contents": "...", "status": {"http_code": N}}`.
    JsonEnvelope { base: String },
    /// Server-side relay that returns the upstream body untouched.
    PassThrough { base: String },
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Direct => StrategyKind::Direct,
            Strategy::JsonEnvelope { .. } => StrategyKind::JsonEnvelope,
            Strategy::PassThrough { .. } => StrategyKind::PassThrough,
        }
    }

    /// URL actually requested for `target` under this strategy.
    pub fn request_url(&self, target: &str) -> String {
        match self {
            Strategy::Direct => target.to_string(),
            Strategy::JsonEnvelope { base } | Strategy::PassThrough { base } => {
                reqwest::Url::parse_with_params(base, [("url", target)])
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| format!("{base}?url={target}"))
            }
        }
    }

    /// Strip the strategy's response envelope down to the raw feed body.
    pub fn unwrap_body(&self, body: String) -> Result<String, FeedError> {
        match self {
            Strategy::Direct | Strategy::PassThrough { .. } => Ok(body),
            Strategy::JsonEnvelope { .. } => {
                #[derive(Deserialize)]
                struct Envelope {
                    contents: Option<String>,
                    #[serde(default)]
                    status: Option<EnvelopeStatus>,
                }
                #[derive(Deserialize)]
                struct EnvelopeStatus {
                    http_code: Option<u16>,
                }

                let env: Envelope = serde_json::from_str(&body)
                    .map_err(|e| FeedError::Shape(format!("proxy envelope: {e}")))?;
                if let Some(code) = env.status.and_then(|s| s.http_code) {
                    if code >= 400 {
                        return Err(FeedError::Status(code));
                    }
                }
                env.contents
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| FeedError::Shape("proxy envelope missing contents".into()))
            }
        }
    }
}
