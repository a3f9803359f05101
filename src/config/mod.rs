// src/config/mod.rs
//
// One explicit configuration struct, built once at process start and injected
// into every service. Credentials use an "ENV" indirection so keys live in
// the deployment environment, never in the file or the client bundle. A
// missing file or missing key degrades with a warning; it never crashes.

use std::{env, fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::feed::strategy::Strategy;

const ENV_PATH: &str = "SERVICES_CONFIG_PATH";
const DEFAULT_JSON_PATH: &str = "config/services.json";
const DEFAULT_TOML_PATH: &str = "config/services.toml";

pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
pub const KMA_KEY_ENV: &str = "KMA_SERVICE_KEY";
pub const TIDE_KEY_ENV: &str = "TIDE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub genai: GenAiConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub tide: TideConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenAiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Candidate model identifiers in priority order.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Wall-clock budget for a whole generation run, seconds.
    #[serde(default = "default_budget_secs")]
    pub request_budget_secs: u64,
    /// Append the last error to user-visible fallback strings.
    #[serde(default)]
    pub debug_diagnostics: bool,
    /// "ENV" means: read from GEMINI_API_KEY.
    #[serde(default = "default_env_key")]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Search query for the city news tab.
    #[serde(default = "default_feed_query")]
    pub query: String,
    /// JSON-envelope CORS proxy base, attempted when listed in the order.
    #[serde(default = "default_json_proxy")]
    pub proxy_json_base: Option<String>,
    /// Raw pass-through relay base.
    #[serde(default)]
    pub proxy_relay_base: Option<String>,
    /// Strategy names in attempt order: "json_envelope", "pass_through",
    /// "direct". Unknown or unconfigured names are skipped with a warning.
    #[serde(default = "default_strategy_order")]
    pub strategy_order: Vec<String>,
    /// Serve the curated static dataset when every strategy fails.
    #[serde(default = "default_true")]
    pub use_fallback_dataset: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// "ENV" means: read from KMA_SERVICE_KEY.
    #[serde(default = "default_env_key")]
    pub service_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TideConfig {
    /// "ENV" means: read from TIDE_API_KEY.
    #[serde(default = "default_env_key")]
    pub service_key: String,
    #[serde(default = "default_station_code")]
    pub station_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_toast_ttl")]
    pub toast_ttl_secs: i64,
    /// Cooldown for the near-duplicate alert title guard.
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown_secs: i64,
}

fn default_true() -> bool {
    true
}
fn default_env_key() -> String {
    "ENV".to_string()
}
fn default_models() -> Vec<String> {
    vec![
        "gemini-2.0-flash".to_string(),
        "gemini-1.5-flash".to_string(),
        "gemini-1.5-flash-8b".to_string(),
    ]
}
fn default_budget_secs() -> u64 {
    8
}
fn default_feed_query() -> String {
    "군산".to_string()
}
fn default_json_proxy() -> Option<String> {
    Some("https://api.allorigins.win/get".to_string())
}
fn default_strategy_order() -> Vec<String> {
    vec!["json_envelope".to_string(), "direct".to_string()]
}
fn default_station_code() -> String {
    "DT_0018".to_string()
}
fn default_toast_ttl() -> i64 {
    5
}
fn default_alert_cooldown() -> i64 {
    3_600
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            models: default_models(),
            request_budget_secs: default_budget_secs(),
            debug_diagnostics: false,
            api_key: default_env_key(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            query: default_feed_query(),
            proxy_json_base: default_json_proxy(),
            proxy_relay_base: None,
            strategy_order: default_strategy_order(),
            use_fallback_dataset: true,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            service_key: default_env_key(),
        }
    }
}

impl Default for TideConfig {
    fn default() -> Self {
        Self {
            service_key: default_env_key(),
            station_code: default_station_code(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            toast_ttl_secs: default_toast_ttl(),
            alert_cooldown_secs: default_alert_cooldown(),
        }
    }
}

impl AppConfig {
    /// Load using env var + fallbacks:
    /// 1) $SERVICES_CONFIG_PATH
    /// 2) config/services.json
    /// 3) config/services.toml
    /// Anything missing or unreadable degrades to defaults with a warning.
    pub fn load_default() -> Self {
        let mut cfg = if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            match Self::load_from_file(&pb) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(error = ?e, path = %pb.display(), "config load failed; using defaults");
                    Self::default()
                }
            }
        } else {
            [DEFAULT_JSON_PATH, DEFAULT_TOML_PATH]
                .iter()
                .map(Path::new)
                .find(|p| p.exists())
                .and_then(|p| match Self::load_from_file(p) {
                    Ok(cfg) => Some(cfg),
                    Err(e) => {
                        tracing::warn!(error = ?e, path = %p.display(), "config load failed; using defaults");
                        None
                    }
                })
                .unwrap_or_default()
        };
        cfg.resolve();
        cfg
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading services config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if ext == "toml" {
            toml::from_str(&content).context("parsing services config toml")
        } else {
            serde_json::from_str(&content).context("parsing services config json")
        }
    }

    /// Resolve "ENV" credential indirections and clamp nonsense values.
    pub fn resolve(&mut self) {
        self.genai.api_key = resolve_key(&self.genai.api_key, GEMINI_KEY_ENV, "generative");
        self.weather.service_key = resolve_key(&self.weather.service_key, KMA_KEY_ENV, "weather");
        self.tide.service_key = resolve_key(&self.tide.service_key, TIDE_KEY_ENV, "tide");

        if self.genai.models.is_empty() {
            self.genai.models = default_models();
        }
        if !(1..=60).contains(&self.genai.request_budget_secs) {
            self.genai.request_budget_secs = default_budget_secs();
        }
        if self.notify.toast_ttl_secs <= 0 {
            self.notify.toast_ttl_secs = default_toast_ttl();
        }
        if self.notify.alert_cooldown_secs <= 0 {
            self.notify.alert_cooldown_secs = default_alert_cooldown();
        }
    }

    /// The city news feed this deployment serves.
    pub fn news_feed_url(&self) -> String {
        reqwest::Url::parse_with_params(
            "https://news.google.com/rss/search",
            [
                ("q", self.feed.query.as_str()),
                ("hl", "ko"),
                ("gl", "KR"),
                ("ceid", "KR:ko"),
            ],
        )
        .map(|u| u.to_string())
        .unwrap_or_else(|_| "https://news.google.com/rss".to_string())
    }

    /// Strategies in configured order, skipping names whose proxy base is
    /// not configured.
    pub fn feed_strategies(&self) -> Vec<Strategy> {
        let mut out = Vec::new();
        for name in &self.feed.strategy_order {
            match name.as_str() {
                "direct" => out.push(Strategy::Direct),
                "json_envelope" => match &self.feed.proxy_json_base {
                    Some(base) => out.push(Strategy::JsonEnvelope { base: base.clone() }),
                    None => tracing::warn!("json_envelope listed but no proxy_json_base set"),
                },
                "pass_through" => match &self.feed.proxy_relay_base {
                    Some(base) => out.push(Strategy::PassThrough { base: base.clone() }),
                    None => tracing::warn!("pass_through listed but no proxy_relay_base set"),
                },
                other => tracing::warn!(name = other, "unknown feed strategy name skipped"),
            }
        }
        if out.is_empty() {
            out.push(Strategy::Direct);
        }
        out
    }
}

/// "ENV" → read the named variable; a literal value passes through. A
/// missing variable yields an empty key and a warning so the owning service
/// can degrade instead of the process dying.
fn resolve_key(configured: &str, var: &str, what: &str) -> String {
    if configured.trim().eq_ignore_ascii_case("env") {
        match env::var(var) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => {
                tracing::warn!(var, "{what} credential missing; service will degrade");
                String::new()
            }
        }
    } else {
        configured.to_string()
    }
}
