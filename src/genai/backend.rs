// src/genai/backend.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::genai::{GenError, GenReply, GenRequest, GroundingLink};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Low-level provider: performs one real generation call against one model.
/// Separated behind a trait so tests and the disabled path share the runner.
#[async_trait]
pub trait GenBackend: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        tools_enabled: bool,
        req: &GenRequest,
    ) -> Result<GenReply, GenError>;

    fn name(&self) -> &'static str;
}

/// Gemini-style `models/{model}:generateContent` REST backend.
pub struct GeminiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// `base_url` override exists for tests and self-hosted gateways.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("gunsan-info-hub/0.1 (+github.com/gunsan-hub/gunsan-info-hub)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl GenBackend for GeminiBackend {
    async fn generate(
        &self,
        model: &str,
        tools_enabled: bool,
        req: &GenRequest,
    ) -> Result<GenReply, GenError> {
        if self.api_key.is_empty() {
            return Err(GenError::Transport(
                "generative service credential not configured".into(),
            ));
        }

        #[derive(Serialize)]
        struct Body<'a> {
            contents: Vec<Content<'a>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            tools: Option<Vec<Tool>>,
            #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
            generation_config: Option<GenerationConfig<'a>>,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Tool {
            google_search: serde_json::Value,
        }
        #[derive(Serialize)]
        struct GenerationConfig<'a> {
            #[serde(rename = "responseMimeType")]
            response_mime_type: &'a str,
            #[serde(rename = "responseSchema")]
            response_schema: &'a serde_json::Value,
        }

        let body = Body {
            contents: vec![Content {
                parts: vec![Part { text: &req.prompt }],
            }],
            tools: tools_enabled.then(|| {
                vec![Tool {
                    google_search: serde_json::json!({}),
                }]
            }),
            generation_config: req.response_schema.as_ref().map(|schema| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| GenError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| GenError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, upstream_detail(&text)));
        }
        decode_reply(&text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Always fails with a transport error; used when the service is disabled or
/// unconfigured so every caller degrades to its fallback string.
pub struct DisabledBackend;

#[async_trait]
impl GenBackend for DisabledBackend {
    async fn generate(
        &self,
        _model: &str,
        _tools_enabled: bool,
        _req: &GenRequest,
    ) -> Result<GenReply, GenError> {
        Err(GenError::Transport("generative service disabled".into()))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed-reply backend for tests and local runs.
#[derive(Clone)]
pub struct MockBackend {
    pub fixed: GenReply,
}

#[async_trait]
impl GenBackend for MockBackend {
    async fn generate(
        &self,
        _model: &str,
        _tools_enabled: bool,
        _req: &GenRequest,
    ) -> Result<GenReply, GenError> {
        Ok(self.fixed.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn classify_status(status: u16, detail: String) -> GenError {
    match status {
        429 => GenError::Quota(detail),
        404 => GenError::UnknownModel(detail),
        _ => GenError::Upstream { status, detail },
    }
}

fn upstream_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ApiError {
        error: ApiErrorBody,
    }
    #[derive(Deserialize)]
    struct ApiErrorBody {
        message: Option<String>,
    }

    serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| {
            let mut s = body.trim().to_string();
            if s.chars().count() > 200 {
                s = s.chars().take(200).collect();
            }
            s
        })
}

fn decode_reply(body: &str) -> Result<GenReply, GenError> {
    #[derive(Deserialize)]
    struct Resp {
        #[serde(default)]
        candidates: Vec<Candidate>,
    }
    #[derive(Deserialize)]
    struct Candidate {
        content: Option<RespContent>,
        #[serde(rename = "groundingMetadata")]
        grounding_metadata: Option<GroundingMetadata>,
    }
    #[derive(Deserialize)]
    struct RespContent {
        #[serde(default)]
        parts: Vec<RespPart>,
    }
    #[derive(Deserialize)]
    struct RespPart {
        text: Option<String>,
    }
    #[derive(Deserialize)]
    struct GroundingMetadata {
        #[serde(rename = "groundingChunks", default)]
        grounding_chunks: Vec<GroundingChunk>,
    }
    #[derive(Deserialize)]
    struct GroundingChunk {
        web: Option<WebSource>,
    }
    #[derive(Deserialize)]
    struct WebSource {
        uri: Option<String>,
        title: Option<String>,
    }

    let resp: Resp =
        serde_json::from_str(body).map_err(|e| GenError::Shape(format!("response json: {e}")))?;
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Err(GenError::Shape("no candidates in response".into()));
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GenError::Shape("empty candidate text".into()));
    }

    let grounding = candidate
        .grounding_metadata
        .map(|g| {
            g.grounding_chunks
                .into_iter()
                .filter_map(|c| c.web)
                .filter_map(|w| match (w.uri, w.title) {
                    (Some(uri), Some(title)) => Some(GroundingLink { title, uri }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(GenReply { text, grounding })
}
