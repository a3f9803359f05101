// src/genai/mod.rs
//
// Generative Request Runner: one prompt in, one display-safe outcome out.
// A configured ladder of candidate models is tried sequentially under a
// wall-clock budget; every failure mode terminates in a value, never a
// propagated error.

pub mod backend;
pub mod ladder;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::genai::backend::GenBackend;

/// One generation request. `response_schema` switches the service into
/// JSON-constrained output mode.
#[derive(Debug, Clone, Default)]
pub struct GenRequest {
    pub prompt: String,
    pub enable_search: bool,
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingLink {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenReply {
    pub text: String,
    pub grounding: Vec<GroundingLink>,
}

/// Failure of a single candidate attempt, decoded at the boundary.
#[derive(Debug, Clone, Error)]
pub enum GenError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("upstream status {status}: {detail}")]
    Upstream { status: u16, detail: String },
    #[error("response shape: {0}")]
    Shape(String),
}

/// Terminal result of a run. `TimedOut` means the budget elapsed first; the
/// losing attempt future is dropped, which aborts its in-flight request.
#[derive(Debug, Clone)]
pub enum GenOutcome {
    Ok(GenReply),
    TimedOut,
    Failed(GenError),
}

/// Terminal result of a schema-constrained run. `Unparsed` is the typed
/// "parse failed" sentinel: the service answered but not in the agreed shape.
#[derive(Debug, Clone)]
pub enum StructuredOutcome<T> {
    Parsed(T),
    Unparsed { raw: String },
    TimedOut,
    Failed(GenError),
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("genai_attempts_total", "Model candidate attempts.");
        describe_counter!(
            "genai_attempt_errors_total",
            "Failed model candidate attempts."
        );
        describe_counter!("genai_replies_total", "Successful generation runs.");
        describe_counter!("genai_timeouts_total", "Runs that hit the wall-clock budget.");
        describe_counter!("genai_failures_total", "Runs that exhausted the ladder.");
    });
}

pub struct GenAiRunner {
    backend: Arc<dyn GenBackend>,
    models: Vec<String>,
    budget: Duration,
}

impl GenAiRunner {
    pub fn new(backend: Arc<dyn GenBackend>, models: Vec<String>, budget: Duration) -> Self {
        Self {
            backend,
            models,
            budget,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run the ladder under the wall-clock budget.
    pub async fn run(&self, req: GenRequest) -> GenOutcome {
        ensure_metrics_described();
        let rungs = ladder::build_rungs(&self.models, req.enable_search);
        let attempts = ladder::run_ladder(
            self.backend.as_ref(),
            &rungs,
            &req,
            ladder::default_policy,
        );

        match tokio::time::timeout(self.budget, attempts).await {
            Err(_) => {
                counter!("genai_timeouts_total").increment(1);
                tracing::warn!(budget_ms = self.budget.as_millis() as u64, "generation timed out");
                GenOutcome::TimedOut
            }
            Ok(Ok(reply)) => {
                counter!("genai_replies_total").increment(1);
                GenOutcome::Ok(reply)
            }
            Ok(Err(e)) => {
                counter!("genai_failures_total").increment(1);
                GenOutcome::Failed(e)
            }
        }
    }

    /// Run with a JSON response schema and decode the reply into `T`.
    pub async fn run_structured<T: DeserializeOwned>(&self, req: GenRequest) -> StructuredOutcome<T> {
        match self.run(req).await {
            GenOutcome::Ok(reply) => match decode_structured(&reply.text) {
                Some(v) => StructuredOutcome::Parsed(v),
                None => StructuredOutcome::Unparsed { raw: reply.text },
            },
            GenOutcome::TimedOut => StructuredOutcome::TimedOut,
            GenOutcome::Failed(e) => StructuredOutcome::Failed(e),
        }
    }
}

/// Strict parse first; then a salvage pass over the first balanced `{...}`
/// span for services that wrap their JSON in prose.
pub fn decode_structured<T: DeserializeOwned>(raw: &str) -> Option<T> {
    if let Ok(v) = serde_json::from_str(raw.trim()) {
        return Some(v);
    }
    extract_first_object(raw).and_then(|span| serde_json::from_str(span).ok())
}

/// First balanced `{...}` span in `raw`, honoring string literals and escape
/// sequences so braces inside values do not fool the depth counter.
pub fn extract_first_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escape = false;

    for (i, ch) in raw[start..].char_indices() {
        if in_str {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
