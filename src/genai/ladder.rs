// src/genai/ladder.rs
//
// Ordered model-fallback ladder: try each candidate until one answers.
// Attempts are strictly sequential; there is no retry within a candidate and
// no backoff between candidates.

use metrics::counter;

use crate::genai::backend::GenBackend;
use crate::genai::{GenError, GenReply, GenRequest};

/// One candidate configuration in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rung {
    pub model: String,
    pub tools_enabled: bool,
}

/// Candidate order: every configured model with the requested tool setting,
/// then a final tools-disabled rung when search was requested, for the case
/// where tool enablement itself is what the service keeps rejecting.
pub fn build_rungs(models: &[String], enable_search: bool) -> Vec<Rung> {
    let mut rungs: Vec<Rung> = models
        .iter()
        .map(|m| Rung {
            model: m.clone(),
            tools_enabled: enable_search,
        })
        .collect();
    if enable_search {
        if let Some(last) = models.last() {
            rungs.push(Rung {
                model: last.clone(),
                tools_enabled: false,
            });
        }
    }
    rungs
}

/// What the ladder does after a failed candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderVerdict {
    /// Move on to the next rung unchanged.
    Advance,
    /// Move on, and keep tools off for every remaining rung.
    DropTools,
    /// Stop the ladder and report this error.
    Halt,
}

pub type ClassifyPolicy = fn(&GenError) -> LadderVerdict;

/// Default classification: quota, unknown-model, shape and transport errors
/// all advance; a 400-class rejection strips tools first, since that is the
/// usual signature of a refused tool configuration.
pub fn default_policy(err: &GenError) -> LadderVerdict {
    match err {
        GenError::Upstream { status: 400, .. } => LadderVerdict::DropTools,
        _ => LadderVerdict::Advance,
    }
}

/// Try each rung until success. Returns the last error when the ladder is
/// exhausted so callers can surface it in diagnostics.
pub async fn run_ladder(
    backend: &dyn GenBackend,
    rungs: &[Rung],
    req: &GenRequest,
    policy: ClassifyPolicy,
) -> Result<GenReply, GenError> {
    let mut tools_allowed = true;
    let mut last_err: Option<GenError> = None;

    for rung in rungs {
        counter!("genai_attempts_total").increment(1);
        let tools_enabled = rung.tools_enabled && tools_allowed;
        match backend.generate(&rung.model, tools_enabled, req).await {
            Ok(reply) => return Ok(reply),
            Err(e) => {
                counter!("genai_attempt_errors_total").increment(1);
                tracing::warn!(
                    error = %e,
                    model = %rung.model,
                    tools = tools_enabled,
                    "model candidate failed"
                );
                match policy(&e) {
                    LadderVerdict::Advance => {}
                    LadderVerdict::DropTools => tools_allowed = false,
                    LadderVerdict::Halt => return Err(e),
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| GenError::Shape("no candidate models configured".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rungs_append_tools_off_tail_only_for_search() {
        let models = vec!["m1".to_string(), "m2".to_string()];

        let plain = build_rungs(&models, false);
        assert_eq!(plain.len(), 2);
        assert!(plain.iter().all(|r| !r.tools_enabled));

        let search = build_rungs(&models, true);
        assert_eq!(search.len(), 3);
        assert!(search[0].tools_enabled && search[1].tools_enabled);
        assert_eq!(search[2].model, "m2");
        assert!(!search[2].tools_enabled);
    }

    #[test]
    fn bad_request_drops_tools_for_the_rest() {
        let err = GenError::Upstream {
            status: 400,
            detail: "tool config rejected".into(),
        };
        assert_eq!(default_policy(&err), LadderVerdict::DropTools);
        assert_eq!(
            default_policy(&GenError::Quota("daily cap".into())),
            LadderVerdict::Advance
        );
    }
}
