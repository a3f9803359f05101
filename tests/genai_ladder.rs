// tests/genai_ladder.rs
//
// Model-fallback ladder behavior: candidate order, typed error advancement,
// the tools-disabled tail rung, and the dated failure strings the briefing
// layer builds when the whole ladder is exhausted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};

use gunsan_info_hub::briefing::BriefingService;
use gunsan_info_hub::genai::backend::GenBackend;
use gunsan_info_hub::genai::{GenAiRunner, GenError, GenOutcome, GenReply, GenRequest};

/// Answers per model; records every (model, tools_enabled) attempt.
struct ScriptedBackend {
    by_model: HashMap<String, Result<GenReply, GenError>>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl ScriptedBackend {
    fn new(by_model: Vec<(&str, Result<GenReply, GenError>)>) -> Arc<Self> {
        Arc::new(Self {
            by_model: by_model
                .into_iter()
                .map(|(m, r)| (m.to_string(), r))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenBackend for ScriptedBackend {
    async fn generate(
        &self,
        model: &str,
        tools_enabled: bool,
        _req: &GenRequest,
    ) -> Result<GenReply, GenError> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), tools_enabled));
        match self.by_model.get(model) {
            Some(r) => r.clone(),
            None => Err(GenError::UnknownModel(format!("no script for {model}"))),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn text_reply(s: &str) -> Result<GenReply, GenError> {
    Ok(GenReply {
        text: s.to_string(),
        grounding: Vec::new(),
    })
}

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn unknown_model_advances_to_the_next_candidate() {
    let backend = ScriptedBackend::new(vec![
        ("m1", Err(GenError::UnknownModel("m1 is not served".into()))),
        ("m2", text_reply("answer from m2")),
    ]);
    let runner = GenAiRunner::new(
        backend.clone(),
        models(&["m1", "m2"]),
        Duration::from_secs(8),
    );

    let outcome = runner
        .run(GenRequest {
            prompt: "p".into(),
            ..Default::default()
        })
        .await;

    match outcome {
        GenOutcome::Ok(reply) => assert_eq!(reply.text, "answer from m2"),
        other => panic!("expected m2's reply, got {other:?}"),
    }
    assert_eq!(
        backend.calls(),
        vec![("m1".to_string(), false), ("m2".to_string(), false)]
    );
}

#[tokio::test]
async fn quota_errors_also_advance_without_retry() {
    let backend = ScriptedBackend::new(vec![
        ("m1", Err(GenError::Quota("daily cap reached".into()))),
        ("m2", text_reply("ok")),
    ]);
    let runner = GenAiRunner::new(
        backend.clone(),
        models(&["m1", "m2"]),
        Duration::from_secs(8),
    );

    let outcome = runner.run(GenRequest::default()).await;
    assert!(matches!(outcome, GenOutcome::Ok(_)));
    // Exactly one attempt per candidate: no intra-candidate retry.
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test]
async fn search_requests_end_with_a_tools_disabled_rung() {
    let backend = ScriptedBackend::new(vec![
        ("m1", Err(GenError::Upstream { status: 500, detail: "boom".into() })),
        ("m2", Err(GenError::Upstream { status: 500, detail: "boom".into() })),
    ]);
    let runner = GenAiRunner::new(
        backend.clone(),
        models(&["m1", "m2"]),
        Duration::from_secs(8),
    );

    let outcome = runner
        .run(GenRequest {
            prompt: "p".into(),
            enable_search: true,
            response_schema: None,
        })
        .await;

    assert!(matches!(outcome, GenOutcome::Failed(_)));
    assert_eq!(
        backend.calls(),
        vec![
            ("m1".to_string(), true),
            ("m2".to_string(), true),
            // Final attempt: last candidate again, tools off.
            ("m2".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn bad_request_strips_tools_for_the_remaining_rungs() {
    let backend = ScriptedBackend::new(vec![
        ("m1", Err(GenError::Upstream { status: 400, detail: "tool config rejected".into() })),
        ("m2", text_reply("plain answer")),
    ]);
    let runner = GenAiRunner::new(
        backend.clone(),
        models(&["m1", "m2"]),
        Duration::from_secs(8),
    );

    let outcome = runner
        .run(GenRequest {
            prompt: "p".into(),
            enable_search: true,
            response_schema: None,
        })
        .await;

    assert!(matches!(outcome, GenOutcome::Ok(_)));
    let calls = backend.calls();
    assert_eq!(calls[0], ("m1".to_string(), true));
    assert_eq!(calls[1], ("m2".to_string(), false), "tools must be off after a 400");
}

#[tokio::test]
async fn exhausted_ladder_reports_the_last_error() {
    let backend = ScriptedBackend::new(vec![
        ("m1", Err(GenError::Quota("first".into()))),
        ("m2", Err(GenError::Upstream { status: 503, detail: "second".into() })),
    ]);
    let runner = GenAiRunner::new(backend, models(&["m1", "m2"]), Duration::from_secs(8));

    match runner.run(GenRequest::default()).await {
        GenOutcome::Failed(GenError::Upstream { status: 503, detail }) => {
            assert_eq!(detail, "second")
        }
        other => panic!("expected the last error, got {other:?}"),
    }
}

#[tokio::test]
async fn exhausted_ladder_greeting_is_dated_and_non_empty() {
    let backend = ScriptedBackend::new(vec![
        ("m1", Err(GenError::Upstream { status: 503, detail: "down".into() })),
    ]);
    let runner = Arc::new(GenAiRunner::new(
        backend,
        models(&["m1"]),
        Duration::from_secs(8),
    ));
    let briefing = BriefingService::new(runner, false);

    let greeting = briefing.daily_greeting().await;
    assert!(!greeting.is_empty());
    let now = Utc::now();
    assert!(
        greeting.contains(&format!("{}년", now.year())),
        "greeting must carry today's date: {greeting}"
    );
    assert!(
        !greeting.contains("down"),
        "diagnostics must stay hidden without the debug flag"
    );
}

#[tokio::test]
async fn debug_diagnostics_expose_the_last_error_in_the_greeting() {
    let backend = ScriptedBackend::new(vec![
        ("m1", Err(GenError::Upstream { status: 503, detail: "upstream melted".into() })),
    ]);
    let runner = Arc::new(GenAiRunner::new(
        backend,
        models(&["m1"]),
        Duration::from_secs(8),
    ));
    let briefing = BriefingService::new(runner, true);

    let greeting = briefing.daily_greeting().await;
    assert!(greeting.contains("upstream melted"), "got: {greeting}");
}
