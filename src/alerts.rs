// src/alerts.rs
//
// Realtime alert ingestion: ask the generative service for alert-worthy
// local items as schema-constrained JSON, then feed them through the
// recent-title guard into the notification center. Every failure path
// ingests zero alerts.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Deserialize;

use crate::genai::{GenAiRunner, GenRequest, StructuredOutcome};
use crate::notify::{AlertDraft, NotificationCenter, RecentTitleGuard};

const ALERT_PROMPT: &str = "오늘 현재 전라북도 군산시의 긴급한 도로 교통 상황(사고, 공사, 정체)이나 \
실시간 기상 특보(호우, 폭염 등), 또는 중요한 지역 소식을 찾아줘. 알림으로 띄울 만한 정보 2개를 요약해줘.";

const DEFAULT_ALERT_TITLE: &str = "군산 소식";
const DEFAULT_ALERT_MESSAGE: &str = "새로운 정보가 있습니다.";

#[derive(Debug, Deserialize)]
struct AlertBatch {
    #[serde(default)]
    alerts: Vec<AlertDraft>,
}

fn alert_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "alerts": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title":   { "type": "STRING", "description": "알림 제목" },
                        "message": { "type": "STRING", "description": "알림 상세 내용" },
                        "type":    { "type": "STRING", "description": "weather, news, info 중 하나" }
                    },
                    "required": ["title", "message", "type"]
                }
            }
        },
        "required": ["alerts"]
    })
}

pub struct AlertService {
    runner: Arc<GenAiRunner>,
    center: Arc<NotificationCenter>,
    guard: Mutex<RecentTitleGuard>,
}

impl AlertService {
    pub fn new(
        runner: Arc<GenAiRunner>,
        center: Arc<NotificationCenter>,
        cooldown_secs: i64,
    ) -> Self {
        Self {
            runner,
            center,
            guard: Mutex::new(RecentTitleGuard::new(cooldown_secs)),
        }
    }

    /// Fetch fresh alerts and ingest them. Returns how many were raised.
    pub async fn refresh(&self) -> usize {
        let req = GenRequest {
            prompt: ALERT_PROMPT.to_string(),
            enable_search: true,
            response_schema: Some(alert_schema()),
        };

        let drafts = match self.runner.run_structured::<AlertBatch>(req).await {
            StructuredOutcome::Parsed(batch) => batch.alerts,
            StructuredOutcome::Unparsed { raw } => {
                tracing::warn!(raw_len = raw.len(), "alert reply not in the agreed shape");
                Vec::new()
            }
            StructuredOutcome::TimedOut => {
                tracing::warn!("alert refresh timed out");
                Vec::new()
            }
            StructuredOutcome::Failed(e) => {
                tracing::warn!(error = %e, "alert refresh failed");
                Vec::new()
            }
        };

        let now = Utc::now();
        let mut ingested = 0usize;
        let mut guard = self.guard.lock().expect("mutex poisoned");
        for draft in drafts {
            let title = non_empty_or(draft.title, DEFAULT_ALERT_TITLE);
            let message = non_empty_or(draft.message, DEFAULT_ALERT_MESSAGE);
            if !guard.should_raise(&title, now) {
                tracing::debug!(%title, "alert suppressed by recent-title guard");
                continue;
            }
            guard.record(&title, now);
            self.center.push(
                AlertDraft {
                    title,
                    message,
                    kind: draft.kind,
                },
                now,
            );
            ingested += 1;
        }
        ingested
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}
