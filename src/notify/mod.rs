// src/notify/mod.rs
//
// In-memory notification center. Records are newest-first; a toast is shown
// once per record and auto-dismisses after a fixed TTL; read state changes
// only through explicit acknowledgment; removal only through bulk clear.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a toast stays on screen before timing out.
pub const TOAST_TTL_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Weather,
    News,
    #[default]
    Info,
}

/// Alert content as produced by upstream analysis, before identity and
/// arrival order are assigned. Unrecognized kinds decode as `info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDraft {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToastState {
    Showing { until: DateTime<Utc> },
    Dismissed,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(skip)]
    toast: ToastState,
}

pub struct NotificationCenter {
    records: RwLock<Vec<NotificationRecord>>, // newest first
    seq: AtomicU64,
    toast_ttl: Duration,
}

impl NotificationCenter {
    pub fn new(toast_ttl_secs: i64) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            seq: AtomicU64::new(0),
            toast_ttl: Duration::seconds(toast_ttl_secs),
        }
    }

    /// Ingest a draft: assign identity, prepend (newest-first), start its
    /// toast. Returns the new record's id.
    pub fn push(&self, draft: AlertDraft, now: DateTime<Utc>) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("ntf-{n}");
        let record = NotificationRecord {
            id: id.clone(),
            title: draft.title,
            message: draft.message,
            kind: draft.kind,
            timestamp: now,
            read: false,
            toast: ToastState::Showing {
                until: now + self.toast_ttl,
            },
        };
        let mut records = self.records.write().expect("rwlock poisoned");
        records.insert(0, record);
        id
    }

    /// The toast currently on screen, if any. Expired toasts transition to
    /// dismissed as a side effect; expiry never touches read state.
    pub fn active_toast(&self, now: DateTime<Utc>) -> Option<NotificationRecord> {
        let mut records = self.records.write().expect("rwlock poisoned");
        for rec in records.iter_mut() {
            if let ToastState::Showing { until } = rec.toast {
                if until <= now {
                    rec.toast = ToastState::Dismissed;
                }
            }
        }
        records
            .iter()
            .find(|r| matches!(r.toast, ToastState::Showing { .. }))
            .cloned()
    }

    /// User closed the toast early. Distinct from acknowledgment: the record
    /// stays unread.
    pub fn dismiss_toast(&self, id: &str) -> bool {
        let mut records = self.records.write().expect("rwlock poisoned");
        match records.iter_mut().find(|r| r.id == id) {
            Some(rec) => {
                rec.toast = ToastState::Dismissed;
                true
            }
            None => false,
        }
    }

    /// Explicit acknowledgment from the persistent list.
    pub fn mark_read(&self, id: &str) -> bool {
        let mut records = self.records.write().expect("rwlock poisoned");
        match records.iter_mut().find(|r| r.id == id) {
            Some(rec) => {
                rec.read = true;
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) {
        self.records.write().expect("rwlock poisoned").clear();
    }

    /// Newest-first copy of the persistent list.
    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.records.read().expect("rwlock poisoned").clone()
    }

    pub fn unread_count(&self) -> usize {
        self.records
            .read()
            .expect("rwlock poisoned")
            .iter()
            .filter(|r| !r.read)
            .count()
    }
}

/// Suppresses alerts whose title is near-identical to one raised within the
/// cooldown window, so a chatty upstream cannot stack duplicate toasts.
#[derive(Debug, Clone)]
pub struct RecentTitleGuard {
    cooldown: Duration,
    similarity_floor: f64,
    seen: Vec<(String, DateTime<Utc>)>,
}

impl RecentTitleGuard {
    pub fn new(cooldown_secs: i64) -> Self {
        Self {
            cooldown: Duration::seconds(cooldown_secs),
            similarity_floor: 0.90,
            seen: Vec::new(),
        }
    }

    /// Returns true if `title` is fresh enough to raise at time `now`.
    pub fn should_raise(&self, title: &str, now: DateTime<Utc>) -> bool {
        let probe = title.trim().to_lowercase();
        !self.seen.iter().any(|(prev, at)| {
            now - *at < self.cooldown
                && strsim::jaro_winkler(prev, &probe) >= self.similarity_floor
        })
    }

    pub fn record(&mut self, title: &str, now: DateTime<Utc>) {
        self.seen.retain(|(_, at)| now - *at < self.cooldown);
        self.seen.push((title.trim().to_lowercase(), now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_identical_titles_are_suppressed_within_cooldown() {
        let mut guard = RecentTitleGuard::new(600);
        let t0 = Utc::now();
        assert!(guard.should_raise("호우주의보 발령", t0));
        guard.record("호우주의보 발령", t0);

        let t1 = t0 + Duration::seconds(30);
        assert!(!guard.should_raise("호우주의보 발령", t1));
        assert!(guard.should_raise("도로 공사로 인한 정체", t1));

        // After the window the same title passes again.
        let t2 = t0 + Duration::seconds(700);
        assert!(guard.should_raise("호우주의보 발령", t2));
    }

    #[test]
    fn toast_times_out_without_marking_read() {
        let center = NotificationCenter::new(TOAST_TTL_SECS);
        let t0 = Utc::now();
        let id = center.push(
            AlertDraft {
                title: "t".into(),
                message: "m".into(),
                kind: NotificationKind::Weather,
            },
            t0,
        );

        assert_eq!(center.active_toast(t0).map(|r| r.id), Some(id));
        let later = t0 + Duration::seconds(TOAST_TTL_SECS + 1);
        assert!(center.active_toast(later).is_none());
        assert_eq!(center.unread_count(), 1);
    }
}
