//! Document processing state machine (spec §4.8), grounded on the
//! status/retry_count/error_message shape of original_source
//! `backend/app/models/document.py`. Persistence is out of scope (§1);
//! `Document` here is a plain value the caller owns and mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Queued,
    Preprocessing,
    Ocr,
    Extracting,
    Validating,
    Review,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub status: DocumentState,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub original_path: Option<String>,
    pub hash_sha256: Option<String>,
    pub pipeline_version: String,
    pub state_entered_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, pipeline_version: impl Into<String>, now: DateTime<Utc>) -> Self {
        Document {
            id: id.into(),
            status: DocumentState::Queued,
            retry_count: 0,
            error_message: None,
            original_path: None,
            hash_sha256: None,
            pipeline_version: pipeline_version.into(),
            state_entered_at: now,
        }
    }

    fn legal(&self, to: DocumentState) -> bool {
        use DocumentState::*;
        match (self.status, to) {
            (Queued, Preprocessing) => true,
            (Preprocessing, Ocr) => true,
            (Ocr, Extracting) => true,
            (Extracting, Validating) => true,
            (Validating, Review) | (Validating, Done) => true,
            (_, Failed) => true,
            (Failed, Queued) | (Review, Queued) | (Done, Queued) => true,
            _ => false,
        }
    }

    /// Move to a new state. Panics on an illegal transition: the caller
    /// (an external scheduler) is expected to only request legal moves,
    /// so this is a programmer error, not a recoverable `Result`.
    pub fn transition(&mut self, to: DocumentState, now: DateTime<Utc>) {
        assert!(
            self.legal(to),
            "illegal document transition: {:?} -> {:?}",
            self.status,
            to
        );
        if to == DocumentState::Failed {
            self.retry_count += 1;
        }
        if matches!(to, DocumentState::Queued) {
            self.error_message = None;
        }
        self.status = to;
        self.state_entered_at = now;
    }

    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.error_message = Some(message.into());
        self.transition(DocumentState::Failed, now);
    }

    /// Reset to `queued`, clearing error state (spec §4.8: "a reprocess
    /// request resets to queued and clears error/timestamp fields").
    pub fn reprocess(&mut self, now: DateTime<Utc>) {
        self.error_message = None;
        self.status = DocumentState::Queued;
        self.state_entered_at = now;
    }

    pub fn seconds_in_state(&self, now: DateTime<Utc>) -> i64 {
        (now - self.state_entered_at).num_seconds().max(0)
    }
}

/// Per-state watchdog thresholds in seconds (spec §4.8).
pub fn default_watchdog_thresholds() -> HashMap<DocumentState, i64> {
    let mut map = HashMap::new();
    map.insert(DocumentState::Preprocessing, 120);
    map.insert(DocumentState::Ocr, 480);
    map.insert(DocumentState::Extracting, 120);
    map.insert(DocumentState::Validating, 120);
    map
}

/// Pure sweep: returns (document id, reason) for every document stuck
/// past its per-state threshold. The caller is responsible for actually
/// forcing the transition and persisting it — scheduling I/O is out of
/// scope (§1/§5).
pub fn watchdog_sweep(
    documents: &[Document],
    now: DateTime<Utc>,
    thresholds: &HashMap<DocumentState, i64>,
) -> Vec<(String, String)> {
    let mut stuck = Vec::new();
    for doc in documents {
        if let Some(&limit) = thresholds.get(&doc.status) {
            if doc.seconds_in_state(now) > limit {
                stuck.push((doc.id.clone(), format!("Stuck in {:?}", doc.status)));
            }
        }
    }
    stuck
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn legal_chain_runs_end_to_end() {
        let now = Utc::now();
        let mut doc = Document::new("d1", "v1", now);
        doc.transition(DocumentState::Preprocessing, now);
        doc.transition(DocumentState::Ocr, now);
        doc.transition(DocumentState::Extracting, now);
        doc.transition(DocumentState::Validating, now);
        doc.transition(DocumentState::Done, now);
        assert_eq!(doc.status, DocumentState::Done);
    }

    #[test]
    #[should_panic(expected = "illegal document transition")]
    fn illegal_transition_panics() {
        let now = Utc::now();
        let mut doc = Document::new("d1", "v1", now);
        doc.transition(DocumentState::Done, now);
    }

    #[test]
    fn fail_increments_retry_count() {
        let now = Utc::now();
        let mut doc = Document::new("d1", "v1", now);
        doc.fail("decode error", now);
        assert_eq!(doc.retry_count, 1);
        assert_eq!(doc.status, DocumentState::Failed);
    }

    #[test]
    fn reprocess_clears_error_and_resets_to_queued() {
        let now = Utc::now();
        let mut doc = Document::new("d1", "v1", now);
        doc.fail("boom", now);
        doc.reprocess(now);
        assert_eq!(doc.status, DocumentState::Queued);
        assert!(doc.error_message.is_none());
    }

    #[test]
    fn watchdog_flags_stuck_documents() {
        let start = Utc::now();
        let mut doc = Document::new("d1", "v1", start);
        doc.transition(DocumentState::Preprocessing, start);
        let later = start + Duration::seconds(121);
        let thresholds = default_watchdog_thresholds();
        let stuck = watchdog_sweep(&[doc], later, &thresholds);
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].0, "d1");
    }

    #[test]
    fn watchdog_ignores_documents_within_threshold() {
        let start = Utc::now();
        let mut doc = Document::new("d1", "v1", start);
        doc.transition(DocumentState::Preprocessing, start);
        let later = start + Duration::seconds(60);
        let thresholds = default_watchdog_thresholds();
        assert!(watchdog_sweep(&[doc], later, &thresholds).is_empty());
    }
}
