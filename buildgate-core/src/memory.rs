//! Persisted pipeline memory.
//!
//! The document is always written back whole. Mutators here only touch the
//! in-memory value; [`crate::Pipeline`] owns the load/mutate/save cycle.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::DecisionRecord;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryState {
    #[serde(default)]
    pub active_game: Option<String>,
    /// Last committed build. Only moves forward, and only on a confirmed commit.
    #[serde(rename = "build", default)]
    pub build_number: u64,
    #[serde(rename = "last_qa", default)]
    pub last_qa_score: f64,
    #[serde(rename = "last_feel", default)]
    pub last_feel_score: f64,
    #[serde(rename = "pending", default)]
    pub pending_entries: Vec<PendingEntry>,
    /// Bumped on every persisted mutation.
    #[serde(default)]
    pub revision: u64,
}

/// Append-only log entry. Decisions are tried first when reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PendingEntry {
    Decision(DecisionRecord),
    Task(TaskEntry),
}

impl PendingEntry {
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Decision(record) => record.timestamp,
            Self::Task(task) => task.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task: String,
    #[serde(with = "crate::timestamps")]
    pub timestamp: DateTime<Utc>,
    pub status: EntryStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::timestamps::option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
}

/// Summary view of [`MemoryState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatus {
    pub active_game: Option<String>,
    pub build: u64,
    pub last_qa: f64,
    pub last_feel: f64,
    /// Every logged entry, decisions included.
    pub pending_entries: usize,
    /// Tasks not yet completed.
    pub pending_tasks: usize,
}

impl MemoryState {
    #[must_use]
    pub fn status(&self) -> MemoryStatus {
        MemoryStatus {
            active_game: self.active_game.clone(),
            build: self.build_number,
            last_qa: self.last_qa_score,
            last_feel: self.last_feel_score,
            pending_entries: self.pending_entries.len(),
            pending_tasks: self.open_tasks().count(),
        }
    }

    pub fn open_tasks(&self) -> impl Iterator<Item = &TaskEntry> {
        self.pending_entries.iter().filter_map(|entry| match entry {
            PendingEntry::Task(task) if task.status == EntryStatus::Pending => Some(task),
            _ => None,
        })
    }

    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.pending_entries.iter().filter_map(|entry| match entry {
            PendingEntry::Decision(record) => Some(record),
            PendingEntry::Task(_) => None,
        })
    }

    pub fn push_decision(&mut self, record: DecisionRecord) {
        self.pending_entries.push(PendingEntry::Decision(record));
    }

    /// Append a pending task and return its index.
    pub fn push_task(&mut self, task: impl Into<String>, at: DateTime<Utc>) -> usize {
        self.pending_entries.push(PendingEntry::Task(TaskEntry {
            task: task.into(),
            timestamp: at,
            status: EntryStatus::Pending,
            completed_at: None,
        }));
        self.pending_entries.len() - 1
    }

    /// Mark the task at `index` completed in place.
    ///
    /// Completing an already completed task keeps its original `completed_at`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::EntryNotFound`] for an out-of-range index,
    /// [`PipelineError::EntryNotTask`] when the entry is a decision.
    pub fn complete_task(
        &mut self,
        index: usize,
        at: DateTime<Utc>,
    ) -> Result<&TaskEntry, PipelineError> {
        match self.pending_entries.get_mut(index) {
            None => Err(PipelineError::EntryNotFound { index }),
            Some(PendingEntry::Decision(_)) => Err(PipelineError::EntryNotTask { index }),
            Some(PendingEntry::Task(task)) => {
                if task.status == EntryStatus::Pending {
                    task.status = EntryStatus::Completed;
                    task.completed_at = Some(at);
                }
                Ok(task)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Decision, DecisionMatrix};
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0)
            .single()
            .expect("timestamp")
    }

    #[test]
    fn missing_fields_take_documented_defaults() {
        let state: MemoryState = serde_json::from_str("{}").expect("parse");
        assert_eq!(state, MemoryState::default());
        assert_eq!(state.active_game, None);
        assert_eq!(state.build_number, 0);
        assert!(state.pending_entries.is_empty());
    }

    #[test]
    fn reads_legacy_document_without_revision() {
        let json = r#"{
            "active_game": "slicer",
            "build": 7,
            "last_qa": 0.81,
            "last_feel": 0.77,
            "pending": [
                {"task": "polish HUD", "timestamp": "2025-06-01T12:00:00.123456", "status": "pending"},
                {
                    "timestamp": "2025-06-01T12:05:00",
                    "decision": "TUNING_REQUIRED",
                    "weighted_score": 0.7775,
                    "qa_score": 0.75,
                    "feel_score": 0.75,
                    "reasoning": "Weighted score 0.777 requires tuning (between 0.7 and 0.85)",
                    "next_action": "Apply tuning recommendations and re-test"
                }
            ]
        }"#;
        let state: MemoryState = serde_json::from_str(json).expect("parse");
        assert_eq!(state.active_game.as_deref(), Some("slicer"));
        assert_eq!(state.build_number, 7);
        assert_eq!(state.revision, 0);
        assert_eq!(state.open_tasks().count(), 1);
        assert_eq!(
            state.pending_entries[0].timestamp(),
            at(0) + chrono::Duration::microseconds(123_456)
        );
        let decision = state.decisions().next().expect("decision entry");
        assert_eq!(decision.decision, Decision::TuningRequired);
        assert_eq!(decision.timestamp, at(5));

        let rewritten = serde_json::to_string(&state).expect("json");
        assert!(rewritten.contains("2025-06-01T12:05:00Z"));
    }

    #[test]
    fn mixed_entries_roundtrip_in_order() {
        let mut state = MemoryState {
            active_game: Some("slicer".into()),
            build_number: 3,
            last_qa_score: 0.9,
            last_feel_score: 0.88,
            ..MemoryState::default()
        };
        state.push_task("tune spawn curve", at(0));
        let record = DecisionMatrix::default()
            .decide_at(0.9, 0.88, at(1))
            .expect("decide");
        state.push_decision(record);
        state.push_task("record trailer", at(2));
        state.complete_task(0, at(3)).expect("complete");

        let json = serde_json::to_string_pretty(&state).expect("json");
        let back: MemoryState = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, state);
        assert!(matches!(back.pending_entries[1], PendingEntry::Decision(_)));
        assert_eq!(back.pending_entries[2].timestamp(), at(2));
    }

    #[test]
    fn completing_marks_in_place() {
        let mut state = MemoryState::default();
        let index = state.push_task("fix crash", at(0));
        let task = state.complete_task(index, at(5)).expect("complete");
        assert_eq!(task.status, EntryStatus::Completed);
        assert_eq!(task.completed_at, Some(at(5)));

        state.complete_task(index, at(9)).expect("again");
        let status = state.status();
        assert_eq!(status.pending_entries, 1);
        assert_eq!(status.pending_tasks, 0);
        match &state.pending_entries[0] {
            PendingEntry::Task(task) => assert_eq!(task.completed_at, Some(at(5))),
            PendingEntry::Decision(_) => panic!("expected task"),
        }
    }

    #[test]
    fn completing_rejects_missing_and_decision_entries() {
        let mut state = MemoryState::default();
        let record = DecisionMatrix::default()
            .decide_at(0.5, 0.5, at(0))
            .expect("decide");
        state.push_decision(record);
        assert!(matches!(
            state.complete_task(0, at(1)),
            Err(PipelineError::EntryNotTask { index: 0 })
        ));
        assert!(matches!(
            state.complete_task(4, at(1)),
            Err(PipelineError::EntryNotFound { index: 4 })
        ));
    }

    #[test]
    fn document_uses_short_key_names() {
        let state = MemoryState {
            build_number: 2,
            ..MemoryState::default()
        };
        let value = serde_json::to_value(&state).expect("json");
        for key in ["active_game", "build", "last_qa", "last_feel", "pending", "revision"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
