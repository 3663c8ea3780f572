//! Outcome of a synchronization run.
//!
//! Records which ExternalIDs were added, updated and deleted so callers can
//! cascade further work (aggregate sweeps, cache flushes).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RecordKind;

/// Synchronizer state. `Exhausted` is the normal terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Idle,
    Fetching(i64),
    Validating(i64),
    Persisting(i64),
    Failed(i64),
    Exhausted,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Fetching(id) => write!(f, "fetching {id}"),
            SyncState::Validating(id) => write!(f, "validating {id}"),
            SyncState::Persisting(id) => write!(f, "persisting {id}"),
            SyncState::Failed(id) => write!(f, "failed {id}"),
            SyncState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Per-class failure counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    pub not_found: usize,
    pub fetch: usize,
    pub validation: usize,
}

impl FailureCounts {
    pub fn total(&self) -> usize {
        self.not_found + self.fetch + self.validation
    }
}

/// Changes applied by one synchronizer run, by ExternalID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub kind: RecordKind,
    /// First ExternalID visited.
    pub first_id: i64,
    /// Last ExternalID visited.
    pub last_id: i64,
    pub added: Vec<i64>,
    pub updated: Vec<i64>,
    pub deleted: Vec<i64>,
    pub failures: FailureCounts,
    pub state: SyncState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn new(kind: RecordKind, first_id: i64) -> Self {
        Self {
            kind,
            first_id,
            last_id: first_id,
            added: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            failures: FailureCounts::default(),
            state: SyncState::Idle,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.deleted.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }

    pub(crate) fn finish(&mut self, state: SyncState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_changes() {
        let report = SyncReport::new(RecordKind::Contract, 10);
        assert!(!report.has_changes());
        assert_eq!(report.change_count(), 0);
        assert_eq!(report.state, SyncState::Idle);
    }

    #[test]
    fn test_mixed_changes() {
        let mut report = SyncReport::new(RecordKind::Entity, 1);
        report.added.push(4);
        report.updated.push(2);
        report.deleted.push(3);
        report.finish(SyncState::Exhausted);

        assert!(report.has_changes());
        assert_eq!(report.change_count(), 3);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SyncState::Fetching(7).to_string(), "fetching 7");
        assert_eq!(SyncState::Exhausted.to_string(), "exhausted");
    }
}
