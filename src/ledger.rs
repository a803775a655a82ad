use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::evaluator::{Evaluation, Outcome};
use crate::inventory::{InventoryStore, NOT_AVAILABLE};
use crate::persistence::LedgerSnapshot;

pub const NOT_FOUND_STAGE: &str = "Não encontrado";

/// Timestamp layout of audit entries (local time).
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// One recorded check attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub stage: String,
    #[serde(rename = "trait")]
    pub trait_tag: String,
    pub status: String,
    pub timestamp: String,
    pub outcome: Outcome,
}

impl AuditEntry {
    /// Build the entry for an evaluated scan. Not-found scans carry
    /// placeholder stage, trait and status values.
    pub fn from_evaluation(id: &str, evaluation: &Evaluation, timestamp: String) -> Self {
        match &evaluation.record {
            Some(record) => AuditEntry {
                id: id.to_string(),
                stage: record.stage.clone(),
                trait_tag: record.trait_tag.clone(),
                status: record.status.clone(),
                timestamp,
                outcome: evaluation.outcome,
            },
            None => AuditEntry {
                id: id.to_string(),
                stage: NOT_FOUND_STAGE.to_string(),
                trait_tag: NOT_AVAILABLE.to_string(),
                status: NOT_AVAILABLE.to_string(),
                timestamp,
                outcome: Outcome::NotFound,
            },
        }
    }
}

pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Running verification counters for one target status.
///
/// `remaining` is signed and reported as-is: it goes negative when more
/// materials were verified than the current dataset holds under the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub verified: usize,
    pub remaining: i64,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.verified as f64 / self.total as f64
    }
}

/// Append-only, insertion-ordered audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditLedger {
    entries: Vec<AuditEntry>,
}

impl AuditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        Self { entries }
    }

    pub fn append(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verified_count(&self, target_status: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == Outcome::Matched && e.status == target_status)
            .count()
    }

    pub fn progress(&self, target_status: &str, view: &InventoryStore) -> Progress {
        let total = view.count_with_status(target_status);
        let verified = self.verified_count(target_status);
        Progress {
            total,
            verified,
            remaining: total as i64 - verified as i64,
        }
    }

    /// Entry counts per outcome as (matched, wrong status, not found).
    pub fn outcome_counts(&self) -> (usize, usize, usize) {
        self.entries
            .iter()
            .fold((0, 0, 0), |(m, w, n), e| match e.outcome {
                Outcome::Matched => (m + 1, w, n),
                Outcome::WrongStatus => (m, w + 1, n),
                Outcome::NotFound => (m, w, n + 1),
            })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::new(self.entries.clone())
    }

    /// Swap in a restored entry sequence.
    pub(crate) fn replace(&mut self, entries: Vec<AuditEntry>) {
        self.entries = entries;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
