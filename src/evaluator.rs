use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::inventory::{InventoryStore, MaterialRecord};

/// Result of checking one identifier against a target status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Matched,
    WrongStatus,
    NotFound,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Matched => "matched",
            Outcome::WrongStatus => "wrong status",
            Outcome::NotFound => "not found",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub outcome: Outcome,
    /// The record that was found, absent for `NotFound`.
    pub record: Option<MaterialRecord>,
}

impl Evaluation {
    pub fn actual_status(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.status.as_str())
    }
}

/// Check `id` against `target_status` in `store`.
///
/// Ids that occur more than once resolve to their first record in load
/// order. This is a known limitation; the ambiguity is logged.
pub fn evaluate(id: &str, target_status: &str, store: &InventoryStore) -> Evaluation {
    let id = id.trim();
    let Some(record) = store.lookup(id) else {
        return Evaluation {
            outcome: Outcome::NotFound,
            record: None,
        };
    };

    if store.is_duplicated(id) {
        warn!(
            "Id '{}' occurs more than once in the dataset, using the first record (stage '{}')",
            id, record.stage
        );
    }

    let outcome = if record.status == target_status {
        Outcome::Matched
    } else {
        Outcome::WrongStatus
    };

    Evaluation {
        outcome,
        record: Some(record.clone()),
    }
}
