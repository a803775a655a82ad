pub mod loader;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::Error;
pub use loader::RawTable;

pub const COLUMN_ID: &str = "id_codigo";
pub const COLUMN_STAGE: &str = "etapa_programa";
pub const COLUMN_STATUS: &str = "avanco";
pub const COLUMN_TRAIT: &str = "trait";

pub const REQUIRED_COLUMNS: [&str; 3] = [COLUMN_STAGE, COLUMN_ID, COLUMN_STATUS];

/// Value used for a missing trait column and for not-found audit entries.
pub const NOT_AVAILABLE: &str = "N/A";

/// Status filter value meaning "every status".
pub const STATUS_WILDCARD: &str = "Todos";

/// One material row of a loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: String,
    pub stage: String,
    #[serde(rename = "trait")]
    pub trait_tag: String,
    pub status: String,
}

impl MaterialRecord {
    pub fn category(&self) -> TraitCategory {
        TraitCategory::from(self.trait_tag.as_str())
    }
}

/// Display grouping of a record. Plays no part in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitCategory {
    Ce3,
    E3,
    Conv,
    Other(String),
}

impl From<&str> for TraitCategory {
    fn from(value: &str) -> Self {
        match value.trim() {
            "CE3" => TraitCategory::Ce3,
            "E3" => TraitCategory::E3,
            "CONV" => TraitCategory::Conv,
            other => TraitCategory::Other(other.to_string()),
        }
    }
}

/// Advisory data-quality problem found while loading. Never blocks the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Ids that occur more than once, each listed once in load order.
    DuplicateIds(Vec<String>),
    /// Number of rows whose id is empty.
    EmptyIds(usize),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DuplicateIds(ids) => {
                write!(f, "Duplicate ids found: {}", ids.join(", "))
            }
            ValidationIssue::EmptyIds(count) => {
                write!(f, "{} materials with an empty id", count)
            }
        }
    }
}

/// In-memory table of material records for one loaded dataset.
#[derive(Debug, Clone, Default)]
pub struct InventoryStore {
    records: Vec<MaterialRecord>,
    // id -> position of its first record
    index: AHashMap<String, usize>,
    duplicated: AHashSet<String>,
}

impl InventoryStore {
    /// Build a store from raw tabular input.
    ///
    /// Fails only when a required column is missing. Duplicate and empty ids
    /// are returned as issues alongside the store.
    pub fn load(table: &RawTable) -> Result<(InventoryStore, Vec<ValidationIssue>), Error> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| table.column(col).is_none())
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }

        // Presence checked above
        let id_col = table.column(COLUMN_ID).unwrap_or_default();
        let stage_col = table.column(COLUMN_STAGE).unwrap_or_default();
        let status_col = table.column(COLUMN_STATUS).unwrap_or_default();
        let trait_col = table.column(COLUMN_TRAIT);
        if trait_col.is_none() {
            debug!("No '{}' column, defaulting to {}", COLUMN_TRAIT, NOT_AVAILABLE);
        }

        let records: Vec<MaterialRecord> = table
            .rows
            .iter()
            .map(|row| MaterialRecord {
                id: cell(row, id_col),
                stage: cell(row, stage_col),
                trait_tag: trait_col
                    .map(|col| cell(row, col))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                status: cell(row, status_col),
            })
            .collect();

        let store = InventoryStore::from_records(records);
        let issues = store.validate();
        for issue in &issues {
            warn!("Dataset issue: {}", issue);
        }
        debug!("Loaded {} material records", store.len());
        Ok((store, issues))
    }

    pub fn from_records(records: Vec<MaterialRecord>) -> Self {
        let mut index = AHashMap::with_capacity(records.len());
        let mut duplicated = AHashSet::new();
        for (pos, record) in records.iter().enumerate() {
            if record.id.is_empty() {
                continue;
            }
            if index.contains_key(&record.id) {
                duplicated.insert(record.id.clone());
            } else {
                index.insert(record.id.clone(), pos);
            }
        }
        Self {
            records,
            index,
            duplicated,
        }
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let mut seen = AHashSet::new();
        let duplicate_ids: Vec<String> = self
            .records
            .iter()
            .filter(|r| self.duplicated.contains(&r.id) && seen.insert(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect();
        if !duplicate_ids.is_empty() {
            issues.push(ValidationIssue::DuplicateIds(duplicate_ids));
        }

        let empty = self.records.iter().filter(|r| r.id.is_empty()).count();
        if empty > 0 {
            issues.push(ValidationIssue::EmptyIds(empty));
        }

        issues
    }

    /// Exact, case-sensitive lookup on the trimmed id. When an id occurs more
    /// than once the first record in load order is returned.
    pub fn lookup(&self, id: &str) -> Option<&MaterialRecord> {
        self.index
            .get(id.trim())
            .and_then(|&pos| self.records.get(pos))
    }

    pub fn is_duplicated(&self, id: &str) -> bool {
        self.duplicated.contains(id.trim())
    }

    /// Narrow the store by status and/or a case-insensitive search term on
    /// id or stage. Both filters must hold for a record to remain.
    pub fn filter(&self, status: Option<&str>, search: Option<&str>) -> InventoryStore {
        let status = status.filter(|s| !s.is_empty() && *s != STATUS_WILDCARD);
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let records = self
            .records
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| {
                needle.as_deref().map_or(true, |n| {
                    r.id.to_lowercase().contains(n) || r.stage.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();

        InventoryStore::from_records(records)
    }

    pub fn count_with_status(&self, status: &str) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Per-status record counts in first-seen order.
    pub fn status_counts(&self) -> Vec<(String, usize)> {
        self.tally(|r| &r.status)
    }

    /// Materials per trait tag, in first-seen order.
    pub fn trait_counts(&self) -> Vec<(String, usize)> {
        self.tally(|r| &r.trait_tag)
    }

    fn tally<F>(&self, key: F) -> Vec<(String, usize)>
    where
        F: Fn(&MaterialRecord) -> &String,
    {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for record in &self.records {
            let value = key(record);
            match counts.iter_mut().find(|(k, _)| *k == *value) {
                Some((_, n)) => *n += 1,
                None => counts.push((value.clone(), 1)),
            }
        }
        counts
    }

    pub fn statuses(&self) -> Vec<String> {
        self.status_counts().into_iter().map(|(s, _)| s).collect()
    }

    pub fn records(&self) -> &[MaterialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn cell(row: &[String], col: usize) -> String {
    row.get(col).map(|v| v.trim().to_string()).unwrap_or_default()
}
