pub mod config;
pub mod error;
pub mod evaluator;
pub mod inventory;
pub mod ledger;
pub mod persistence;
pub mod report;
pub mod reporter;
pub mod session;

pub use config::AppConfig;
pub use error::Error;
pub use evaluator::{evaluate, Evaluation, Outcome};
pub use inventory::{InventoryStore, MaterialRecord, ValidationIssue};
pub use ledger::{AuditEntry, AuditLedger, Progress};
pub use persistence::{JsonFileStore, LedgerSnapshot, SnapshotStore};
pub use reporter::{ScanReporter, SilentReporter};
pub use session::{ClearOutcome, Phase, ScanResult, ScanSession, SessionOptions};
