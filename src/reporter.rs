use crate::ledger::Progress;
use crate::session::ScanResult;

/// Trait for surfacing scan events to a presentation layer.
///
/// The CLI implements it with colored output and an indicatif bar.
/// All methods have default no-op implementations.
pub trait ScanReporter {
    fn on_scan_resolved(&self, _result: &ScanResult) {}
    fn on_commit(&self, _result: &ScanResult) {}
    fn on_skip(&self, _id: &str) {}
    fn on_progress(&self, _target_status: &str, _progress: &Progress) {}
    fn on_persist_failed(&self, _message: &str) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl ScanReporter for SilentReporter {}
