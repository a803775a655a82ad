use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::Error;
use crate::ledger::AuditEntry;

/// Durable form of the audit ledger. Field names are part of the on-disk
/// format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub entries: Vec<AuditEntry>,
    #[serde(rename = "savedAt")]
    pub saved_at: String,
    pub count: usize,
}

impl LedgerSnapshot {
    pub fn new(entries: Vec<AuditEntry>) -> Self {
        let count = entries.len();
        Self {
            entries,
            saved_at: Utc::now().to_rfc3339(),
            count,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.count == self.entries.len()
    }
}

/// Storage for the ledger snapshot of one cache slot.
///
/// `load` never fails: a missing or unreadable snapshot means "no prior
/// state".
pub trait SnapshotStore {
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), Error>;
    fn load(&self) -> Option<LedgerSnapshot>;
    fn delete(&self) -> Result<(), Error>;
}

/// Snapshot kept as a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>, slot: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", slot)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            path: config.snapshot_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Hidden sibling so the rename stays on one filesystem
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }

    fn write_temp(&self, temp_path: &Path, snapshot: &LedgerSnapshot) -> Result<(), Error> {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }

    fn read(&self) -> io::Result<LedgerSnapshot> {
        let file = File::open(&self.path)?;
        let snapshot: LedgerSnapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        if !snapshot.is_consistent() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "count {} does not match {} entries",
                    snapshot.count,
                    snapshot.entries.len()
                ),
            ));
        }
        Ok(snapshot)
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = self.write_temp(&temp_path, snapshot) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(
            "Saved snapshot with {} entries to {}",
            snapshot.count,
            self.path.display()
        );
        Ok(())
    }

    fn load(&self) -> Option<LedgerSnapshot> {
        match self.read() {
            Ok(snapshot) => {
                info!(
                    "Found snapshot with {} entries saved at {}",
                    snapshot.count, snapshot.saved_at
                );
                Some(snapshot)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}", self.path.display());
                None
            }
            Err(e) => {
                error!(
                    "Ignoring unreadable snapshot {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn delete(&self) -> Result<(), Error> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Deleted snapshot {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Could not delete snapshot {}: {}", self.path.display(), e);
                Err(Error::Io(e))
            }
        }
    }
}
