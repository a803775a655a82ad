use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_CACHE_SLOT: &str = "material_checker_history";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the ledger snapshot file.
    pub snapshot_dir: String,
    /// Logical cache slot; the snapshot is stored as `<cache_slot>.json`.
    pub cache_slot: String,
    /// Hold matched scans until the operator confirms them.
    pub confirm_before_commit: bool,
    pub default_status: Option<String>,
    pub report_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: ".".to_string(),
            cache_slot: DEFAULT_CACHE_SLOT.to_string(),
            confirm_before_commit: false,
            default_status: None,
            report_dir: ".".to_string(),
        }
    }
}

impl AppConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.snapshot_dir).join(format!("{}.json", self.cache_slot))
    }
}

/// Layered configuration: built-in defaults, then an optional `Config.toml`,
/// then `MATERIAL_CHECKER_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .set_default("snapshot_dir", ".")?
        .set_default("cache_slot", DEFAULT_CACHE_SLOT)?
        .set_default("confirm_before_commit", false)?
        .set_default("report_dir", ".")?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("MATERIAL_CHECKER"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
