use chrono::Local;
use csv::Writer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Error;
use crate::evaluator::Outcome;
use crate::inventory::{InventoryStore, COLUMN_ID, COLUMN_STAGE, COLUMN_STATUS, COLUMN_TRAIT};
use crate::ledger::AuditLedger;

pub const MATERIALS_FILE: &str = "materiais.csv";
pub const HISTORY_FILE: &str = "historico_checagens.csv";
pub const STATS_FILE: &str = "estatisticas.csv";

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub materials: PathBuf,
    /// Absent when the ledger is empty.
    pub history: Option<PathBuf>,
    pub stats: PathBuf,
}

/// Label written in the history "encontrado" column.
pub fn found_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Matched => "Sim",
        Outcome::WrongStatus => "Não - Avanço incorreto",
        Outcome::NotFound => "Não",
    }
}

/// Write a report into a new timestamped directory under `base_dir`.
pub fn export(
    base_dir: &Path,
    view: &InventoryStore,
    ledger: &AuditLedger,
) -> Result<ReportPaths, Error> {
    let dir = base_dir.join(format!(
        "relatorio_checagem_{}",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    export_into(&dir, view, ledger)
}

pub fn export_into(
    dir: &Path,
    view: &InventoryStore,
    ledger: &AuditLedger,
) -> Result<ReportPaths, Error> {
    fs::create_dir_all(dir)?;

    let materials = dir.join(MATERIALS_FILE);
    let mut wtr = Writer::from_path(&materials)?;
    wtr.write_record([COLUMN_STAGE, COLUMN_ID, COLUMN_STATUS, COLUMN_TRAIT])?;
    for r in view.records() {
        wtr.write_record([&r.stage, &r.id, &r.status, &r.trait_tag])?;
    }
    wtr.flush()?;

    let history = if ledger.is_empty() {
        None
    } else {
        let path = dir.join(HISTORY_FILE);
        let mut wtr = Writer::from_path(&path)?;
        wtr.write_record([
            COLUMN_ID,
            COLUMN_STAGE,
            COLUMN_TRAIT,
            COLUMN_STATUS,
            "check_time",
            "encontrado",
        ])?;
        for e in ledger.entries() {
            wtr.write_record([
                e.id.as_str(),
                e.stage.as_str(),
                e.trait_tag.as_str(),
                e.status.as_str(),
                e.timestamp.as_str(),
                found_label(e.outcome),
            ])?;
        }
        wtr.flush()?;
        Some(path)
    };

    let stats = dir.join(STATS_FILE);
    let mut wtr = Writer::from_path(&stats)?;
    wtr.write_record(["Avanco", "Quantidade"])?;
    for (status, count) in view.status_counts() {
        wtr.write_record([status, count.to_string()])?;
    }
    wtr.flush()?;

    info!("Report written to {}", dir.display());
    Ok(ReportPaths {
        dir: dir.to_path_buf(),
        materials,
        history,
        stats,
    })
}
