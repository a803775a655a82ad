use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "material-checker")]
#[command(about = "Check scanned materials against their expected status", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan material codes from stdin against a target status
    Scan(ScanArgs),
    /// Load a dataset and report data-quality issues
    Validate {
        /// CSV file with etapa_programa, id_codigo, avanco and optional trait columns
        #[arg(short, long)]
        dataset: PathBuf,
    },
    /// Print the persisted check history
    History,
    /// Delete the persisted check history
    ClearHistory,
    /// Write materials, history and statistics CSV files
    Export(ExportArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// CSV file with etapa_programa, id_codigo, avanco and optional trait columns
    #[arg(short, long)]
    pub dataset: PathBuf,
    /// Only keep materials with this status ("Todos" keeps all)
    #[arg(long)]
    pub filter_status: Option<String>,
    /// Only keep materials whose id or stage contains this text
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Status the scanned materials are expected to have
    #[arg(short, long)]
    pub status: Option<String>,
    /// Ask for confirmation before recording a match
    #[arg(long)]
    pub confirm: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Directory to create the report in
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}
