mod commands;
mod console;
mod logging;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, ExportArgs, ScanArgs, ViewArgs};
use console::{print_history, print_progress, print_trait_counts, prompt_confirm, CliReporter};
use dotenv::dotenv;
use material_checker::inventory::loader;
use material_checker::ledger::AuditLedger;
use material_checker::{
    report, AppConfig, InventoryStore, JsonFileStore, Phase, ScanSession, SessionOptions,
    SnapshotStore,
};
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match material_checker::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Scan(scan_args)) => run_scan(&config, scan_args),
        Some(Commands::Validate { dataset }) => run_validate(&dataset),
        Some(Commands::History) => run_history(&config),
        Some(Commands::ClearHistory) => run_clear_history(&config),
        Some(Commands::Export(export_args)) => run_export(&config, export_args),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn load_inventory(dataset: &Path) -> anyhow::Result<(InventoryStore, Vec<String>)> {
    let table = loader::read_csv(dataset)
        .with_context(|| format!("Failed to read dataset {}", dataset.display()))?;
    let (store, issues) = InventoryStore::load(&table)?;
    Ok((store, issues.iter().map(|i| i.to_string()).collect()))
}

fn run_scan(config: &AppConfig, args: ScanArgs) -> anyhow::Result<()> {
    let ScanArgs {
        view: ViewArgs {
            dataset,
            filter_status,
            search,
        },
        status,
        confirm,
    } = args;

    let Some(target_status) = status.or_else(|| config.default_status.clone()) else {
        bail!("No target status: pass --status or set default_status");
    };

    let (inventory, _) = load_inventory(&dataset)?;
    if !inventory.statuses().contains(&target_status) {
        warn!(
            "No material in {} has status '{}'",
            dataset.display(),
            target_status
        );
    }

    let options = SessionOptions {
        target_status,
        status_filter: filter_status,
        search,
        confirm_before_commit: confirm || config.confirm_before_commit,
    };
    let store = JsonFileStore::from_config(config);
    let mut session = ScanSession::new(inventory, Box::new(store), options)
        .with_reporter(Box::new(CliReporter::new()));

    let carried = match session.pending_restore() {
        Some(count) => ask_restore(&mut session, count)?,
        None => None,
    };

    info!(
        "Scanning {} materials for status '{}'",
        session.active_view().len(),
        session.options().target_status
    );
    println!(
        "Type or scan material codes, one per line. {} lists commands.",
        ":help".cyan()
    );

    let mut keep_going = match carried {
        Some(input) => handle_input(&mut session, config, &input)?,
        None => true,
    };
    let mut line = String::new();
    while keep_going {
        line.clear();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        keep_going = handle_input(&mut session, config, line.trim())?;
    }

    if session.phase() == Phase::AwaitingConfirmation {
        warn!("Exiting with an unconfirmed match, it was not recorded");
    }
    print_progress(&session.options().target_status, &session.progress());
    Ok(())
}

/// Ask whether to restore the saved history. Only an explicit yes restores;
/// no or an empty answer leaves it pending for `:restore` or `:discard`.
/// Any other line is handed back so a code scanned during the question
/// still gets processed.
fn ask_restore(session: &mut ScanSession, count: usize) -> anyhow::Result<Option<String>> {
    print!("Restore previous history with {} entries? (y/N): ", count);
    io::stdout().flush()?;

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer)? == 0 {
        return Ok(None);
    }
    match answer.trim().to_uppercase().as_str() {
        "Y" => {
            session.restore();
            Ok(None)
        }
        "N" | "" => {
            println!(
                "Previous history kept on disk. {} brings it back, {} drops it.",
                ":restore".cyan(),
                ":discard".cyan()
            );
            Ok(None)
        }
        _ => Ok(Some(answer.trim().to_string())),
    }
}

/// Route one line of input to a `:command` or the scanner. Returns false
/// when the session should end.
fn handle_input(
    session: &mut ScanSession,
    config: &AppConfig,
    input: &str,
) -> anyhow::Result<bool> {
    match input.strip_prefix(':') {
        Some(command) => handle_command(session, config, command),
        None => {
            session.submit(input);
            Ok(true)
        }
    }
}

/// Run one `:command`. Returns false when the session should end.
fn handle_command(
    session: &mut ScanSession,
    config: &AppConfig,
    command: &str,
) -> anyhow::Result<bool> {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, Some(arg.trim())),
        None => (command, None),
    };

    match name {
        "progress" => {
            print_progress(&session.options().target_status, &session.progress());
            print_trait_counts(&session.active_view().trait_counts());
        }
        "history" => print_history(session.ledger().entries()),
        "confirm" => {
            if session.confirm().is_none() {
                println!("Nothing to confirm");
            }
        }
        "skip" => {
            if !session.skip() {
                println!("Nothing to skip");
            }
        }
        "reset" => {
            session.reset_scanner();
            println!("Scanner reset");
        }
        "status" => match arg.filter(|a| !a.is_empty()) {
            Some(status) => {
                session.set_target_status(status);
                print_progress(status, &session.progress());
            }
            None => println!("Target status: {}", session.options().target_status),
        },
        "clear" => {
            if prompt_confirm("Clear the whole check history?", Some(false))? {
                let outcome = session.clear_history();
                println!("{} entries removed", outcome.removed);
                if !outcome.snapshot_deleted {
                    println!("{}", "Saved history could not be deleted".yellow());
                }
            }
        }
        "restore" => match session.restore() {
            Some(len) => println!("History restored, {} entries", len),
            None => println!("No saved history to restore"),
        },
        "discard" => match session.discard_restore() {
            Some(count) => println!("Previous history with {} entries discarded", count),
            None => println!("No saved history to discard"),
        },
        "export" => {
            let dir = arg
                .filter(|a| !a.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&config.report_dir));
            match report::export(&dir, session.active_view(), session.ledger()) {
                Ok(paths) => println!("Report written to {}", paths.dir.display()),
                Err(e) => error!("Error writing report: {}", e),
            }
        }
        "quit" | "q" => return Ok(false),
        _ => println!(
            "Commands: :progress :history :confirm :skip :reset :status [name] :clear :restore :discard :export [dir] :quit"
        ),
    }
    Ok(true)
}

fn run_validate(dataset: &Path) -> anyhow::Result<()> {
    let (inventory, issues) = load_inventory(dataset)?;
    println!("{} materials loaded", format!("{}", inventory.len()).green());
    for (status, count) in inventory.status_counts() {
        println!("  {:<20} {}", status, count);
    }
    print_trait_counts(&inventory.trait_counts());
    if issues.is_empty() {
        println!("{}", "No data issues found".green());
    } else {
        println!("{}", "Data issues:".yellow());
        for issue in issues {
            println!("  • {}", issue);
        }
    }
    Ok(())
}

fn run_history(config: &AppConfig) -> anyhow::Result<()> {
    let store = JsonFileStore::from_config(config);
    match store.load() {
        Some(snapshot) => {
            print_history(&snapshot.entries);
            let ledger = AuditLedger::from_entries(snapshot.entries);
            let (matched, wrong, missing) = ledger.outcome_counts();
            println!(
                "{} entries saved at {}: {} verified, {} wrong status, {} not found",
                snapshot.count,
                snapshot.saved_at,
                format!("{}", matched).green(),
                format!("{}", wrong).yellow(),
                format!("{}", missing).red(),
            );
        }
        None => println!("No saved history at {}", store.path().display()),
    }
    Ok(())
}

fn run_clear_history(config: &AppConfig) -> anyhow::Result<()> {
    if !prompt_confirm(
        "Are you SURE you want to DELETE the saved check history?",
        Some(false),
    )? {
        return Ok(());
    }
    JsonFileStore::from_config(config).delete()?;
    println!("Saved history deleted");
    Ok(())
}

fn run_export(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    let (inventory, _) = load_inventory(&args.view.dataset)?;
    let view = inventory.filter(args.view.filter_status.as_deref(), args.view.search.as_deref());
    let ledger = JsonFileStore::from_config(config)
        .load()
        .map(|s| AuditLedger::from_entries(s.entries))
        .unwrap_or_default();

    let dir = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.report_dir));
    let paths = report::export(&dir, &view, &ledger)?;
    info!(
        "Report written to {} ({} materials, {} history entries)",
        paths.dir.display(),
        view.len(),
        ledger.len()
    );
    Ok(())
}
