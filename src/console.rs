use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

use material_checker::inventory::TraitCategory;
use material_checker::ledger::AuditEntry;
use material_checker::report::found_label;
use material_checker::{Outcome, Progress, ScanReporter, ScanResult};

/// Terminal reporter: one colored line per scan and an indicatif bar for
/// verification progress.
pub struct CliReporter {
    bar: ProgressBar,
}

impl CliReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("  {msg} [{bar:30.green/dim}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━╸─"),
        );
        Self { bar }
    }

    // Print above the bar without tearing it
    fn say(&self, line: String) {
        self.bar.suspend(|| println!("{}", line));
    }
}

impl Drop for CliReporter {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ScanReporter for CliReporter {
    fn on_scan_resolved(&self, result: &ScanResult) {
        let line = match result.outcome {
            Outcome::Matched if !result.committed => format!(
                "  {} {} found, confirm with :confirm or :skip",
                "?".yellow(),
                trait_label(result)
            ),
            Outcome::Matched => format!("  {} {} verified", "✓".green(), trait_label(result)),
            Outcome::WrongStatus => format!(
                "  {} {} wrong status! Expected: {}, Actual: {}",
                "✗".red(),
                result.scanned_id.bold(),
                result.expected_status,
                result.actual_status.as_deref().unwrap_or("N/A").red()
            ),
            Outcome::NotFound => format!(
                "  {} ID '{}' not found!",
                "✗".red(),
                result.scanned_id.bold()
            ),
        };
        self.say(line);
    }

    fn on_commit(&self, result: &ScanResult) {
        self.say(format!("  {} {} verified", "✓".green(), trait_label(result)));
    }

    fn on_skip(&self, id: &str) {
        self.say(format!("  {} {} skipped", "⏭".dimmed(), id));
    }

    fn on_progress(&self, target_status: &str, progress: &Progress) {
        self.bar.set_length(progress.total as u64);
        self.bar
            .set_position(progress.verified.min(progress.total) as u64);
        self.bar.set_message(format!(
            "{} ({} remaining)",
            target_status.cyan(),
            progress.remaining
        ));
    }

    fn on_persist_failed(&self, message: &str) {
        self.say(format!(
            "  {} history not saved to disk ({}), continuing in memory",
            "!".yellow(),
            message
        ));
    }
}

fn trait_label(result: &ScanResult) -> String {
    let Some(record) = &result.record else {
        return result.scanned_id.clone();
    };
    format!(
        "{} [{}] {}",
        record.id.bold(),
        colored_trait(&record.trait_tag),
        record.stage
    )
}

fn colored_trait(tag: &str) -> ColoredString {
    match TraitCategory::from(tag) {
        TraitCategory::Ce3 => tag.purple(),
        TraitCategory::E3 => tag.green(),
        TraitCategory::Conv => tag.yellow(),
        TraitCategory::Other(_) => tag.normal(),
    }
}

pub fn print_trait_counts(counts: &[(String, usize)]) {
    let line = counts
        .iter()
        .map(|(tag, count)| format!("{}: {}", colored_trait(tag), count))
        .collect::<Vec<_>>()
        .join("  ");
    println!("Traits: {}", line);
}

pub fn print_progress(target_status: &str, progress: &Progress) {
    println!(
        "Progress for {}: {}/{} ({:.1}%), {} remaining",
        target_status.cyan(),
        format!("{}", progress.verified).green(),
        progress.total,
        progress.fraction() * 100.0,
        format!("{}", progress.remaining).red(),
    );
}

pub fn print_history(entries: &[AuditEntry]) {
    for entry in entries {
        let found = match entry.outcome {
            Outcome::Matched => found_label(entry.outcome).green(),
            Outcome::WrongStatus => found_label(entry.outcome).yellow(),
            Outcome::NotFound => found_label(entry.outcome).red(),
        };
        println!(
            "{}  {:<16} {:<24} {:<6} {:<10} {}",
            entry.timestamp, entry.id, entry.stage, entry.trait_tag, entry.status, found
        );
    }
}

pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => println!("Please answer y or n (ignored '{}')", input.trim()),
        }
    }
}
