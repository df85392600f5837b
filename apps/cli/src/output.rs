//! Terminal rendering of stage and run results.

use colored::Colorize;
use tuneline_core::pipeline::{RunStatus, StageRecord, StageStatus};
use tuneline_core::StageOutcome;

fn print_stats(stats: &std::collections::BTreeMap<String, serde_json::Value>) {
    for (key, value) in stats {
        let shown = match value.as_f64() {
            Some(v) if value.is_f64() => format!("{v:.4}"),
            _ => value.to_string(),
        };
        println!("    {:<28} {}", key.dimmed(), shown);
    }
}

pub fn print_outcome(run_id: &str, outcome: &StageOutcome) {
    println!();
    println!("{} {}", "✓".green(), format!("{} complete", outcome.stage).bold().green());
    println!("  Run: {}", run_id.cyan());
    println!(
        "  Records: {} clean, {} degraded",
        outcome.summary.clean,
        if outcome.summary.degraded > 0 {
            outcome.summary.degraded.to_string().yellow()
        } else {
            outcome.summary.degraded.to_string().normal()
        }
    );
    if !outcome.stats.is_empty() {
        println!("  Stats:");
        print_stats(&outcome.stats);
    }
    if !outcome.outputs.is_empty() {
        println!("  Outputs:");
        for (port, path) in &outcome.outputs {
            println!("    {:<28} {}", port.dimmed(), path.display());
        }
    }
    println!();
}

pub fn print_stage_record(record: &StageRecord) {
    let marker = match record.status {
        StageStatus::Completed => "✓".green(),
        StageStatus::Failed => "✗".red(),
        StageStatus::Skipped => "-".dimmed(),
    };
    println!("  {} {}", marker, record.name.bold());
    if let Some(error) = &record.error {
        println!("    {}", error.red());
    }
    print_stats(&record.stats);
}

pub fn status_label(status: RunStatus) -> colored::ColoredString {
    match status {
        RunStatus::Completed => "completed".green().bold(),
        RunStatus::Failed => "failed".red().bold(),
    }
}
