//! CLI output formatting utilities.

use crate::artifact::{ArtifactStatus, StageArtifact};
use crate::report::{BatchReport, ItemReport, PipelineResult};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one item's planned work.
    pub fn plan_item(key: &str, artifacts: &[StageArtifact]) {
        let cells: Vec<String> = artifacts
            .iter()
            .map(|a| {
                let status = match a.status {
                    ArtifactStatus::Fresh => style(a.status.to_string()).green(),
                    ArtifactStatus::Stale => style(a.status.to_string()).yellow(),
                    ArtifactStatus::Missing => style(a.status.to_string()).dim(),
                };
                format!("{} {}", a.stage, status)
            })
            .collect();
        println!("  {} {}  {}", style("*").cyan(), style(key).bold(), cells.join("  "));
    }

    /// Print one item's outcome.
    pub fn item_result(item: &ItemReport) {
        let elapsed = format_duration(item.elapsed_ms);
        match &item.result {
            PipelineResult::Completed => println!(
                "  {} {} completed ({})",
                style("✓").green(),
                style(&item.key).bold(),
                elapsed
            ),
            PipelineResult::SkippedAlreadyDone => println!(
                "  {} {} already done",
                style("-").dim(),
                style(&item.key).bold()
            ),
            PipelineResult::FailedAtStage { stage, error } => println!(
                "  {} {} failed at {}: {}",
                style("✗").red(),
                style(&item.key).bold(),
                style(stage).red(),
                error
            ),
            PipelineResult::Cancelled => println!(
                "  {} {} cancelled",
                style("!").yellow(),
                style(&item.key).bold()
            ),
        }
    }

    /// Print the end-of-batch summary.
    pub fn batch_summary(report: &BatchReport) {
        Output::header("Summary");
        for item in &report.items {
            Output::item_result(item);
        }
        println!();

        let line = format!(
            "{} completed, {} skipped, {} failed, {} cancelled",
            report.completed(),
            report.skipped(),
            report.failed(),
            report.cancelled()
        );
        if report.is_success() {
            Output::success(&line);
        } else {
            Output::error(&line);
        }
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format milliseconds to a human-readable duration.
fn format_duration(millis: u64) -> String {
    let total_seconds = millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
