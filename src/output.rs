use crate::models::{EvaluationReport, ItemOutcome};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print the evaluation report in the specified format
pub fn print_results(report: &EvaluationReport, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(report),
        OutputFormat::Json => print_json(report),
    }
}

/// Print the report in plain text format
fn print_plain(report: &EvaluationReport) {
    println!("=== {} ===", report.experiment_name);
    if !report.description.is_empty() {
        println!("{}", report.description);
    }
    println!();

    println!("📊 STATISTICS");
    println!("-------------");
    print_statistics_plain(report);
    println!();

    println!("📝 DETAILED RESULTS");
    println!("-------------------");
    for (i, row) in report.rows.iter().enumerate() {
        println!("Row #{}", i + 1);
        println!(
            "Item: {} ({})",
            row.item.movie_description, row.item.decade
        );
        println!("Expected: {}", row.item.expected_output);
        match &row.outcome {
            ItemOutcome::Scored { output, scores } => {
                println!("Output: {}", output);
                for score in scores {
                    println!("  • {}: {:.1} ({})", score.name, score.value, score.reason);
                }
            }
            ItemOutcome::Failed { error } => {
                println!("FAILED: {}", error);
            }
        }
        println!();
    }

    println!(
        "{} item(s) scored, {} failed",
        report.scored_count(),
        report.failed_count()
    );
}

/// Print the per-metric statistics table
fn print_statistics_plain(report: &EvaluationReport) {
    let metrics: Vec<_> = report.statistics.mean.keys().collect();

    if metrics.is_empty() {
        println!("No statistics available.");
        return;
    }

    println!(
        "{:<15} {:<8} {:<8} {:<8}",
        "Metric", "Mean", "Median", "Mode"
    );
    println!("{}", "-".repeat(45));

    for metric in metrics {
        let mean = report.statistics.mean.get(metric).unwrap_or(&0.0);
        let median = report.statistics.median.get(metric).unwrap_or(&0.0);
        let mode = report.statistics.mode.get(metric).unwrap_or(&0.0);

        println!("{:<15} {:<8.3} {:<8.3} {:<8.3}", metric, mean, median, mode);
    }
}

/// Print the report in JSON format
fn print_json(report: &EvaluationReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing report to JSON: {}", e),
    }
}

/// Store the report as pretty-printed JSON at the given path
pub fn store_report(report: &EvaluationReport, path: &str) -> Result<()> {
    let json_content =
        serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, json_content)
        .with_context(|| format!("Failed to write report to: {}", path))?;

    log::info!("Report stored to: {path}");
    Ok(())
}
