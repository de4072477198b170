//! Progress output on stdout.

use std::path::Path;

use tokio::sync::mpsc;

use massupdate_core::{MigrationProgress, MigrationSummary, VersionOutcome};

/// Prints the run header.
pub fn print_header(source_dir: &Path, update_script: &Path) {
    println!("Updating FoundryVTT versions:");
    println!("  Source Path: {}", source_dir.display());
    println!("  Update Script: {}", update_script.display());
}

/// Prints human-readable progress lines until the sender is dropped.
pub async fn print_progress(mut rx: mpsc::Receiver<MigrationProgress>) {
    while let Some(progress) = rx.recv().await {
        match progress {
            MigrationProgress::Processing { payload, .. } => {
                let name = payload
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| payload.display().to_string());
                println!("Generating package-lock.json for {name}");
            }
            MigrationProgress::Finished { report } => match &report.outcome {
                VersionOutcome::Succeeded { .. } => {}
                VersionOutcome::ProcedureFailed { reason, output } => {
                    let detail = output.as_ref().and_then(|o| o.summary_line());
                    match detail {
                        Some(line) => println!("  {}: failed ({reason}): {line}", report.version),
                        None => println!("  {}: failed ({reason})", report.version),
                    }
                }
                VersionOutcome::Skipped { reason } => {
                    println!("  {}: skipped ({reason})", report.version);
                }
            },
            MigrationProgress::Started { .. }
            | MigrationProgress::Staged { .. }
            | MigrationProgress::Completed { .. } => {}
        }
    }
}

/// Drains progress events without printing them.
pub async fn discard_progress(mut rx: mpsc::Receiver<MigrationProgress>) {
    while rx.recv().await.is_some() {}
}

/// Prints the completion line with per-outcome counts.
pub fn print_footer(summary: &MigrationSummary) {
    if !summary.is_clean() {
        println!(
            "  {} succeeded, {} failed, {} skipped",
            summary.succeeded(),
            summary.failed(),
            summary.skipped()
        );
    }
    println!("Updates complete");
}

/// Prints the summary as pretty JSON.
pub fn print_json(summary: &MigrationSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
