mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use massupdate_core::{
    load_config, load_config_from_env, validate_config, CommandProcedure, MigrationError,
    MigrationRunner,
};

use cli::Cli;

/// Buffer size for the progress channel
const PROGRESS_BUFFER_SIZE: usize = 64;

/// Exit code when the run completed but some version failed and strict mode is on
const EXIT_VERSION_FAILURES: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let source_dir = std::path::absolute(&cli.source_dir)
        .with_context(|| format!("Invalid source path {:?}", cli.source_dir))?;
    let update_script = std::path::absolute(&cli.update_script)
        .with_context(|| format!("Invalid update script path {:?}", cli.update_script))?;

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_config_from_env().context("Failed to load config from environment")?,
    };
    cli.apply(&mut config);
    validate_config(&config).context("Configuration validation failed")?;

    if !cli.json {
        output::print_header(&source_dir, &update_script);
    }

    let procedure = CommandProcedure::new(update_script.clone(), config.procedure.clone());
    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_BUFFER_SIZE);
    let printer = if cli.json {
        tokio::spawn(output::discard_progress(progress_rx))
    } else {
        tokio::spawn(output::print_progress(progress_rx))
    };

    let runner = MigrationRunner::new(procedure).with_progress(progress_tx);
    let result = runner.run(&source_dir, &config).await;

    // Dropping the runner closes the channel so the printer drains and exits.
    drop(runner);
    if let Err(e) = printer.await {
        error!("Progress printer failed: {}", e);
    }

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            if cli.json {
                if let MigrationError::Aborted { summary, .. } = &err {
                    output::print_json(summary)?;
                }
            }
            return Err(err).context("Migration failed");
        }
    };

    if cli.json {
        output::print_json(&summary)?;
    } else {
        output::print_footer(&summary);
    }

    if config.run.fail_on_procedure_error && !summary.is_clean() {
        error!(
            failed = summary.failed(),
            skipped = summary.skipped(),
            "Some versions were not updated"
        );
        return Ok(EXIT_VERSION_FAILURES);
    }
    Ok(0)
}
