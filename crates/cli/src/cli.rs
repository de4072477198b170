use std::path::PathBuf;

use clap::{ArgAction, Parser};

use massupdate_core::Config;

#[derive(Parser, Debug)]
#[command(
    name = "mass-update",
    version,
    about = "Run an update procedure over every archived FoundryVTT release, oldest first"
)]
pub struct Cli {
    /// Directory holding the release archives
    pub source_dir: PathBuf,

    /// Executable invoked as `<UPDATE_SCRIPT> <payload>` for every version
    pub update_script: PathBuf,

    #[arg(long, value_name = "FILE", help = "Load settings from a TOML file")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Create staging directories here instead of the system temp dir"
    )]
    pub scratch_dir: Option<PathBuf>,

    #[arg(long, help = "Stage the archive copy without extracting it")]
    pub no_unpack: bool,

    #[arg(long, help = "Compare a SHA-256 of every copy against its source")]
    pub verify_checksum: bool,

    #[arg(
        long,
        value_name = "SECS",
        help = "Kill the update procedure after this many seconds"
    )]
    pub timeout: Option<u64>,

    #[arg(long, help = "Exit with code 2 if any version failed or was skipped")]
    pub strict: bool,

    #[arg(long, help = "Print the run summary as JSON instead of progress lines")]
    pub json: bool,

    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.scratch_dir {
            config.staging.scratch_dir = Some(dir.clone());
        }
        if self.no_unpack {
            config.staging.unpack = false;
        }
        if self.verify_checksum {
            config.staging.verify_checksum = true;
        }
        if self.timeout.is_some() {
            config.procedure.timeout_secs = self.timeout;
        }
        if self.strict {
            config.run.fail_on_procedure_error = true;
        }
    }
}
