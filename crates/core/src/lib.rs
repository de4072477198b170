pub mod config;
pub mod pipeline;
pub mod procedure;
pub mod runner;
pub mod staging;
pub mod testing;
pub mod version;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError, LocatorConfig,
    ProcedureConfig, RunConfig, StagingConfig,
};
pub use pipeline::{DriveReport, PipelineError, PrefetchPipeline, StageConsumer};
pub use procedure::{CommandProcedure, ProcedureError, ProcedureOutput, UpdateProcedure};
pub use runner::{
    locate_payload, MigrationError, MigrationProgress, MigrationRunner, MigrationSummary,
    PayloadError, VersionOutcome, VersionReport,
};
pub use staging::{PendingCopy, StagingError, StagingHandle, StagingPool, StagingStatsSnapshot};
pub use version::{ArchiveRef, ArchiveVersion, LocatorError, VersionLocator};
