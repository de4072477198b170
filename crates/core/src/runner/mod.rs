//! Batch migration driver.
//!
//! `MigrationRunner` drives a `PrefetchPipeline` and, for every staged
//! version in order, finds the unpacked payload and invokes the update
//! procedure on it. Per-version problems are recorded and the batch goes on;
//! locator and staging failures abort the run.

mod error;
mod migration;
mod types;

pub use error::{MigrationError, PayloadError};
pub use migration::{locate_payload, MigrationRunner};
pub use types::{MigrationProgress, MigrationSummary, VersionOutcome, VersionReport};
