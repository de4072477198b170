//! Version-ordered prefetching pipeline.
//!
//! `PrefetchPipeline` turns a source directory into a lazy, version-ordered
//! sequence of staged directories. While the consumer works on one version
//! the next one is already being copied by the staging worker, so copy
//! latency stays off the critical path for every version after the first.
//!
//! At most two staging directories exist at any time: the one being
//! consumed and the one being prefetched.
//!
//! # Example
//!
//! ```ignore
//! use massupdate_core::pipeline::{PrefetchPipeline, StageConsumer};
//!
//! let pipeline = PrefetchPipeline::open(&source_dir, &config.locator, config.staging).await?;
//! let report = pipeline.drive(&mut consumer).await?;
//! println!("Processed {} versions", report.consumed);
//! ```

mod error;
mod prefetch;
mod traits;

pub use error::PipelineError;
pub use prefetch::{DriveReport, PrefetchPipeline};
pub use traits::StageConsumer;
