//! Staging of archives on fast scratch storage.
//!
//! The `StagingPool` owns a single background worker that copies one archive
//! at a time into a fresh temporary directory. Requests are served in
//! submission order, which is what lets a caller stage the next version
//! while the current one is being processed.
//!
//! # Ownership
//!
//! - `schedule` creates the directory and hands it to the worker together
//!   with the request.
//! - On success the worker returns it inside a `StagingHandle` through the
//!   `PendingCopy` completion.
//! - On failure, or when nobody waits for the result any more, the worker
//!   removes the directory itself.
//! - A `StagingHandle` deletes its directory exactly once, either through
//!   `release` or, as a backstop, when dropped.
//!
//! # Example
//!
//! ```ignore
//! use massupdate_core::staging::StagingPool;
//!
//! let pool = StagingPool::new(StagingConfig::default())?;
//! let pending = pool.schedule(archive).await?;
//! let handle = pending.wait().await?;
//! run_update(handle.path()).await;
//! handle.release()?;
//! pool.shutdown().await;
//! ```

mod copy;
mod error;
mod handle;
mod pool;

pub use error::StagingError;
pub use handle::{PendingCopy, StagingHandle};
pub use pool::{StagingPool, StagingStats, StagingStatsSnapshot};
pub(crate) use pool::release_handle;
