//! Trait definitions for the pipeline module.

use async_trait::async_trait;
use std::ops::ControlFlow;

use crate::staging::StagingHandle;

/// Processes staged versions handed out by `PrefetchPipeline::drive`.
///
/// The handle is only borrowed: the pipeline releases the directory after
/// `consume` returns, whatever it returned.
#[async_trait]
pub trait StageConsumer: Send {
    /// Processes one staged version. `Break` stops the pipeline early.
    async fn consume(&mut self, handle: &StagingHandle) -> ControlFlow<()>;
}
