//! Trait definitions for the procedure module.

use async_trait::async_trait;
use std::path::Path;

use super::error::ProcedureError;
use super::types::ProcedureOutput;

/// An update procedure run against one unpacked payload.
#[async_trait]
pub trait UpdateProcedure: Send + Sync {
    /// Returns a display name for this procedure.
    fn name(&self) -> &str;

    /// Runs the procedure with `payload` as its argument.
    async fn invoke(&self, payload: &Path) -> Result<ProcedureOutput, ProcedureError>;

    /// Validates that the procedure can be invoked.
    async fn validate(&self) -> Result<(), ProcedureError>;
}
