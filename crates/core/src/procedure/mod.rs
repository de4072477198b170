//! External update procedure invoked once per staged version.
//!
//! The procedure is an opaque executable called as `<executable> <payload>`.
//! Its output is captured, never streamed, and only its success or failure
//! is interpreted.

mod command;
mod error;
mod traits;
mod types;

pub use command::CommandProcedure;
pub use error::ProcedureError;
pub use traits::UpdateProcedure;
pub use types::ProcedureOutput;
