//! Version discovery for archived releases.
//!
//! The `VersionLocator` scans a source directory for archives following the
//! configured naming convention and returns them ordered by numeric version,
//! so `FoundryVTT-9.280.zip` sorts before `FoundryVTT-10.290.zip`.
//!
//! # Example
//!
//! ```ignore
//! use massupdate_core::version::VersionLocator;
//! use massupdate_core::config::LocatorConfig;
//!
//! let locator = VersionLocator::new(&LocatorConfig::default())?;
//! for archive in locator.locate(Path::new("/mnt/archive/releases"))? {
//!     println!("{} -> {}", archive.version, archive.source_path.display());
//! }
//! ```

mod error;
mod locator;
mod types;

pub use error::LocatorError;
pub use locator::VersionLocator;
pub use types::{ArchiveRef, ArchiveVersion, ParseVersionError};
