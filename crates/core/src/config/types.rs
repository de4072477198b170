use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub procedure: ProcedureConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Archive naming convention: `<prefix>[-<qualifier>]-<major>.<minor>.<extension>`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LocatorConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Optional platform qualifiers accepted between prefix and version.
    #[serde(default = "default_qualifiers")]
    pub qualifiers: Vec<String>,
    /// Extension without the leading dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            qualifiers: default_qualifiers(),
            extension: default_extension(),
        }
    }
}

fn default_prefix() -> String {
    "FoundryVTT".to_string()
}

fn default_qualifiers() -> Vec<String> {
    vec!["Linux".to_string()]
}

fn default_extension() -> String {
    "zip".to_string()
}

/// Staging (fast scratch storage) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    /// Parent of the per-archive staging directories. `None` uses the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    /// Extract the copied archive so the payload is the unpacked tree.
    #[serde(default = "default_true")]
    pub unpack: bool,
    /// Verify the staged copy against the source with SHA-256.
    #[serde(default)]
    pub verify_checksum: bool,
    /// Buffer size for archive copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Name prefix of the staging directories.
    #[serde(default = "default_dir_prefix")]
    pub dir_prefix: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            unpack: true,
            verify_checksum: false,
            buffer_size: default_buffer_size(),
            dir_prefix: default_dir_prefix(),
        }
    }
}

impl StagingConfig {
    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, path: PathBuf) -> Self {
        self.scratch_dir = Some(path);
        self
    }

    /// Enables or disables unpacking.
    pub fn with_unpack(mut self, enabled: bool) -> Self {
        self.unpack = enabled;
        self
    }

    /// Enables checksum verification.
    pub fn with_checksum_verification(mut self, enabled: bool) -> Self {
        self.verify_checksum = enabled;
        self
    }

    /// Sets the buffer size for copies.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Directory the staging directories are created in.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    8 * 1024 * 1024 // 8 MB
}

fn default_dir_prefix() -> String {
    "mass-update-".to_string()
}

/// External update procedure configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcedureConfig {
    /// Timeout for a single invocation. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Kill the child process when the timeout elapses.
    #[serde(default = "default_true")]
    pub kill_on_timeout: bool,
}

impl Default for ProcedureConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            kill_on_timeout: true,
        }
    }
}

/// Run-level policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunConfig {
    /// Treat failed or skipped versions as a failed run.
    #[serde(default)]
    pub fail_on_procedure_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_staging_config() {
        let config = StagingConfig::default();
        assert_eq!(config.buffer_size, 8 * 1024 * 1024);
        assert!(config.unpack);
        assert!(!config.verify_checksum);
        assert_eq!(config.scratch_root(), std::env::temp_dir());
    }

    #[test]
    fn test_staging_config_builder() {
        let config = StagingConfig::default()
            .with_scratch_dir(PathBuf::from("/fast/scratch"))
            .with_unpack(false)
            .with_checksum_verification(true)
            .with_buffer_size(1024);

        assert_eq!(config.scratch_root(), PathBuf::from("/fast/scratch"));
        assert!(!config.unpack);
        assert!(config.verify_checksum);
        assert_eq!(config.buffer_size, 1024);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.locator, config.locator);
        assert_eq!(parsed.staging.buffer_size, config.staging.buffer_size);
    }
}
