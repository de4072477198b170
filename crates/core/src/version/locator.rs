//! Directory scanning and version ordering.

use regex_lite::Regex;
use std::path::Path;

use crate::config::LocatorConfig;

use super::error::LocatorError;
use super::types::{ArchiveRef, ArchiveVersion};

/// Finds versioned archives in a directory.
#[derive(Debug, Clone)]
pub struct VersionLocator {
    prefix: String,
    suffix: String,
    pattern: Regex,
    expected: String,
}

impl VersionLocator {
    /// Builds a locator for the given naming convention.
    pub fn new(config: &LocatorConfig) -> Result<Self, LocatorError> {
        let qualifiers = if config.qualifiers.is_empty() {
            String::new()
        } else {
            let alternatives: Vec<String> = config
                .qualifiers
                .iter()
                .map(|q| regex_lite::escape(q))
                .collect();
            format!("(?:-(?:{}))?", alternatives.join("|"))
        };
        let pattern = format!(
            r"^{}{}-(\d+\.\d+)\.{}$",
            regex_lite::escape(&config.prefix),
            qualifiers,
            regex_lite::escape(&config.extension)
        );
        let pattern = Regex::new(&pattern).map_err(|e| LocatorError::InvalidPattern {
            reason: e.to_string(),
        })?;

        let expected = if config.qualifiers.is_empty() {
            format!("{}-<major>.<minor>.{}", config.prefix, config.extension)
        } else {
            format!(
                "{}[-{}]-<major>.<minor>.{}",
                config.prefix,
                config.qualifiers.join("|"),
                config.extension
            )
        };

        Ok(Self {
            prefix: config.prefix.clone(),
            suffix: format!(".{}", config.extension),
            pattern,
            expected,
        })
    }

    /// Whether a file name belongs to the archive family (prefix and extension match).
    pub fn is_candidate(&self, file_name: &str) -> bool {
        self.is_candidate_bytes(file_name.as_bytes())
    }

    fn is_candidate_bytes(&self, file_name: &[u8]) -> bool {
        file_name.starts_with(self.prefix.as_bytes()) && file_name.ends_with(self.suffix.as_bytes())
    }

    fn malformed(&self, directory: &Path, file_name: String) -> LocatorError {
        LocatorError::MalformedName {
            directory: directory.to_path_buf(),
            file_name,
            expected: self.expected.clone(),
        }
    }

    /// Extracts the version from a candidate file name.
    ///
    /// Returns `None` when the name does not follow the full convention.
    pub fn parse_file_name(&self, file_name: &str) -> Option<ArchiveVersion> {
        let caps = self.pattern.captures(file_name)?;
        caps.get(1)?.as_str().parse().ok()
    }

    /// Lists every archive in `directory`, sorted ascending by version.
    ///
    /// Archives sharing a version keep file-name order.
    pub fn locate(&self, directory: &Path) -> Result<Vec<ArchiveRef>, LocatorError> {
        let read_err = |source: std::io::Error| LocatorError::ReadDir {
            path: directory.to_path_buf(),
            source,
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(directory).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if !self.is_candidate_bytes(file_name.as_encoded_bytes()) {
                continue;
            }
            // A non UTF-8 name cannot carry a parseable version.
            let Some(name) = file_name.to_str() else {
                return Err(self.malformed(directory, file_name.to_string_lossy().into_owned()));
            };
            names.push(name.to_string());
        }
        names.sort();

        let mut archives = Vec::with_capacity(names.len());
        for name in names {
            let Some(version) = self.parse_file_name(&name) else {
                return Err(self.malformed(directory, name));
            };
            archives.push(ArchiveRef::new(directory.join(&name), version));
        }

        archives.sort_by_key(|a| a.version);

        for pair in archives.windows(2) {
            if pair[0].version == pair[1].version {
                tracing::warn!(
                    version = %pair[0].version,
                    "Archives {} and {} share a version, processing in file name order",
                    pair[0].file_name(),
                    pair[1].file_name()
                );
            }
        }

        tracing::debug!(
            "Located {} archive(s) in {}",
            archives.len(),
            directory.display()
        );

        Ok(archives)
    }
}
