//! Testing utilities for pipeline and migration tests.
//!
//! Provides a recording `MockProcedure` and fixtures that write release
//! archives shaped like real ones.
//!
//! # Example
//!
//! ```rust,ignore
//! use massupdate_core::testing::{fixtures, MockProcedure};
//!
//! fixtures::write_release_set(source.path(), &["9.280", "10.290"]);
//! let procedure = MockProcedure::new();
//! MigrationRunner::new(procedure.clone()).run(source.path(), &config).await?;
//! assert_eq!(procedure.invocations().await.len(), 2);
//! ```

mod mock_procedure;

pub use mock_procedure::{MockProcedure, RecordedInvocation};

/// Archive fixtures.
///
/// These helpers panic on I/O failure; they are meant for tests only.
pub mod fixtures {
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Name of the single top-level directory inside release archives.
    pub const PAYLOAD_DIR: &str = "foundryvtt";

    /// File inside the payload holding the release version.
    pub const VERSION_FILE: &str = "VERSION";

    /// Writes a zip archive containing the given `(path, contents)` entries.
    /// Paths ending in `/` become directories.
    pub fn write_archive(dir: &Path, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(file_name);
        let file = File::create(&path).expect("create archive");
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().unix_permissions(0o644);
        for (name, contents) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).expect("add directory");
            } else {
                zip.start_file(*name, options).expect("start file");
                zip.write_all(contents).expect("write entry");
            }
        }
        zip.finish().expect("finish archive");
        path
    }

    /// Writes a release archive with a single payload directory.
    pub fn write_release_archive(dir: &Path, file_name: &str, version: &str) -> PathBuf {
        let package = format!(r#"{{"name":"foundryvtt","version":"{version}"}}"#);
        write_archive(
            dir,
            file_name,
            &[
                ("foundryvtt/", b""),
                ("foundryvtt/VERSION", version.as_bytes()),
                ("foundryvtt/resources/app/package.json", package.as_bytes()),
            ],
        )
    }

    /// Writes a release archive padded with `extra_files` small resource files,
    /// so that unpacking it takes a noticeable amount of time.
    pub fn write_bulky_release_archive(
        dir: &Path,
        file_name: &str,
        version: &str,
        extra_files: usize,
    ) -> PathBuf {
        let path = dir.join(file_name);
        let file = File::create(&path).expect("create archive");
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().unix_permissions(0o644);
        zip.add_directory("foundryvtt/", options).expect("add directory");
        zip.start_file("foundryvtt/VERSION", options).expect("start file");
        zip.write_all(version.as_bytes()).expect("write version");
        for index in 0..extra_files {
            let name = format!("foundryvtt/resources/app/public/{:03}/asset-{index}.json", index % 100);
            zip.start_file(name, options).expect("start file");
            zip.write_all(br#"{"asset":true}"#).expect("write entry");
        }
        zip.finish().expect("finish archive");
        path
    }

    /// Writes `FoundryVTT-<version>.zip` for every version.
    pub fn write_release_set(dir: &Path, versions: &[&str]) -> Vec<PathBuf> {
        versions
            .iter()
            .map(|v| write_release_archive(dir, &format!("FoundryVTT-{v}.zip"), v))
            .collect()
    }

    /// Writes an archive with two top-level entries.
    pub fn write_multi_root_archive(dir: &Path, file_name: &str) -> PathBuf {
        write_archive(
            dir,
            file_name,
            &[("foundryvtt/VERSION", b"0.0"), ("README.txt", b"stray")],
        )
    }

    /// Writes a file with an archive name that is not a valid zip.
    pub fn write_corrupt_archive(dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, b"this is not a zip archive").expect("write corrupt archive");
        path
    }

    /// Version recorded in an unpacked payload, if present.
    pub fn read_payload_version(payload: &Path) -> Option<String> {
        std::fs::read_to_string(payload.join(VERSION_FILE)).ok()
    }
}
