//! Copy and unpack steps executed by the staging worker.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use zip::ZipArchive;

use crate::config::StagingConfig;
use crate::version::ArchiveRef;

use super::error::StagingError;

/// Copies `archive` into `directory` and unpacks it when configured.
///
/// Returns the directory together with the number of bytes copied. On
/// failure the directory has been removed.
pub(crate) async fn stage_archive(
    archive: &ArchiveRef,
    directory: TempDir,
    config: &StagingConfig,
) -> Result<(TempDir, u64), StagingError> {
    let destination = directory.path().join(archive.file_name());

    let bytes = match copy_verified(archive, &destination, config).await {
        Ok(bytes) => bytes,
        Err(e) => {
            discard(directory).await;
            return Err(e);
        }
    };

    if !config.unpack {
        return Ok((directory, bytes));
    }

    let zip_path = destination.clone();
    let directory = tokio::task::spawn_blocking(move || unpack_in_place(directory, &zip_path))
        .await
        .map_err(|e| StagingError::extract(destination, "join", e))??;

    Ok((directory, bytes))
}

/// Copies the archive, comparing checksums when configured.
async fn copy_verified(
    archive: &ArchiveRef,
    destination: &Path,
    config: &StagingConfig,
) -> Result<u64, StagingError> {
    let (bytes, source_checksum) = copy_file(
        &archive.source_path,
        destination,
        config.buffer_size,
        config.verify_checksum,
    )
    .await?;

    if let Some(expected) = source_checksum {
        let actual = file_checksum(destination, config.buffer_size).await?;
        if actual != expected {
            return Err(StagingError::ChecksumMismatch {
                path: destination.to_path_buf(),
                expected,
                actual,
            });
        }
    }

    Ok(bytes)
}

/// Extracts the copied archive next to itself and removes it. Blocking.
///
/// The directory is owned here until extraction has stopped, so nothing can
/// delete it while entries are still being written.
fn unpack_in_place(directory: TempDir, zip_path: &Path) -> Result<TempDir, StagingError> {
    let result = extract_zip(zip_path, directory.path())
        .and_then(|()| fs::remove_file(zip_path).map_err(StagingError::Io));

    match result {
        Ok(()) => Ok(directory),
        Err(e) => {
            let path = directory.path().to_path_buf();
            if let Err(cleanup) = directory.close() {
                tracing::warn!("Failed to remove {}: {}", path.display(), cleanup);
            }
            Err(e)
        }
    }
}

/// Removes a staging directory on the blocking pool.
async fn discard(directory: TempDir) {
    let path = directory.path().to_path_buf();
    let result = match tokio::task::spawn_blocking(move || directory.close()).await {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(e)),
    };
    if let Err(e) = result {
        tracing::warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Streams `source` into `destination`, hashing the source bytes when asked.
async fn copy_file(
    source: &Path,
    destination: &Path,
    buffer_size: usize,
    calculate_checksum: bool,
) -> Result<(u64, Option<String>), StagingError> {
    let copy_err = |e: io::Error| {
        StagingError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
    };

    let source_file = File::open(source).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StagingError::SourceNotFound {
                path: source.to_path_buf(),
            }
        } else {
            copy_err(e)
        }
    })?;
    let dest_file = File::create(destination).await.map_err(copy_err)?;

    let mut reader = BufReader::with_capacity(buffer_size, source_file);
    let mut writer = BufWriter::with_capacity(buffer_size, dest_file);
    let mut hasher = calculate_checksum.then(Sha256::new);

    let mut total_bytes = 0u64;
    let mut buffer = vec![0u8; buffer_size];
    loop {
        let bytes_read = reader.read(&mut buffer).await.map_err(copy_err)?;
        if bytes_read == 0 {
            break;
        }
        if let Some(ref mut h) = hasher {
            h.update(&buffer[..bytes_read]);
        }
        writer
            .write_all(&buffer[..bytes_read])
            .await
            .map_err(copy_err)?;
        total_bytes += bytes_read as u64;
    }

    writer.flush().await.map_err(copy_err)?;
    writer.into_inner().sync_all().await.map_err(copy_err)?;

    Ok((total_bytes, hasher.map(|h| format!("{:x}", h.finalize()))))
}

async fn file_checksum(path: &Path, buffer_size: usize) -> Result<String, StagingError> {
    let file = File::open(path).await?;
    let mut reader = BufReader::with_capacity(buffer_size, file);
    let mut buffer = vec![0u8; buffer_size];
    let mut hasher = Sha256::new();
    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extracts a zip archive into `target`. Blocking.
fn extract_zip(source: &Path, target: &Path) -> Result<(), StagingError> {
    let file = fs::File::open(source)
        .map_err(|e| StagingError::extract(source.to_path_buf(), "open", e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| StagingError::extract(source.to_path_buf(), "decode", e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| StagingError::extract(source.to_path_buf(), "read_entry", e))?;
        let entry_path = sanitize_entry_path(source, entry.name())?;
        let destination = target.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|e| StagingError::extract(source.to_path_buf(), "create_dir", e))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StagingError::extract(source.to_path_buf(), "create_parent", e))?;
        }

        let mut output = fs::File::create(&destination)
            .map_err(|e| StagingError::extract(source.to_path_buf(), "create_file", e))?;
        io::copy(&mut entry, &mut output)
            .map_err(|e| StagingError::extract(source.to_path_buf(), "write", e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&destination, fs::Permissions::from_mode(mode))
                .map_err(|e| StagingError::extract(source.to_path_buf(), "set_permissions", e))?;
        }
    }

    Ok(())
}

fn sanitize_entry_path(archive: &Path, entry: &str) -> Result<PathBuf, StagingError> {
    let unsafe_entry = || StagingError::UnsafeEntry {
        archive: archive.to_path_buf(),
        entry: entry.to_string(),
    };

    let mut sanitized = PathBuf::new();
    for component in Path::new(entry).components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_entry())
            }
        }
    }
    if sanitized.as_os_str().is_empty() {
        return Err(unsafe_entry());
    }
    Ok(sanitized)
}
