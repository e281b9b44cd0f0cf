//! Atomic file I/O.
//!
//! Writes go to a `tmp_` sibling first and reach the final name through a
//! rename, so readers observe either the previous content or the new content,
//! never a partial file. Deletes are best-effort and report a boolean.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, StoreError};

pub(crate) const TEMP_PREFIX: &str = "tmp_";

/// Writes `bytes` to `path` through a sibling temp file and an atomic rename.
///
/// With `verify` set the temp file is read back and compared before the
/// rename; otherwise the file is fsynced instead.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8], verify: bool) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::io(
            ErrorKind::InvalidInput.into(),
            path,
            "resolve parent directory",
        )
    })?;
    fs::create_dir_all(parent)
        .await
        .map_err(|err| StoreError::io(err, parent, "create directory"))?;

    let temp = parent.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
    let result = stage_and_rename(&temp, path, bytes, verify).await;
    if result.is_err() {
        let _ = fs::remove_file(&temp).await;
    }
    result
}

async fn stage_and_rename(temp: &Path, path: &Path, bytes: &[u8], verify: bool) -> Result<()> {
    let mut file = fs::File::create(temp)
        .await
        .map_err(|err| StoreError::io(err, temp, "create temp file"))?;
    file.write_all(bytes)
        .await
        .map_err(|err| StoreError::io(err, temp, "write temp file"))?;
    file.flush()
        .await
        .map_err(|err| StoreError::io(err, temp, "flush temp file"))?;
    if !verify {
        file.sync_all()
            .await
            .map_err(|err| StoreError::io(err, temp, "sync temp file"))?;
    }
    drop(file);

    if verify {
        let written = fs::read(temp)
            .await
            .map_err(|err| StoreError::io(err, temp, "read back temp file"))?;
        if written != bytes {
            return Err(StoreError::VerifyFailed {
                path: path.to_path_buf(),
            });
        }
    }

    fs::rename(temp, path)
        .await
        .map_err(|err| StoreError::io(err, path, "rename temp file"))
}

/// Reads a file, treating both absence and read failure as a miss.
pub(crate) async fn read(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to read cache file");
            None
        }
    }
}

/// Best-effort unlink; reports whether a file was removed.
pub(crate) async fn remove(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to remove cache file");
            false
        }
    }
}

pub(crate) async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Removes `tmp_` leftovers from interrupted writes under `root`. Temp files
/// only ever live in shard directories, three levels below the root.
pub(crate) async fn prune_temp_files(root: &Path) {
    let mut kinds = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(_) => return,
    };
    while let Ok(Some(kind)) = kinds.next_entry().await {
        let mut shard1_entries = match fs::read_dir(kind.path()).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Ok(Some(shard1)) = shard1_entries.next_entry().await {
            let mut shard2_entries = match fs::read_dir(shard1.path()).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Ok(Some(shard2)) = shard2_entries.next_entry().await {
                let mut files = match fs::read_dir(shard2.path()).await {
                    Ok(entries) => entries,
                    Err(_) => continue,
                };
                while let Ok(Some(entry)) = files.next_entry().await {
                    let name = entry.file_name();
                    if name.to_string_lossy().starts_with(TEMP_PREFIX) {
                        let _ = fs::remove_file(entry.path()).await;
                    }
                }
            }
        }
    }
}
