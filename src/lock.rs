//! Per-key advisory fill locks.
//!
//! A lock is the existence of a `.lck` file next to the metadata file,
//! taken by exclusive create. The registry remembers every lock this
//! process acquired so `cleanup` can release them on shutdown; a sentinel
//! left by a crashed process persists until someone removes it.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::fsio;
use crate::key::CacheKey;
use crate::layout;

/// Result of a lock attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// This store now owns the fill for the key.
    Acquired,
    /// Another fill holds the sentinel at the given path.
    Held(PathBuf),
    /// The sentinel could not be created for a reason other than contention.
    Failed,
}

#[derive(Debug)]
pub(crate) struct LockRegistry {
    root: PathBuf,
    started_at: u64,
    owned: Mutex<Vec<PathBuf>>,
}

impl LockRegistry {
    pub(crate) fn new(root: PathBuf) -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            root,
            started_at,
            owned: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn path(&self, key: &CacheKey) -> PathBuf {
        layout::lock_path(&self.root, key)
    }

    pub(crate) async fn lock(&self, key: &CacheKey) -> LockOutcome {
        let path = self.path(key);
        if let Some(parent) = path.parent()
            && let Err(err) = fs::create_dir_all(parent).await
        {
            warn!(error = %err, path = %parent.display(), "failed to create lock directory");
            return LockOutcome::Failed;
        }

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                // Owner provenance, so a dead holder can be identified.
                let stamp = format!("{} {}\n", std::process::id(), self.started_at);
                let _ = file.write_all(stamp.as_bytes()).await;
                let _ = file.flush().await;
                self.owned.lock().push(path);
                LockOutcome::Acquired
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => LockOutcome::Held(path),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to create lock file");
                LockOutcome::Failed
            }
        }
    }

    pub(crate) async fn unlock(&self, key: &CacheKey) -> bool {
        let path = self.path(key);
        self.owned.lock().retain(|owned| owned != &path);
        fsio::remove(&path).await
    }

    pub(crate) async fn is_locked(&self, key: &CacheKey) -> bool {
        fsio::exists(&self.path(key)).await
    }

    /// Releases every lock this process still owns, best-effort.
    pub(crate) async fn cleanup(&self) {
        let owned: Vec<PathBuf> = std::mem::take(&mut *self.owned.lock());
        for path in owned {
            fsio::remove(&path).await;
        }
    }
}
