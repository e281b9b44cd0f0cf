//! The sweeper: two-phase garbage collection.
//!
//! Phase one walks the metadata tree, expiring nothing but recording for
//! every content digest whether any variant anywhere still references it
//! while fresh (a sticky OR: a digest needed by one URL survives even if
//! every other URL's reference went stale). Metadata files whose variants
//! are all stale are unlinked along with their lock sibling. Phase two
//! unlinks every digest no fresh variant claimed.
//!
//! Removing fully-stale metadata first means a repeated run reaches the
//! same decisions; the pass is idempotent modulo concurrent writes.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::fsio;
use crate::key::{CacheKey, KeyKind};
use crate::layout::LOCK_SUFFIX;
use crate::store::{HttpStore, X_CONTENT_DIGEST};

/// Deletion counts from one [`HttpStore::clear`] pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    /// Fully-stale metadata files unlinked.
    pub metadata_removed: u64,
    /// Orphaned entity blobs unlinked.
    pub entities_removed: u64,
}

impl SweepStats {
    /// Total files deleted.
    pub fn removed(&self) -> u64 {
        self.metadata_removed + self.entities_removed
    }
}

impl HttpStore {
    /// Garbage-collects stale metadata and orphaned bodies; returns what was
    /// deleted. Manual operation; the store runs no background sweeps.
    pub async fn clear(&self) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let mut referenced: HashMap<CacheKey, bool> = HashMap::new();

        let inner = self.state();
        let md_root = inner.root.join("md");
        let mut shard1_entries = match fs::read_dir(&md_root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(stats),
            Err(err) => return Err(StoreError::io(err, &md_root, "walk metadata tree")),
        };

        while let Some(shard1) = next_entry(&mut shard1_entries, &md_root).await? {
            if !is_dir(&shard1).await {
                continue;
            }
            let mut shard2_entries = match fs::read_dir(shard1.path()).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::io(err, shard1.path(), "walk metadata tree")),
            };
            while let Some(shard2) = next_entry(&mut shard2_entries, &md_root).await? {
                if !is_dir(&shard2).await {
                    continue;
                }
                let mut entries = match fs::read_dir(shard2.path()).await {
                    Ok(entries) => entries,
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => {
                        return Err(StoreError::io(err, shard2.path(), "walk metadata tree"));
                    }
                };
                while let Some(entry) = next_entry(&mut entries, &md_root).await? {
                    let path = entry.path();
                    if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                        continue;
                    }
                    if skip_file(&path) {
                        continue;
                    }
                    let Ok(key) = self.key_for_path(&path) else {
                        warn!(path = %path.display(), "unrecognized file in metadata tree");
                        continue;
                    };
                    if key.kind() != KeyKind::Metadata {
                        continue;
                    }

                    if self.sweep_metadata_file(&path, &mut referenced).await {
                        stats.metadata_removed += 1;
                    }
                }
            }
        }

        for (digest, needed) in referenced {
            if needed {
                continue;
            }
            if self.state().entities.remove(&digest).await {
                stats.entities_removed += 1;
            }
        }

        debug!(
            metadata = stats.metadata_removed,
            entities = stats.entities_removed,
            "sweep finished"
        );
        Ok(stats)
    }

    /// Folds one metadata file into the reference map; removes the file (and
    /// its lock sibling) when every variant is stale. Returns whether the
    /// metadata file was unlinked.
    async fn sweep_metadata_file(
        &self,
        path: &Path,
        referenced: &mut HashMap<CacheKey, bool>,
    ) -> bool {
        let inner = self.state();
        let variants = inner.meta.read_path(path).await;

        let mut all_stale = true;
        for variant in &variants {
            let fresh = inner.freshness.is_fresh(&variant.response);
            if fresh {
                all_stale = false;
            }
            let digest = variant
                .response
                .get(&X_CONTENT_DIGEST)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| CacheKey::parse(value).ok());
            if let Some(digest) = digest {
                referenced
                    .entry(digest)
                    .and_modify(|needed| *needed = *needed || fresh)
                    .or_insert(fresh);
            }
        }

        if !all_stale {
            return false;
        }

        // An empty or unreadable list has nothing fresh left either way.
        let removed = fsio::remove(path).await;
        let mut lock = path.to_path_buf().into_os_string();
        lock.push(LOCK_SUFFIX);
        fsio::remove(&PathBuf::from(lock)).await;
        removed
    }
}

fn skip_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    name.starts_with(fsio::TEMP_PREFIX) || path.to_string_lossy().ends_with(LOCK_SUFFIX)
}

async fn next_entry(
    entries: &mut fs::ReadDir,
    root: &Path,
) -> Result<Option<fs::DirEntry>> {
    entries
        .next_entry()
        .await
        .map_err(|err| StoreError::io(err, root, "walk metadata tree"))
}

async fn is_dir(entry: &fs::DirEntry) -> bool {
    entry
        .file_type()
        .await
        .map(|file_type| file_type.is_dir())
        .unwrap_or(false)
}
