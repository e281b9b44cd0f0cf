//! Entity store: content-addressed response bodies.

use std::path::PathBuf;

use crate::error::Result;
use crate::fsio;
use crate::key::CacheKey;
use crate::layout;

/// Blob store keyed by content digest. Write-once: a key that exists is
/// never rewritten, because its content is fixed by the digest.
#[derive(Debug, Clone)]
pub(crate) struct EntityStore {
    root: PathBuf,
    verify_writes: bool,
}

impl EntityStore {
    pub(crate) fn new(root: PathBuf, verify_writes: bool) -> Self {
        Self { root, verify_writes }
    }

    pub(crate) fn path(&self, key: &CacheKey) -> PathBuf {
        layout::key_path(&self.root, key)
    }

    pub(crate) async fn save(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if fsio::exists(&path).await {
            return Ok(());
        }
        fsio::write_atomic(&path, bytes, self.verify_writes).await
    }

    pub(crate) async fn load(&self, key: &CacheKey) -> Option<Vec<u8>> {
        fsio::read(&self.path(key)).await
    }

    pub(crate) async fn remove(&self, key: &CacheKey) -> bool {
        fsio::remove(&self.path(key)).await
    }
}
