use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Result, StoreError};

fn default_key_cache_capacity() -> usize {
    1024
}

fn default_verify_writes() -> bool {
    true
}

/// Configuration for opening an [`crate::HttpStore`].
///
/// Derives `Deserialize` so a host can embed it in its own configuration
/// file; everything except `root` has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreOptions {
    /// Directory the cache tree lives under. Created on open.
    pub root: PathBuf,
    /// Capacity of the per-store request-URI → cache-key memo.
    #[serde(default = "default_key_cache_capacity")]
    pub key_cache_capacity: usize,
    /// Read written files back and compare before the final rename. Turning
    /// this off replaces the check with an fsync.
    #[serde(default = "default_verify_writes")]
    pub verify_writes: bool,
}

impl StoreOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            key_cache_capacity: default_key_cache_capacity(),
            verify_writes: default_verify_writes(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_cache_capacity == 0 {
            return Err(StoreError::configuration(
                "key_cache_capacity must be at least 1",
            ));
        }
        if self.root.as_os_str().is_empty() {
            return Err(StoreError::configuration("root must not be empty"));
        }
        Ok(())
    }
}
