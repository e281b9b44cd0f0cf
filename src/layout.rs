//! Key to filesystem path mapping.
//!
//! A key fans out as `root/k[0..2]/k[2..4]/k[4..6]/k[6..]`: the kind prefix
//! becomes the top directory (`md`, `en`), then two 256-way hex levels, then
//! the digest tail. Lock files sit next to their metadata file with a `.lck`
//! suffix.

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::key::{CacheKey, KEY_LEN};

pub(crate) const LOCK_SUFFIX: &str = ".lck";

pub(crate) fn key_path(root: &Path, key: &CacheKey) -> PathBuf {
    let k = key.as_str();
    root.join(&k[0..2]).join(&k[2..4]).join(&k[4..6]).join(&k[6..])
}

pub(crate) fn lock_path(root: &Path, key: &CacheKey) -> PathBuf {
    let mut path = key_path(root, key).into_os_string();
    path.push(LOCK_SUFFIX);
    PathBuf::from(path)
}

/// Inverse of [`key_path`]: strips `root` and rejoins the components.
pub(crate) fn path_key(root: &Path, path: &Path) -> Result<CacheKey> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| StoreError::invalid_key(path.display().to_string()))?;
    let mut joined = String::with_capacity(KEY_LEN);
    for component in rel.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| StoreError::invalid_key(path.display().to_string()))?;
        joined.push_str(part);
    }
    CacheKey::parse(&joined)
}
