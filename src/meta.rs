//! Metadata store: per-URL ordered variant lists.
//!
//! Each metadata key maps to one serialized document holding the variant
//! list, most recently written first. The codec must round-trip header
//! names, value order, and repeated values exactly; everything else about
//! the format is an implementation detail.

use std::path::{Path, PathBuf};

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::fsio;
use crate::key::CacheKey;
use crate::layout;

const FORMAT_VERSION: u32 = 1;

/// One stored (request headers, response headers) pair under a cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub request: HeaderMap,
    pub response: HeaderMap,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedVariant {
    request: Vec<(String, String)>,
    response: Vec<(String, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedMetadata {
    version: u32,
    variants: Vec<PersistedVariant>,
}

fn headermap_to_vec(map: &HeaderMap) -> Vec<(String, String)> {
    let mut items = Vec::new();
    for (name, value) in map.iter() {
        if let Ok(value_str) = value.to_str() {
            items.push((name.as_str().to_string(), value_str.to_string()));
        }
    }
    items
}

fn to_headermap(items: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in items {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) {
            map.append(name, value);
        }
    }
    map
}

/// Decodes one metadata document; anything unreadable is an empty list.
pub(crate) fn decode(data: &[u8], origin: &Path) -> Vec<Variant> {
    let persisted: PersistedMetadata = match serde_json::from_slice(data) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                error = %err,
                path = %origin.display(),
                "failed to parse cache metadata; treating as empty"
            );
            return Vec::new();
        }
    };
    if persisted.version != FORMAT_VERSION {
        warn!(
            version = persisted.version,
            path = %origin.display(),
            "unknown cache metadata version; treating as empty"
        );
        return Vec::new();
    }
    persisted
        .variants
        .iter()
        .map(|variant| Variant {
            request: to_headermap(&variant.request),
            response: to_headermap(&variant.response),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub(crate) struct MetaStore {
    root: PathBuf,
    verify_writes: bool,
}

impl MetaStore {
    pub(crate) fn new(root: PathBuf, verify_writes: bool) -> Self {
        Self { root, verify_writes }
    }

    pub(crate) fn path(&self, key: &CacheKey) -> PathBuf {
        layout::key_path(&self.root, key)
    }

    /// Loads the variant list for a key. A missing file reads as an empty
    /// list, and so does a corrupt one: the next write replaces it.
    pub(crate) async fn read(&self, key: &CacheKey) -> Vec<Variant> {
        self.read_path(&self.path(key)).await
    }

    pub(crate) async fn read_path(&self, path: &Path) -> Vec<Variant> {
        let Some(data) = fsio::read(path).await else {
            return Vec::new();
        };
        decode(&data, path)
    }

    pub(crate) async fn write(&self, key: &CacheKey, variants: &[Variant]) -> Result<()> {
        let persisted = PersistedMetadata {
            version: FORMAT_VERSION,
            variants: variants
                .iter()
                .map(|variant| PersistedVariant {
                    request: headermap_to_vec(&variant.request),
                    response: headermap_to_vec(&variant.response),
                })
                .collect(),
        };
        let data = serde_json::to_vec(&persisted)
            .map_err(|source| StoreError::Serialization { source })?;
        fsio::write_atomic(&self.path(key), &data, self.verify_writes).await
    }

    pub(crate) async fn remove(&self, key: &CacheKey) -> bool {
        fsio::remove(&self.path(key)).await
    }
}
