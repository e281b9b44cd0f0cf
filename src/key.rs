use std::fmt;

use sha1::{Digest, Sha1};

use crate::error::{Result, StoreError};

/// Total key length: two-character kind prefix plus 40 hex digest chars.
pub(crate) const KEY_LEN: usize = 42;

const METADATA_PREFIX: &str = "md";
const ENTITY_PREFIX: &str = "en";

/// Which half of the store a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Per-URL variant list.
    Metadata,
    /// Content-addressed body blob.
    Entity,
}

impl KeyKind {
    fn prefix(self) -> &'static str {
        match self {
            KeyKind::Metadata => METADATA_PREFIX,
            KeyKind::Entity => ENTITY_PREFIX,
        }
    }
}

/// A 42-character store key: `md` or `en` followed by the lowercase hex
/// SHA-1 of the canonical URI or of the body bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Metadata key for a canonical request URI.
    pub fn metadata(canonical_uri: &str) -> Self {
        Self::hashed(KeyKind::Metadata, canonical_uri.as_bytes())
    }

    /// Entity key (content digest) for a response body.
    pub fn entity(body: &[u8]) -> Self {
        Self::hashed(KeyKind::Entity, body)
    }

    fn hashed(kind: KeyKind, input: &[u8]) -> Self {
        Self(format!("{}{}", kind.prefix(), hex::encode(Sha1::digest(input))))
    }

    /// Parses a key previously produced by this store.
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != KEY_LEN || !value.is_ascii() {
            return Err(StoreError::invalid_key(value));
        }
        let (prefix, digest) = value.split_at(2);
        if prefix != METADATA_PREFIX && prefix != ENTITY_PREFIX {
            return Err(StoreError::invalid_key(value));
        }
        let hex_ok = digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !hex_ok {
            return Err(StoreError::invalid_key(value));
        }
        Ok(Self(value.to_string()))
    }

    pub fn kind(&self) -> KeyKind {
        if self.0.starts_with(METADATA_PREFIX) {
            KeyKind::Metadata
        } else {
            KeyKind::Entity
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
