//! Persistent, content-addressed HTTP cache store.
//!
//! This crate is the disk half of a reverse-proxy cache: given an HTTP
//! request it returns a previously stored response variant, and given a
//! request/response pair it persists both so equivalent requests can be
//! served from disk. It provides:
//!
//! - A metadata store mapping each URL to an ordered list of variants
//!   (stored request headers + stored response headers), selected at lookup
//!   through `Vary` matching
//! - A content-addressed entity store deduplicating response bodies by
//!   SHA-1 digest
//! - Per-key advisory fill locks that serialize concurrent cache fills
//! - A two-phase sweeper collecting stale metadata and orphaned bodies
//!
//! Freshness is not decided here: the surrounding cache kernel hands the
//! store a [`Freshness`] implementation, and stale entries remain on disk
//! (for revalidation and invalidation tracking) until [`HttpStore::clear`]
//! removes them.
//!
//! # Layout
//!
//! Every key is 42 ASCII characters, `md` (metadata) or `en` (entity)
//! followed by 40 hex digest characters, and fans out on disk as
//! `root/k[0..2]/k[2..4]/k[4..6]/k[6..]`. Lock files are `.lck` siblings of
//! their metadata file. All writes go through temp-file-plus-rename, so
//! concurrent readers never observe partial files.

mod entity;
mod error;
mod freshness;
mod fsio;
#[doc(hidden)]
pub mod fuzzing;
mod key;
mod layout;
mod lock;
mod meta;
mod options;
mod request;
mod store;
mod sweep;
mod vary;

pub use error::{Result, StoreError};
pub use freshness::{Freshness, HttpFreshness};
pub use key::{CacheKey, KeyKind};
pub use lock::LockOutcome;
pub use options::StoreOptions;
pub use request::{CacheRequest, CacheResponse};
pub use store::{
    CachedResponse, HttpStore, X_BODY_FILE, X_CONTENT_DIGEST, X_STATUS, shutdown_response_head,
};
pub use sweep::SweepStats;
