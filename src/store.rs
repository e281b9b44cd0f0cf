//! The cache facade.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::header::{
    AGE, CONTENT_LENGTH, CONTENT_LOCATION, HeaderName, HeaderValue, LOCATION, RETRY_AFTER,
    TRANSFER_ENCODING,
};
use http::{HeaderMap, StatusCode, Uri};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{trace, warn};

use crate::entity::EntityStore;
use crate::error::{Result, StoreError};
use crate::freshness::Freshness;
use crate::fsio;
use crate::key::CacheKey;
use crate::layout;
use crate::lock::{LockOutcome, LockRegistry};
use crate::meta::{MetaStore, Variant};
use crate::options::StoreOptions;
use crate::request::{CacheRequest, CacheResponse};
use crate::vary;

/// Entity key of the stored body, carried in the stored response headers.
pub const X_CONTENT_DIGEST: HeaderName = HeaderName::from_static("x-content-digest");
/// HTTP status of the stored response, injected at persist time and
/// stripped again at lookup.
pub const X_STATUS: HeaderName = HeaderName::from_static("x-status");
/// Filesystem path of the body blob, added to every lookup hit.
pub const X_BODY_FILE: HeaderName = HeaderName::from_static("x-body-file");

/// A lookup hit: the stored response headers (plus `x-body-file`), the
/// status, and the body. The body is loaded as one blob; `body_path` (also
/// carried in the `x-body-file` header) is the escape hatch for callers
/// that would rather stream the file themselves.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub body_path: PathBuf,
}

/// Persistent, content-addressed HTTP cache store.
///
/// Cheap to clone; all clones share one state. Writes coordinate through
/// atomic renames, so concurrent readers observe either the previous or the
/// new variant list, never a partial one.
#[derive(Clone)]
pub struct HttpStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    pub(crate) root: PathBuf,
    pub(crate) meta: MetaStore,
    pub(crate) entities: EntityStore,
    pub(crate) locks: LockRegistry,
    pub(crate) freshness: Arc<dyn Freshness>,
    key_cache: Mutex<LruCache<String, CacheKey>>,
}

impl HttpStore {
    /// Opens (and creates, if needed) a store rooted at `options.root`.
    /// Leftover temp files from interrupted writes are pruned.
    pub async fn open(options: StoreOptions, freshness: Arc<dyn Freshness>) -> Result<Self> {
        options.validate()?;
        fs::create_dir_all(&options.root)
            .await
            .map_err(|err| StoreError::io(err, &options.root, "create cache root"))?;
        fsio::prune_temp_files(&options.root).await;

        let capacity = NonZeroUsize::new(options.key_cache_capacity)
            .ok_or_else(|| StoreError::configuration("key_cache_capacity must be at least 1"))?;
        let root = options.root.clone();
        Ok(Self {
            inner: Arc::new(StoreInner {
                meta: MetaStore::new(root.clone(), options.verify_writes),
                entities: EntityStore::new(root.clone(), options.verify_writes),
                locks: LockRegistry::new(root.clone()),
                freshness,
                key_cache: Mutex::new(LruCache::new(capacity)),
                root,
            }),
        })
    }

    /// Metadata key for a request, memoized per canonical URI.
    pub fn cache_key(&self, request: &CacheRequest) -> CacheKey {
        let uri = request.canonical_uri();
        let mut cache = self.inner.key_cache.lock();
        if let Some(key) = cache.get(&uri) {
            return key.clone();
        }
        let key = CacheKey::metadata(&uri);
        cache.put(uri, key.clone());
        key
    }

    /// Returns the stored response variant matching the request, or `None`.
    ///
    /// A hit whose body file has vanished is repaired on the spot: the
    /// dangling variant is dropped from the list and the lookup misses.
    pub async fn lookup(&self, request: &CacheRequest) -> Option<CachedResponse> {
        let key = self.cache_key(request);
        let variants = self.inner.meta.read(&key).await;
        if variants.is_empty() {
            return None;
        }

        let position = variants.iter().position(|variant| {
            let vary = vary::response_vary(&variant.response);
            vary::requests_match(&vary, request.headers(), &variant.request)
        })?;

        let variant = &variants[position];
        let digest = variant
            .response
            .get(&X_CONTENT_DIGEST)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| CacheKey::parse(value).ok());
        let Some(digest) = digest else {
            warn!(key = %key, "stored variant has no usable content digest");
            self.drop_variant(&key, variants, position).await;
            return None;
        };

        let body_path = self.inner.entities.path(&digest);
        let Some(body) = self.inner.entities.load(&digest).await else {
            warn!(path = %body_path.display(), "cache body missing on disk");
            self.drop_variant(&key, variants, position).await;
            return None;
        };

        let mut headers = variant.response.clone();
        let status = headers
            .remove(&X_STATUS)
            .and_then(|value| value.to_str().ok().map(str::to_string))
            .and_then(|value| value.parse::<u16>().ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);
        if let Ok(value) = HeaderValue::from_str(&body_path.display().to_string()) {
            headers.insert(X_BODY_FILE, value);
        }

        trace!(key = %key, "cache hit");
        Some(CachedResponse {
            status,
            headers,
            body,
            body_path,
        })
    }

    async fn drop_variant(&self, key: &CacheKey, mut variants: Vec<Variant>, position: usize) {
        variants.remove(position);
        if variants.is_empty() {
            self.inner.meta.remove(key).await;
        } else if let Err(err) = self.inner.meta.write(key, &variants).await {
            warn!(error = %err, key = %key, "failed to drop dangling variant");
        }
    }

    /// Persists a request/response pair and returns the metadata key.
    ///
    /// The body is stored under its content digest and the digest (plus a
    /// `content-length`, when no `transfer-encoding` is present) is injected
    /// into the response headers. The new variant goes to the head of the
    /// list, replacing any prior variant with the same identity under the
    /// new `Vary` value.
    pub async fn write(
        &self,
        request: &CacheRequest,
        response: &mut CacheResponse,
    ) -> Result<CacheKey> {
        let key = self.cache_key(request);

        if !response.headers.contains_key(&X_CONTENT_DIGEST) {
            let digest = CacheKey::entity(&response.body);
            self.inner.entities.save(&digest, &response.body).await?;
            let value = HeaderValue::from_str(digest.as_str())
                .expect("hex digest is a valid header value");
            response.headers.insert(X_CONTENT_DIGEST, value);
            if !response.headers.contains_key(TRANSFER_ENCODING) {
                response
                    .headers
                    .insert(CONTENT_LENGTH, HeaderValue::from(response.body.len() as u64));
            }
        }

        let vary_new = vary::response_vary(&response.headers);
        let mut variants = self.inner.meta.read(&key).await;
        variants.retain(|variant| {
            let vary_old = vary::response_vary(&variant.response);
            !(vary_old == vary_new
                && vary::requests_match(&vary_new, &variant.request, request.headers()))
        });
        variants.insert(
            0,
            Variant {
                request: request.headers().clone(),
                response: persist_response(response),
            },
        );
        self.inner.meta.write(&key, &variants).await?;

        trace!(key = %key, variants = variants.len(), "stored cache entry");
        Ok(key)
    }

    /// Marks every fresh variant for the request's URL as expired, then
    /// follows the request's `Location` and `Content-Location` headers and
    /// invalidates those URLs too. A visited set bounds the recursion, so
    /// header cycles terminate.
    pub async fn invalidate(&self, request: &CacheRequest) -> Result<()> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut pending = vec![request.clone()];

        while let Some(current) = pending.pop() {
            if !visited.insert(current.canonical_uri()) {
                continue;
            }

            let key = self.cache_key(&current);
            let mut variants = self.inner.meta.read(&key).await;
            let mut changed = false;
            for variant in &mut variants {
                if self.inner.freshness.is_fresh(&variant.response) {
                    self.inner.freshness.expire(&mut variant.response);
                    changed = true;
                }
            }
            if changed {
                self.inner.meta.write(&key, &variants).await?;
                trace!(key = %key, "invalidated cache entry");
            }

            for name in [LOCATION, CONTENT_LOCATION] {
                for value in current.headers().get_all(&name) {
                    if let Ok(raw) = value.to_str()
                        && let Ok(uri) = raw.parse::<Uri>()
                    {
                        pending.push(CacheRequest::get(uri));
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes the metadata entry for a URL. Entity blobs and locks are
    /// untouched; orphaned bodies fall to the next [`HttpStore::clear`].
    pub async fn purge(&self, url: &Uri) -> bool {
        let request = CacheRequest::get(url.clone());
        let key = self.cache_key(&request);
        self.inner.meta.remove(&key).await
    }

    /// Attempts to take the fill lock for the request's key.
    pub async fn lock(&self, request: &CacheRequest) -> LockOutcome {
        let key = self.cache_key(request);
        self.inner.locks.lock(&key).await
    }

    /// Releases the fill lock; reports whether a lock file was removed.
    pub async fn unlock(&self, request: &CacheRequest) -> bool {
        let key = self.cache_key(request);
        self.inner.locks.unlock(&key).await
    }

    pub async fn is_locked(&self, request: &CacheRequest) -> bool {
        let key = self.cache_key(request);
        self.inner.locks.is_locked(&key).await
    }

    /// Releases every lock this process owns. Called on shutdown; does not
    /// run the sweeper.
    pub async fn cleanup(&self) {
        self.inner.locks.cleanup().await;
    }

    /// Filesystem path a key maps to.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        layout::key_path(&self.inner.root, key)
    }

    /// Inverse of [`HttpStore::path_for`].
    pub fn key_for_path(&self, path: &Path) -> Result<CacheKey> {
        layout::path_key(&self.inner.root, path)
    }

    pub(crate) fn state(&self) -> &StoreInner {
        &self.inner
    }
}

/// Stored-response headers for a live response: `x-status` injected, `age`
/// dropped.
fn persist_response(response: &CacheResponse) -> HeaderMap {
    let mut headers = response.headers.clone();
    headers.remove(AGE);
    headers.insert(X_STATUS, HeaderValue::from(response.status.as_u16()));
    headers
}

/// Head of the `503 Service Unavailable` a frontend should emit when the
/// store is torn down by a fatal error before the response has started.
pub fn shutdown_response_head() -> (StatusCode, HeaderMap) {
    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, HeaderValue::from_static("10"));
    (StatusCode::SERVICE_UNAVAILABLE, headers)
}
