#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use varycache::{CacheRequest, CacheResponse, HttpFreshness, HttpStore, StoreOptions};

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .compact()
        .try_init();
}

pub async fn open_store(dir: &TempDir) -> Result<HttpStore> {
    init_tracing();
    let store = HttpStore::open(
        StoreOptions::new(dir.path().to_path_buf()),
        Arc::new(HttpFreshness),
    )
    .await?;
    Ok(store)
}

pub fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(
            HeaderName::try_from(*name).expect("test header name"),
            HeaderValue::from_str(value).expect("test header value"),
        );
    }
    map
}

pub fn get(uri: &str, headers: &[(&str, &str)]) -> CacheRequest {
    let uri: Uri = uri.parse().expect("test uri");
    CacheRequest::new(Method::GET, uri, header_map(headers))
}

pub fn ok_response(headers: &[(&str, &str)], body: &[u8]) -> CacheResponse {
    CacheResponse::new(StatusCode::OK, header_map(headers), body.to_vec())
}
