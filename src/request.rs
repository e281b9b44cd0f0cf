use http::{HeaderMap, Method, StatusCode, Uri};

/// The request view the store consumes: method, canonical URI, and the full
/// header map with ordered value lists.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl CacheRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// Synthetic GET with no headers, as used by purge and by recursive
    /// invalidation through `Location` / `Content-Location`.
    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri, HeaderMap::new())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The string the cache key is derived from. Two requests with equal
    /// canonical URIs (including query ordering) share a metadata entry.
    pub(crate) fn canonical_uri(&self) -> String {
        self.uri.to_string()
    }
}

/// A complete origin response handed to [`crate::HttpStore::write`]. The
/// store mutates the headers in place: content digest and length are
/// injected during the write.
#[derive(Debug, Clone)]
pub struct CacheResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl CacheResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}
