//! Entry points for the fuzz targets. Not part of the supported API.

use std::path::Path;

use http::HeaderMap;

use crate::meta;
use crate::vary;

/// Runs the metadata decoder the way the store does on read; returns how
/// many variants survived.
pub fn decode_metadata(data: &[u8]) -> usize {
    meta::decode(data, Path::new("fuzz-input")).len()
}

/// Exercises Vary matching over arbitrary header selections.
pub fn requests_match(vary: &str, env_a: &HeaderMap, env_b: &HeaderMap) -> bool {
    vary::requests_match(vary, env_a, env_b)
}
