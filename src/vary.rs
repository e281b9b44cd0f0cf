//! Vary header matching.

use http::HeaderMap;
use http::header::HeaderName;

/// Selected-header match per the response's `Vary` value.
///
/// An empty `vary` matches any pair of requests. Otherwise every named
/// header must carry an identical ordered value list in both header sets
/// (both absent also matches). Names are lowercased and `_` is folded to `-`
/// for environments that surface underscore header names.
pub(crate) fn requests_match(vary: &str, env_a: &HeaderMap, env_b: &HeaderMap) -> bool {
    for raw in vary.split(|c: char| c == ',' || c.is_whitespace()) {
        if raw.is_empty() {
            continue;
        }
        let canonical = raw.to_ascii_lowercase().replace('_', "-");
        match HeaderName::from_bytes(canonical.as_bytes()) {
            Ok(name) => {
                if !value_lists_equal(&name, env_a, env_b) {
                    return false;
                }
            }
            // A name no header map can hold is absent from both sides.
            Err(_) => continue,
        }
    }
    true
}

fn value_lists_equal(name: &HeaderName, env_a: &HeaderMap, env_b: &HeaderMap) -> bool {
    let mut a = env_a.get_all(name).iter();
    let mut b = env_b.get_all(name).iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(left), Some(right)) if left == right => {}
            _ => return false,
        }
    }
}

/// The response's `Vary` value; absent is treated as empty.
pub(crate) fn response_vary(headers: &HeaderMap) -> String {
    headers
        .get(http::header::VARY)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
