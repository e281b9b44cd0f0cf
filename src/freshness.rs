//! Freshness verdicts over stored response headers.
//!
//! The store itself never interprets cache policy beyond asking a
//! [`Freshness`] implementation for a verdict; the surrounding cache kernel
//! supplies whichever policy it runs. [`HttpFreshness`] is the stock
//! implementation for origin responses with standard validators.

use std::time::{Duration, SystemTime};

use http::HeaderMap;
use http::header::{CACHE_CONTROL, DATE, EXPIRES, HeaderValue};

/// External freshness predicate over a stored response's headers.
pub trait Freshness: Send + Sync {
    /// Whether the stored response may still be served.
    fn is_fresh(&self, response: &HeaderMap) -> bool;

    /// Mutates the headers so subsequent [`Freshness::is_fresh`] calls
    /// return false.
    fn expire(&self, response: &mut HeaderMap);
}

/// Freshness from `Cache-Control` / `Expires` / `Date`.
///
/// Lifetime is `s-maxage`, else `max-age`, else `Expires − Date`; age is
/// now − `Date` (zero when `Date` is absent). A response with no lifetime
/// information is stale.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFreshness;

#[derive(Debug, Default)]
struct CacheControl {
    max_age: Option<Duration>,
    s_maxage: Option<Duration>,
}

fn parse_cache_control(headers: &HeaderMap) -> CacheControl {
    let mut cc = CacheControl::default();
    for value in headers.get_all(CACHE_CONTROL) {
        if let Ok(s) = value.to_str() {
            for part in s.split(',') {
                let part = part.trim();
                if let Some(stripped) = part.strip_prefix("max-age=") {
                    if let Ok(secs) = stripped.parse::<u64>() {
                        cc.max_age = Some(Duration::from_secs(secs));
                    }
                } else if let Some(stripped) = part.strip_prefix("s-maxage=")
                    && let Ok(secs) = stripped.parse::<u64>()
                {
                    cc.s_maxage = Some(Duration::from_secs(secs));
                }
            }
        }
    }
    cc
}

fn http_date(headers: &HeaderMap, name: http::header::HeaderName) -> Option<SystemTime> {
    let value = headers.get(name)?.to_str().ok()?;
    httpdate::parse_http_date(value).ok()
}

impl HttpFreshness {
    fn lifetime(headers: &HeaderMap) -> Option<Duration> {
        let cc = parse_cache_control(headers);
        if let Some(s_maxage) = cc.s_maxage {
            return Some(s_maxage);
        }
        if let Some(max_age) = cc.max_age {
            return Some(max_age);
        }
        if let Some(expires) = http_date(headers, EXPIRES) {
            let reference = http_date(headers, DATE).unwrap_or_else(SystemTime::now);
            return Some(expires.duration_since(reference).unwrap_or(Duration::ZERO));
        }
        None
    }

    fn age(headers: &HeaderMap) -> Duration {
        match http_date(headers, DATE) {
            Some(date) => SystemTime::now()
                .duration_since(date)
                .unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }
}

impl Freshness for HttpFreshness {
    fn is_fresh(&self, response: &HeaderMap) -> bool {
        match Self::lifetime(response) {
            Some(lifetime) => lifetime > Self::age(response),
            None => false,
        }
    }

    fn expire(&self, response: &mut HeaderMap) {
        // Rewrite Cache-Control with a zero max-age, keeping unrelated
        // directives; Expires goes away so nothing restores a lifetime.
        let mut directives: Vec<String> = Vec::new();
        for value in response.get_all(CACHE_CONTROL) {
            if let Ok(s) = value.to_str() {
                for part in s.split(',') {
                    let part = part.trim();
                    if part.is_empty()
                        || part.starts_with("max-age=")
                        || part.starts_with("s-maxage=")
                    {
                        continue;
                    }
                    directives.push(part.to_string());
                }
            }
        }
        directives.push("max-age=0".to_string());
        if let Ok(value) = HeaderValue::from_str(&directives.join(", ")) {
            response.insert(CACHE_CONTROL, value);
        }
        response.remove(EXPIRES);
    }
}
