#![no_main]

use libfuzzer_sys::fuzz_target;

use varycache::CacheKey;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(key) = CacheKey::parse(text.as_ref()) {
        // A parsed key must round-trip verbatim.
        assert_eq!(key.as_str(), text.as_ref());
    }

    // Hashing arbitrary bodies always yields a parseable entity key.
    let derived = CacheKey::entity(data);
    assert!(CacheKey::parse(derived.as_str()).is_ok());
});
