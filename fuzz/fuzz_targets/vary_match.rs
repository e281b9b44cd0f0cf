#![no_main]

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use libfuzzer_sys::fuzz_target;

use varycache::fuzzing::requests_match;

fn header_map(data: &[u8]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for chunk in data.chunks(8) {
        let split = chunk.len() / 2;
        let (name, value) = chunk.split_at(split);
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name),
            HeaderValue::from_bytes(value),
        ) {
            map.append(name, value);
        }
    }
    map
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split = (data[0] as usize) % data.len();
    let (vary_bytes, rest) = data.split_at(split);
    let vary = String::from_utf8_lossy(vary_bytes);

    let half = rest.len() / 2;
    let (a, b) = rest.split_at(half);
    let env_a = header_map(a);
    let env_b = header_map(b);

    // Reflexivity and symmetry have to hold for any Vary selection.
    assert!(requests_match(vary.as_ref(), &env_a, &env_a));
    assert_eq!(
        requests_match(vary.as_ref(), &env_a, &env_b),
        requests_match(vary.as_ref(), &env_b, &env_a)
    );
});
