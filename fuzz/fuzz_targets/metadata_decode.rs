#![no_main]

use libfuzzer_sys::fuzz_target;

use varycache::fuzzing::decode_metadata;

fuzz_target!(|data: &[u8]| {
    let _ = decode_metadata(data);
});
