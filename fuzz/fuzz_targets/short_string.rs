#![no_main]

use libfuzzer_sys::fuzz_target;
use sealdoc_core::short_string::{decode, encode};

fuzz_target!(|data: &[u8]| {
    // Property 1: decoding never panics
    if let Ok(text) = decode(data) {
        // Property 2: whatever decodes re-encodes to a form that decodes to the same text
        if let Ok(encoded) = encode(&text) {
            assert_eq!(decode(&encoded).as_ref(), Ok(&text));
        }
    }

    // Property 3: valid UTF-8 input roundtrips
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(encoded) = encode(text) {
            assert_eq!(decode(&encoded).as_deref(), Ok(text));
        }
    }
});
