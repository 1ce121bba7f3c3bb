#![no_main]

use common::jwt::{decode_header, decode_payload_unverified, split_token};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data) {
        let _ = split_token(token);
        let _ = decode_header(token);
        let _ = decode_payload_unverified(token);
    }
});
