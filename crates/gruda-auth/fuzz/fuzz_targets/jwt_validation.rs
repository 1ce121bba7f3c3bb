#![no_main]

use chrono::{TimeZone, Utc};
use gruda_auth::config::SigningPolicy;
use gruda_auth::services::token_service::validate_token_at;
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data) {
        let policy = SigningPolicy::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            "gruda",
            "gruda-clients",
            Duration::from_secs(20 * 60),
        );
        let Some(now) = Utc.timestamp_opt(1_700_000_000, 0).single() else {
            return;
        };

        // Every input must produce an identity or a rejection, never a panic.
        let _ = validate_token_at(token, &policy, now);
    }
});
