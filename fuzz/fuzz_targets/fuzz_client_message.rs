#![no_main]

use buzzer_client::protocol::ClientMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = serde_json::from_slice::<ClientMessage>(data) {
        // Anything that parses must serialize back without error.
        let json = serde_json::to_string(&msg).unwrap_or_default();
        let _ = serde_json::from_str::<ClientMessage>(&json);
    }
});
