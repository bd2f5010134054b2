#![no_main]

use buzzer_client::dispatch::{decode, dispatch, on_connected};
use buzzer_client::{ClientState, JoinIntent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw-byte path, including serde_json's UTF-8 validation.
    let _ = serde_json::from_slice::<buzzer_client::protocol::ServerMessage>(data);

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Every frame on its own line is fed through the same store, so board
    // updates and score changes land on whatever earlier lines built.
    let Ok(intent) = JoinIntent::new("ABCD", "Bob") else {
        return;
    };
    let mut state = on_connected(ClientState::InGame(intent.to_session())).state;
    for line in text.lines() {
        if let Some(message) = decode(line) {
            state = dispatch(state, message).state;
        }
    }
});
