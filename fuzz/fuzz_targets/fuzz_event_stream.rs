#![no_main]

use libfuzzer_sys::fuzz_target;
use matrix_sync_client::protocol::{Event, EventStreamResponse};

fuzz_target!(|data: &[u8]| {
    // Exercise the raw-byte deserialization path (includes serde_json's
    // own UTF-8 validation and error handling for invalid sequences).
    if let Ok(response) = serde_json::from_slice::<EventStreamResponse>(data) {
        for event in &response.chunk {
            let _ = event.kind();
            let _ = event.content_field("body");
        }
    }

    // Single events must survive a serialize/deserialize cycle unchanged.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(event) = serde_json::from_str::<Event>(s) {
            if let Ok(encoded) = serde_json::to_string(&event) {
                let _ = serde_json::from_str::<Event>(&encoded);
            }
        }
    }
});
