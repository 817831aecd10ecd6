#![no_main]

use libfuzzer_sys::fuzz_target;
use matrix_sync_client::protocol::InitialSyncResponse;
use matrix_sync_client::RoomState;

fuzz_target!(|data: &[u8]| {
    let Ok(response) = serde_json::from_slice::<InitialSyncResponse>(data) else {
        return;
    };

    // Every state event of every room must project without panicking,
    // whatever shape its content has.
    let mut state = RoomState::default();
    for room in response.rooms.unwrap_or_default() {
        for event in room.state.unwrap_or_default() {
            let _ = state.apply_event(&event);
        }
    }
});
