#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the Matrix sync client.
//!
//! Verifies that request bodies match the homeserver's expected JSON, that
//! response types decode real-world payloads (including partial ones the sync
//! engine must survive), and that `ErrorCode` uses the `M_*` encoding.

use std::str::FromStr;

use matrix_sync_client::error_codes::ErrorCode;
use matrix_sync_client::protocol::{
    CreateRoomRequest, CreateRoomResponse, ErrorBody, Event, EventStreamResponse,
    InitialSyncResponse, JoinRoomResponse, LoginRequest, LoginResponse, RoomNameContent,
    RoomTopicContent, Visibility, LOGIN_PASSWORD, ROOM_MESSAGE,
};
use serde_json::{json, Value};

// ════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════

#[test]
fn login_request_uses_password_flow() {
    let request = LoginRequest::password("alice", "secret");
    assert_eq!(request.login_type, LOGIN_PASSWORD);
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({ "type": "m.login.password", "user": "alice", "password": "secret" })
    );
}

#[test]
fn create_room_request_omits_unset_alias() {
    let request = CreateRoomRequest::default();
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({ "visibility": "private" })
    );
}

#[test]
fn visibility_is_lowercase() {
    assert_eq!(serde_json::to_value(Visibility::Public).unwrap(), json!("public"));
    assert_eq!(Visibility::default(), Visibility::Private);
}

// ════════════════════════════════════════════════════════════════════
// Events
// ════════════════════════════════════════════════════════════════════

#[test]
fn event_preserves_unknown_fields() {
    let raw = json!({
        "type": "m.room.message",
        "room_id": "!abc:example.org",
        "event_id": "$1",
        "sender": "@bob:example.org",
        "origin_server_ts": 1_432_735_824_653_u64,
        "content": { "msgtype": "m.text", "body": "hi" }
    });

    let event: Event = serde_json::from_value(raw.clone()).unwrap();

    assert_eq!(event.kind(), Some(ROOM_MESSAGE));
    assert_eq!(event.room_id.as_deref(), Some("!abc:example.org"));
    assert_eq!(event.event_id(), Some("$1"));
    assert_eq!(event.sender(), Some("@bob:example.org"));
    assert_eq!(event.extra["origin_server_ts"], json!(1_432_735_824_653_u64));
    assert_eq!(serde_json::to_value(&event).unwrap(), raw);
}

#[test]
fn event_without_type_or_content_decodes() {
    let event: Event = serde_json::from_value(json!({ "event_id": "$2" })).unwrap();
    assert_eq!(event.kind(), None);
    assert!(event.room_id.is_none());
    assert_eq!(event.content, Value::Null);
    assert_eq!(event.content_field("body"), None);
}

#[test]
fn event_builder_sets_room() {
    let event = Event::new("m.room.topic", json!({ "topic": "t" })).in_room("!r");
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        json!({ "type": "m.room.topic", "room_id": "!r", "content": { "topic": "t" } })
    );
}

// ════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════

#[test]
fn login_response_decodes() {
    let response: LoginResponse = serde_json::from_value(json!({
        "user_id": "@alice:example.org",
        "access_token": "abc123",
        "home_server": "example.org",
        "refresh_token": "ignored"
    }))
    .unwrap();
    assert_eq!(response.user_id, "@alice:example.org");
    assert_eq!(response.access_token, "abc123");
    assert_eq!(response.home_server, "example.org");
}

#[test]
fn login_response_requires_token() {
    let result = serde_json::from_value::<LoginResponse>(json!({
        "user_id": "@alice:example.org",
        "home_server": "example.org"
    }));
    assert!(result.is_err());
}

#[test]
fn create_and_join_responses_decode() {
    let created: CreateRoomResponse =
        serde_json::from_value(json!({ "room_id": "!new", "room_alias": "#new:example.org" }))
            .unwrap();
    assert_eq!(created.room_alias.as_deref(), Some("#new:example.org"));

    let joined: JoinRoomResponse = serde_json::from_value(json!({})).unwrap();
    assert!(joined.room_id.is_none());
}

#[test]
fn initial_sync_response_decodes_full_payload() {
    let response: InitialSyncResponse = serde_json::from_value(json!({
        "end": "s3_1",
        "presence": [{ "type": "m.presence", "content": { "presence": "online" } }],
        "rooms": [{
            "room_id": "!abc:example.org",
            "membership": "join",
            "visibility": "private",
            "messages": {
                "start": "t1",
                "end": "t2",
                "chunk": [{ "type": "m.room.message", "content": { "body": "hi" } }]
            },
            "state": [{ "type": "m.room.name", "state_key": "", "content": { "name": "Lobby" } }]
        }]
    }))
    .unwrap();

    assert_eq!(response.end.as_deref(), Some("s3_1"));
    assert_eq!(response.presence.len(), 1);
    let rooms = response.rooms.unwrap();
    assert_eq!(rooms[0].room_id.as_deref(), Some("!abc:example.org"));
    assert_eq!(rooms[0].messages.as_ref().unwrap().chunk.as_ref().unwrap().len(), 1);
    assert_eq!(rooms[0].state.as_ref().unwrap()[0].content["name"], "Lobby");
}

#[test]
fn initial_sync_response_tolerates_missing_fields() {
    let response: InitialSyncResponse =
        serde_json::from_value(json!({ "rooms": [{ "membership": "invite" }] })).unwrap();

    assert!(response.end.is_none());
    let rooms = response.rooms.unwrap();
    assert!(rooms[0].room_id.is_none());
    assert!(rooms[0].messages.is_none());
    assert!(rooms[0].state.is_none());
}

#[test]
fn event_stream_response_defaults_empty_chunk() {
    let response: EventStreamResponse =
        serde_json::from_value(json!({ "start": "s1", "end": "s2" })).unwrap();
    assert_eq!(response.end, "s2");
    assert!(response.chunk.is_empty());
}

#[test]
fn event_stream_response_requires_end() {
    assert!(serde_json::from_value::<EventStreamResponse>(json!({ "chunk": [] })).is_err());
}

#[test]
fn state_content_accepts_null_and_absent() {
    let name: RoomNameContent = serde_json::from_value(json!({ "name": null })).unwrap();
    assert!(name.name.is_none());
    let topic: RoomTopicContent = serde_json::from_value(json!({})).unwrap();
    assert!(topic.topic.is_none());
}

#[test]
fn error_body_decodes() {
    let body: ErrorBody =
        serde_json::from_value(json!({ "errcode": "M_FORBIDDEN", "error": "no" })).unwrap();
    assert_eq!(body.errcode.as_deref(), Some("M_FORBIDDEN"));
    assert_eq!(body.error.as_deref(), Some("no"));
}

// ════════════════════════════════════════════════════════════════════
// Error codes
// ════════════════════════════════════════════════════════════════════

#[test]
fn error_codes_use_matrix_encoding() {
    for code in ErrorCode::ALL {
        let encoded = serde_json::to_value(code).unwrap();
        assert_eq!(encoded, json!(code.as_str()));
        assert!(code.as_str().starts_with("M_"));
        assert_eq!(ErrorCode::from_str(code.as_str()), Ok(*code));
        assert!(!code.description().is_empty());
    }
}

#[test]
fn unknown_error_code_string_is_rejected() {
    assert!(ErrorCode::from_str("X_VENDOR_THING").is_err());
    assert!(serde_json::from_value::<ErrorCode>(json!("X_VENDOR_THING")).is_err());
}
