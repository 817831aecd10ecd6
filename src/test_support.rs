//! Scripted transport shared by the unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{MatrixError, Result};
use crate::protocol::{
    CreateRoomRequest, CreateRoomResponse, Event, EventStreamResponse, InitialSyncResponse,
    JoinRoomResponse, LoginRequest, LoginResponse, RoomNameContent, RoomTopicContent,
    SendEventResponse,
};
use crate::transport::Transport;

/// A state event without room id.
pub(crate) fn state_event(event_type: &str, content: Value) -> Event {
    Event::new(event_type, content)
}

/// One recorded `send_event` call.
#[derive(Debug, Clone)]
pub(crate) struct SentEvent {
    pub room_id: String,
    pub event_type: String,
    pub content: Value,
    pub txn_id: String,
}

/// Transport that replays scripted responses and records what it was asked.
///
/// Every operation pops the next scripted result for its kind. With nothing
/// scripted, `event_stream` hangs forever (like an idle long-poll) and the
/// other operations fail with a 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    token: StdMutex<Option<String>>,
    logins: StdMutex<VecDeque<Result<LoginResponse>>>,
    joins: StdMutex<VecDeque<Result<JoinRoomResponse>>>,
    creates: StdMutex<VecDeque<Result<CreateRoomResponse>>>,
    membership: StdMutex<VecDeque<Result<()>>>,
    initial_syncs: StdMutex<VecDeque<Result<InitialSyncResponse>>>,
    streams: StdMutex<VecDeque<Result<EventStreamResponse>>>,
    names: StdMutex<VecDeque<Result<RoomNameContent>>>,
    topics: StdMutex<VecDeque<Result<RoomTopicContent>>>,
    states: StdMutex<VecDeque<Result<Vec<Event>>>>,
    sent: StdMutex<Vec<SentEvent>>,
    stream_froms: StdMutex<Vec<String>>,
    sync_limits: StdMutex<Vec<u32>>,
}

fn not_scripted<T>(what: &str) -> Result<T> {
    Err(MatrixError::request(
        404,
        Some("M_NOT_FOUND"),
        format!("nothing scripted for {what}"),
    ))
}

fn pop<T>(queue: &StdMutex<VecDeque<Result<T>>>, what: &str) -> Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| not_scripted(what))
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_login(&self, r: Result<LoginResponse>) {
        self.logins.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_join(&self, r: Result<JoinRoomResponse>) {
        self.joins.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_create(&self, r: Result<CreateRoomResponse>) {
        self.creates.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_membership(&self, r: Result<()>) {
        self.membership.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_initial_sync(&self, r: Result<InitialSyncResponse>) {
        self.initial_syncs.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_stream(&self, r: Result<EventStreamResponse>) {
        self.streams.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_name(&self, r: Result<RoomNameContent>) {
        self.names.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_topic(&self, r: Result<RoomTopicContent>) {
        self.topics.lock().unwrap().push_back(r);
    }

    pub(crate) fn push_state(&self, r: Result<Vec<Event>>) {
        self.states.lock().unwrap().push_back(r);
    }

    pub(crate) fn sent_events(&self) -> Vec<SentEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn stream_froms(&self) -> Vec<String> {
        self.stream_froms.lock().unwrap().clone()
    }

    pub(crate) fn sync_limits(&self) -> Vec<u32> {
        self.sync_limits.lock().unwrap().clone()
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn set_access_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn login(&self, _request: LoginRequest) -> Result<LoginResponse> {
        pop(&self.logins, "login")
    }

    async fn register(&self, _request: LoginRequest) -> Result<LoginResponse> {
        pop(&self.logins, "register")
    }

    async fn create_room(&self, _request: CreateRoomRequest) -> Result<CreateRoomResponse> {
        pop(&self.creates, "create_room")
    }

    async fn join_room(&self, _room_id_or_alias: &str) -> Result<JoinRoomResponse> {
        pop(&self.joins, "join_room")
    }

    async fn leave_room(&self, _room_id: &str) -> Result<()> {
        pop(&self.membership, "leave_room")
    }

    async fn invite_user(&self, _room_id: &str, _user_id: &str) -> Result<()> {
        pop(&self.membership, "invite_user")
    }

    async fn kick_user(&self, _room_id: &str, _user_id: &str, _reason: Option<&str>) -> Result<()> {
        pop(&self.membership, "kick_user")
    }

    async fn ban_user(&self, _room_id: &str, _user_id: &str, _reason: &str) -> Result<()> {
        pop(&self.membership, "ban_user")
    }

    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
        txn_id: &str,
    ) -> Result<SendEventResponse> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentEvent {
            room_id: room_id.to_string(),
            event_type: event_type.to_string(),
            content,
            txn_id: txn_id.to_string(),
        });
        Ok(SendEventResponse {
            event_id: Some(format!("$event{}", sent.len())),
        })
    }

    async fn initial_sync(&self, limit: u32) -> Result<InitialSyncResponse> {
        self.sync_limits.lock().unwrap().push(limit);
        pop(&self.initial_syncs, "initial_sync")
    }

    async fn event_stream(&self, from: &str, _timeout: Duration) -> Result<EventStreamResponse> {
        self.stream_froms.lock().unwrap().push(from.to_string());
        let next = self.streams.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn room_name(&self, _room_id: &str) -> Result<RoomNameContent> {
        pop(&self.names, "room_name")
    }

    async fn room_topic(&self, _room_id: &str) -> Result<RoomTopicContent> {
        pop(&self.topics, "room_topic")
    }

    async fn room_state(&self, _room_id: &str) -> Result<Vec<Event>> {
        pop(&self.states, "room_state")
    }
}
