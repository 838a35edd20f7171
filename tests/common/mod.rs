//! Shared fakes for the client integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatflow_client::api::{
    ChatApi, FileAttachment, FileUpload, LoginResponse, Mention, Message, MessageId, ModAction,
    ModLogEntry, PresenceSet, Registration, Reply, RoomSummary, UnreadCounts,
};
use chatflow_client::config::ClientConfig;
use chatflow_client::render::Frame;
use chatflow_client::session::RoomCode;
use chatflow_client::view::{ChatView, DmEntry, Notification};
use chatflow_client::{ChatClient, ChatError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login(String),
    Register(String),
    Heartbeat,
    Join { room: String, user: String, password: Option<String> },
    Leave(String),
    ListRooms,
    CreateRoom(String),
    Clear(String),
    Fetch(String),
    Send { room: String, text: String, file: Option<String> },
    Pins(String),
    Replies(MessageId),
    Reply { id: MessageId, text: String },
    MarkRoomRead(String),
    MarkMessageRead(MessageId),
    Unread,
    Mentions,
    Upload { filename: String, size: usize },
    RoomUsers(String),
    OnlineUsers,
    Typing(bool),
    DirectMessages(String),
    SendDirect { peer: String, text: String },
    Moderate(ModAction, String),
    ModLogs(String),
}

fn http_error(status: u16, message: &str) -> ChatError {
    ChatError::Http {
        status,
        url: "fake".into(),
        message: Some(message.to_string()),
    }
}

pub fn message(id: u64, sender: &str, text: &str) -> Message {
    Message {
        id: Some(MessageId::Number(id)),
        sender: sender.to_string(),
        text: text.to_string(),
        time: "12:00".to_string(),
        file: None,
        reactions: Default::default(),
        read_by: Default::default(),
    }
}

/// In-memory backend that records every call.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    pub messages: Mutex<HashMap<String, Vec<Message>>>,
    pub room_users: Mutex<Vec<String>>,
    pub online: Mutex<Vec<String>>,
    pub rooms: Mutex<Vec<RoomSummary>>,
    pub dms: Mutex<HashMap<String, Vec<Message>>>,
    pub replies: Mutex<HashMap<MessageId, Vec<Reply>>>,
    /// Server error text returned by `join_room`.
    pub join_error: Mutex<Option<String>>,
    pub fail_fetch: AtomicBool,
    /// Per-room delay applied to `fetch_messages`.
    pub slow_rooms: Mutex<HashMap<String, Duration>>,
    /// Delay applied to `pinned_messages`, i.e. inside a render.
    pub slow_pins: Mutex<Option<Duration>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn fetches(&self, room: &str) -> usize {
        self.count(|c| matches!(c, Call::Fetch(r) if r == room))
    }

    pub fn sends(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Send { .. }))
            .collect()
    }

    pub fn typing(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Typing(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn set_messages(&self, room: &str, messages: Vec<Message>) {
        self.messages
            .lock()
            .unwrap()
            .insert(room.to_string(), messages);
    }

    pub fn push_message(&self, room: &str, message: Message) {
        self.messages
            .lock()
            .unwrap()
            .entry(room.to_string())
            .or_default()
            .push(message);
    }

    pub fn set_slow(&self, room: &str, delay: Duration) {
        self.slow_rooms
            .lock()
            .unwrap()
            .insert(room.to_string(), delay);
    }

    fn next_id(&self) -> u64 {
        1000 + self.next_id.fetch_add(1, Ordering::SeqCst) as u64
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        self.record(Call::Login(username.to_string()));
        if password == "wrong" {
            return Err(http_error(401, "Invalid credentials"));
        }
        Ok(LoginResponse {
            token: format!("tok-{username}"),
            username: username.to_string(),
            avatar: None,
        })
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        self.record(Call::Register(registration.username.clone()));
        Ok(())
    }

    async fn heartbeat(&self, _auth: Option<&str>) -> Result<()> {
        self.record(Call::Heartbeat);
        Ok(())
    }

    async fn join_room(
        &self,
        _auth: Option<&str>,
        room: &RoomCode,
        user: &str,
        password: Option<&str>,
    ) -> Result<()> {
        self.record(Call::Join {
            room: room.to_string(),
            user: user.to_string(),
            password: password.map(str::to_string),
        });
        match self.join_error.lock().unwrap().clone() {
            Some(msg) => Err(http_error(403, &msg)),
            None => Ok(()),
        }
    }

    async fn leave_room(&self, _auth: Option<&str>, room: &RoomCode, _user: &str) -> Result<()> {
        self.record(Call::Leave(room.to_string()));
        Ok(())
    }

    async fn list_rooms(&self, _auth: Option<&str>) -> Result<Vec<RoomSummary>> {
        self.record(Call::ListRooms);
        Ok(self.rooms.lock().unwrap().clone())
    }

    async fn create_room(
        &self,
        _auth: Option<&str>,
        name: &str,
        _password: Option<&str>,
    ) -> Result<()> {
        self.record(Call::CreateRoom(name.to_string()));
        Ok(())
    }

    async fn clear_room(&self, _auth: Option<&str>, room: &RoomCode) -> Result<()> {
        self.record(Call::Clear(room.to_string()));
        self.set_messages(room.as_str(), Vec::new());
        Ok(())
    }

    async fn fetch_messages(&self, _auth: Option<&str>, room: &RoomCode) -> Result<Vec<Message>> {
        self.record(Call::Fetch(room.to_string()));
        let delay = self.slow_rooms.lock().unwrap().get(room.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ChatError::Connect {
                url: "fake".into(),
                detail: "connection refused".into(),
            });
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(room.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        _auth: Option<&str>,
        room: &RoomCode,
        sender: &str,
        text: &str,
        file: Option<&FileAttachment>,
    ) -> Result<()> {
        self.record(Call::Send {
            room: room.to_string(),
            text: text.to_string(),
            file: file.map(|f| f.filename.clone()),
        });
        let mut msg = message(self.next_id(), sender, text);
        msg.file = file.cloned();
        self.push_message(room.as_str(), msg);
        Ok(())
    }

    async fn pinned_messages(&self, _auth: Option<&str>, room: &RoomCode) -> Result<Vec<Message>> {
        self.record(Call::Pins(room.to_string()));
        let delay = *self.slow_pins.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Vec::new())
    }

    async fn replies(
        &self,
        _auth: Option<&str>,
        _room: &RoomCode,
        id: &MessageId,
    ) -> Result<Vec<Reply>> {
        self.record(Call::Replies(id.clone()));
        Ok(self
            .replies
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn reply(
        &self,
        _auth: Option<&str>,
        _room: &RoomCode,
        id: &MessageId,
        text: &str,
    ) -> Result<()> {
        self.record(Call::Reply {
            id: id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn mark_room_read(&self, _auth: Option<&str>, room: &RoomCode) -> Result<()> {
        self.record(Call::MarkRoomRead(room.to_string()));
        Ok(())
    }

    async fn mark_message_read(&self, _auth: Option<&str>, id: &MessageId) -> Result<()> {
        self.record(Call::MarkMessageRead(id.clone()));
        Ok(())
    }

    async fn unread_counts(&self, _auth: Option<&str>) -> Result<UnreadCounts> {
        self.record(Call::Unread);
        Ok(UnreadCounts::new())
    }

    async fn mentions(&self, _auth: Option<&str>) -> Result<Vec<Mention>> {
        self.record(Call::Mentions);
        Ok(Vec::new())
    }

    async fn upload_file(&self, _auth: Option<&str>, upload: FileUpload) -> Result<FileAttachment> {
        self.record(Call::Upload {
            filename: upload.filename.clone(),
            size: upload.bytes.len(),
        });
        Ok(FileAttachment {
            url: format!("/uploads/{}", upload.filename),
            size: upload.bytes.len() as u64,
            filename: upload.filename,
        })
    }

    async fn room_users(&self, _auth: Option<&str>, room: &RoomCode) -> Result<Vec<String>> {
        self.record(Call::RoomUsers(room.to_string()));
        Ok(self.room_users.lock().unwrap().clone())
    }

    async fn online_users(&self, _auth: Option<&str>) -> Result<Vec<String>> {
        self.record(Call::OnlineUsers);
        Ok(self.online.lock().unwrap().clone())
    }

    async fn set_typing(
        &self,
        _auth: Option<&str>,
        _room: &RoomCode,
        _user: &str,
        typing: bool,
    ) -> Result<()> {
        self.record(Call::Typing(typing));
        Ok(())
    }

    async fn direct_messages(&self, _auth: Option<&str>, peer: &str) -> Result<Vec<Message>> {
        self.record(Call::DirectMessages(peer.to_string()));
        Ok(self
            .dms
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_direct(&self, _auth: Option<&str>, peer: &str, text: &str) -> Result<()> {
        self.record(Call::SendDirect {
            peer: peer.to_string(),
            text: text.to_string(),
        });
        let msg = message(self.next_id(), "me", text);
        self.dms
            .lock()
            .unwrap()
            .entry(peer.to_string())
            .or_default()
            .push(msg);
        Ok(())
    }

    async fn moderate(
        &self,
        _auth: Option<&str>,
        action: ModAction,
        _room: &RoomCode,
        user: &str,
    ) -> Result<()> {
        self.record(Call::Moderate(action, user.to_string()));
        Ok(())
    }

    async fn mod_logs(&self, _auth: Option<&str>, room: &RoomCode) -> Result<Vec<ModLogEntry>> {
        self.record(Call::ModLogs(room.to_string()));
        Ok(vec![ModLogEntry {
            action: "kick".into(),
            admin: "alice".into(),
            target: "bob".into(),
            timestamp: "12:00".into(),
            details: None,
        }])
    }
}

/// View that keeps everything it is asked to show.
#[derive(Default)]
pub struct RecordingView {
    pub frames: Mutex<Vec<Frame>>,
    pub notices: Mutex<Vec<Notification>>,
    pub presence: Mutex<Vec<(String, PresenceSet, bool)>>,
    pub dm_lists: Mutex<Vec<Vec<DmEntry>>>,
    pub mod_logs: Mutex<Vec<Vec<ModLogEntry>>>,
    pub rooms: Mutex<Vec<Vec<RoomSummary>>>,
    pub clears: AtomicUsize,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn clear_frames(&self) {
        self.frames.lock().unwrap().clear();
    }

    pub fn notices(&self) -> Vec<Notification> {
        self.notices.lock().unwrap().clone()
    }

    pub fn notice_texts(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.text).collect()
    }

    pub fn last_notice(&self) -> Option<Notification> {
        self.notices().pop()
    }
}

impl ChatView for RecordingView {
    fn render_frame(&self, frame: &Frame) {
        self.frames.lock().unwrap().push(frame.clone());
    }

    fn notify(&self, notice: Notification) {
        self.notices.lock().unwrap().push(notice);
    }

    fn render_presence(
        &self,
        room: &str,
        users: &PresenceSet,
        _current_user: &str,
        show_moderation: bool,
    ) {
        self.presence
            .lock()
            .unwrap()
            .push((room.to_string(), users.clone(), show_moderation));
    }

    fn render_rooms(&self, rooms: &[RoomSummary]) {
        self.rooms.lock().unwrap().push(rooms.to_vec());
    }

    fn render_dm_list(&self, entries: &[DmEntry]) {
        self.dm_lists.lock().unwrap().push(entries.to_vec());
    }

    fn render_mod_logs(&self, _room: &str, logs: &[ModLogEntry]) {
        self.mod_logs.lock().unwrap().push(logs.to_vec());
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn build_client(config: ClientConfig, api: &Arc<FakeApi>, view: &Arc<RecordingView>) -> ChatClient {
    ChatClient::builder(config)
        .api(Arc::clone(api) as Arc<dyn ChatApi>)
        .view(Arc::clone(view) as Arc<dyn ChatView>)
        .build()
        .unwrap()
}

/// A token-flavor client logged in as `alice`.
pub async fn logged_in() -> (ChatClient, Arc<FakeApi>, Arc<RecordingView>) {
    let api = FakeApi::new();
    let view = RecordingView::new();
    let client = build_client(ClientConfig::default(), &api, &view);
    assert!(client.login("alice", "pw").await);
    (client, api, view)
}

/// Logged in as `alice` and joined `room`.
pub async fn in_room(room: &str) -> (ChatClient, Arc<FakeApi>, Arc<RecordingView>) {
    let (client, api, view) = logged_in().await;
    assert!(client.join_room(room).await, "join {room} failed");
    (client, api, view)
}
