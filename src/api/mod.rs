//! # Chat backend API
//!
//! The synchronizer talks to the backend only through the [`ChatApi`] trait.
//! [`HttpChatApi`] is the production implementation (reqwest + JSON); tests
//! substitute an in-memory fake.
//!
//! Every method takes the session token explicitly (`auth`), since the
//! session owns it and may change between calls.

pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::RoomCode;

pub use http::HttpChatApi;
pub use types::{
    FileAttachment, FileUpload, LoginResponse, Mention, Message, MessageId, ModAction,
    ModLogEntry, PresenceSet, Registration, Reply, RoomSummary, UnreadCounts,
};

/// Transport seam between the synchronizer and the chat backend.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    // --- account -----------------------------------------------------------

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;

    async fn register(&self, registration: &Registration) -> Result<()>;

    async fn heartbeat(&self, auth: Option<&str>) -> Result<()>;

    // --- rooms -------------------------------------------------------------

    async fn join_room(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        user: &str,
        password: Option<&str>,
    ) -> Result<()>;

    async fn leave_room(&self, auth: Option<&str>, room: &RoomCode, user: &str) -> Result<()>;

    async fn list_rooms(&self, auth: Option<&str>) -> Result<Vec<RoomSummary>>;

    async fn create_room(&self, auth: Option<&str>, name: &str, password: Option<&str>)
        -> Result<()>;

    async fn clear_room(&self, auth: Option<&str>, room: &RoomCode) -> Result<()>;

    // --- messages ----------------------------------------------------------

    async fn fetch_messages(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<Message>>;

    async fn send_message(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        sender: &str,
        text: &str,
        file: Option<&FileAttachment>,
    ) -> Result<()>;

    async fn pinned_messages(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<Message>>;

    async fn replies(&self, auth: Option<&str>, room: &RoomCode, id: &MessageId)
        -> Result<Vec<Reply>>;

    async fn reply(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        id: &MessageId,
        text: &str,
    ) -> Result<()>;

    async fn mark_room_read(&self, auth: Option<&str>, room: &RoomCode) -> Result<()>;

    async fn mark_message_read(&self, auth: Option<&str>, id: &MessageId) -> Result<()>;

    async fn unread_counts(&self, auth: Option<&str>) -> Result<UnreadCounts>;

    async fn mentions(&self, auth: Option<&str>) -> Result<Vec<Mention>>;

    async fn upload_file(&self, auth: Option<&str>, upload: FileUpload) -> Result<FileAttachment>;

    // --- presence ----------------------------------------------------------

    async fn room_users(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<String>>;

    async fn online_users(&self, auth: Option<&str>) -> Result<Vec<String>>;

    async fn set_typing(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        user: &str,
        typing: bool,
    ) -> Result<()>;

    // --- direct messages ---------------------------------------------------

    async fn direct_messages(&self, auth: Option<&str>, peer: &str) -> Result<Vec<Message>>;

    async fn send_direct(&self, auth: Option<&str>, peer: &str, text: &str) -> Result<()>;

    // --- moderation --------------------------------------------------------

    async fn moderate(
        &self,
        auth: Option<&str>,
        action: ModAction,
        room: &RoomCode,
        user: &str,
    ) -> Result<()>;

    async fn mod_logs(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<ModLogEntry>>;
}
