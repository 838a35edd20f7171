//! Wire types for the chat backend's JSON API.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Usernames currently online (room presence or global).
pub type PresenceSet = BTreeSet<String>;

/// Room name → unread message count.
pub type UnreadCounts = BTreeMap<String, u64>;

/// Server-assigned message id; numeric or string depending on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(n) => write!(f, "{n}"),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        MessageId::Number(n)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        s.parse::<u64>()
            .map(MessageId::Number)
            .unwrap_or_else(|_| MessageId::Text(s.to_string()))
    }
}

/// Attachment metadata returned by `/upload_file` and embedded in messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

impl FileAttachment {
    /// Image attachments get a preview instead of a download link.
    pub fn is_image(&self) -> bool {
        let ext = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif")
    }
}

/// A chat message snapshot. Rich fields are optional so the simpler backend
/// (sender, text, time only) parses too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
    /// emoji → users who reacted with it
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub read_by: BTreeSet<String>,
}

impl Message {
    pub fn is_from(&self, user: &str) -> bool {
        self.sender == user
    }

    pub fn reaction_count(&self, emoji: &str) -> usize {
        self.reactions.get(emoji).map_or(0, BTreeSet::len)
    }

    pub fn reacted_by(&self, emoji: &str, user: &str) -> bool {
        self.reactions.get(emoji).is_some_and(|users| users.contains(user))
    }

    /// Another user's message the current user has not yet been recorded as reading.
    pub fn needs_read_mark(&self, user: &str) -> bool {
        !self.is_from(user) && !self.read_by.contains(user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub name: String,
    #[serde(default)]
    pub has_password: bool,
    #[serde(default)]
    pub creator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub room: String,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModLogEntry {
    pub action: String,
    pub admin: String,
    pub target: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Registration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub avatar: String,
}

/// A file read from disk, ready for multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Room moderation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModAction {
    Kick,
    Ban,
}

impl ModAction {
    /// Endpoint name, without leading slash.
    pub fn endpoint(self) -> &'static str {
        match self {
            ModAction::Kick => "kick_user",
            ModAction::Ban => "ban_user",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            ModAction::Kick => "Kicked",
            ModAction::Ban => "Banned",
        }
    }
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModAction::Kick => write!(f, "kick"),
            ModAction::Ban => write!(f, "ban"),
        }
    }
}
