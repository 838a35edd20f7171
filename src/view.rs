//! Output surface the synchronizer renders into.
//!
//! The client never prints directly. It hands finished [`Frame`]s and
//! [`Notification`]s to a [`ChatView`]; the terminal implementation lives in
//! [`crate::render::terminal`], tests use a recording view.

use std::fmt;

use crate::api::{Mention, ModLogEntry, PresenceSet, RoomSummary, UnreadCounts};
use crate::render::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A toast-style message. Non-persistent notices are transient; persistent
/// ones stay until replaced (connection-lost banner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub text: String,
    pub persistent: bool,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
            persistent: false,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
            persistent: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
            persistent: false,
        }
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One row of the DM sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmEntry {
    pub user: String,
    pub online: bool,
    /// The thread currently open.
    pub active: bool,
}

pub trait ChatView: Send + Sync + 'static {
    /// Replace the main pane with `frame`.
    fn render_frame(&self, frame: &Frame);

    fn notify(&self, notice: Notification);

    /// `show_moderation` is the creator hint; the server still decides.
    fn render_presence(
        &self,
        _room: &str,
        _users: &PresenceSet,
        _current_user: &str,
        _show_moderation: bool,
    ) {
    }

    fn render_unread(&self, _counts: &UnreadCounts) {}

    fn render_rooms(&self, _rooms: &[RoomSummary]) {}

    fn render_dm_list(&self, _entries: &[DmEntry]) {}

    fn render_mentions(&self, _mentions: &[Mention]) {}

    fn render_mod_logs(&self, _room: &str, _logs: &[ModLogEntry]) {}

    /// Blank the main pane (room switch, logout).
    fn clear(&self) {}
}
