//! Session identity, room codes, and the coarse view state machine.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{ChatError, Result};

/// Longest room identifier the server accepts.
pub const MAX_ROOM_CODE_LEN: usize = 32;

/// A validated room identifier.
///
/// Numeric codes (`"1234"`) and named rooms (`"general"`) share one format:
/// ASCII letters, digits, `-` and `_`, at most [`MAX_ROOM_CODE_LEN`] chars.
/// The code is interpolated into URL paths, so nothing else is let through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim();
        let invalid = |reason| ChatError::InvalidRoomCode {
            code: code.to_string(),
            reason,
        };
        if code.is_empty() {
            return Err(invalid("room code is empty"));
        }
        if code.chars().count() > MAX_ROOM_CODE_LEN {
            return Err(invalid("room code is too long"));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("only letters, digits, '-' and '_' are allowed"));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomCode {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Who is logged in and where they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: String,
    /// Opaque login token; absent under the legacy flavor.
    pub token: Option<String>,
    pub avatar: Option<String>,
    pub room: Option<RoomCode>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        !self.user.is_empty()
    }
}

/// `LoggedOut → LoggedIn → InRoom ⇄ InDm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    LoggedOut,
    LoggedIn,
    InRoom(RoomCode),
    /// A DM view; `room` is the room chat returned to on "back".
    InDm { peer: String, room: Option<RoomCode> },
}

impl Phase {
    pub fn of(session: &Session, active_dm: Option<&str>) -> Phase {
        if !session.is_logged_in() {
            return Phase::LoggedOut;
        }
        match (active_dm, &session.room) {
            (Some(peer), room) => Phase::InDm {
                peer: peer.to_string(),
                room: room.clone(),
            },
            (None, Some(room)) => Phase::InRoom(room.clone()),
            (None, None) => Phase::LoggedIn,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::LoggedOut => write!(f, "logged out"),
            Phase::LoggedIn => write!(f, "logged in"),
            Phase::InRoom(room) => write!(f, "in room {room}"),
            Phase::InDm { peer, .. } => write!(f, "DM with {peer}"),
        }
    }
}
