//! Crate-level error type.
//!
//! Every fallible operation returns [`ChatError`]. The synchronizer never
//! propagates these to its caller; it converts them into a user-visible
//! [`Notification`](crate::view::Notification) via [`ChatError::user_message`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = ChatError> = std::result::Result<T, E>;

/// Errors raised by validation, transport, and configuration.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Room code failed the accepted identifier format.
    #[error("invalid room code '{code}': {reason}")]
    InvalidRoomCode { code: String, reason: &'static str },

    /// No logged-in user, or no token under the token API flavor.
    #[error("not logged in")]
    NotAuthenticated,

    /// The operation needs an active room view.
    #[error("no active room")]
    NoActiveRoom,

    /// The operation needs an open direct-message view.
    #[error("no direct message thread is open")]
    NoActiveDm,

    /// Upload rejected locally before transfer.
    #[error("file too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// Any other locally rejected input (missing room name, bad peer, ...).
    #[error("{0}")]
    InvalidInput(String),

    /// A TCP-level connection could not be established or the request timed out.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// The server replied with a non-2xx status code.
    #[error("HTTP {status} from {url}")]
    Http {
        status: u16,
        url: String,
        /// Server-provided `error` text, when the body carried one.
        message: Option<String>,
    },

    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error on field '{field}': {detail}")]
    Json { field: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl ChatError {
    /// True for errors raised locally before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChatError::InvalidRoomCode { .. }
                | ChatError::NotAuthenticated
                | ChatError::NoActiveRoom
                | ChatError::NoActiveDm
                | ChatError::FileTooLarge { .. }
                | ChatError::InvalidInput(_)
        )
    }

    /// Text shown to the user.
    ///
    /// Server-provided error text is surfaced verbatim; transport failures
    /// collapse to a generic "Network error"; other server failures use the
    /// operation-specific `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ChatError::InvalidRoomCode { code, .. } if code.is_empty() => {
                "Please enter a room code".to_string()
            }
            ChatError::InvalidRoomCode { code, reason } => {
                format!("Invalid room code '{code}': {reason}")
            }
            ChatError::NotAuthenticated => "Please log in first".to_string(),
            ChatError::NoActiveRoom => "Join a room first".to_string(),
            ChatError::NoActiveDm => "Open a direct message first".to_string(),
            ChatError::FileTooLarge { limit, .. } => format!(
                "File too large (max {})",
                crate::text::format_file_size(*limit)
            ),
            ChatError::InvalidInput(msg) => msg.clone(),
            ChatError::Connect { .. } => "Network error".to_string(),
            ChatError::Http {
                message: Some(msg), ..
            } if !msg.trim().is_empty() => msg.clone(),
            ChatError::Http { .. } | ChatError::Json { .. } => fallback.to_string(),
            ChatError::Io(e) => format!("{fallback}: {e}"),
            ChatError::Config(_) => self.to_string(),
        }
    }
}
