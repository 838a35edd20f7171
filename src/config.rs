//! Client configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) yields a working local setup.
//!
//! ```toml
//! [server]
//! local_url = "http://localhost:5050"
//! deployed_url = "https://chatflow.onrender.com"
//! flavor = "token"
//!
//! [polling]
//! messages_ms = 2000
//! typing_idle_ms = 2000
//!
//! [upload]
//! max_bytes = 5242880
//! ```

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ChatError, Result};

/// Which server contract to speak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Login token, `/join_room` and `/send_message`.
    #[default]
    Token,
    /// No login, `/join` and `/send` with explicit user fields.
    Legacy,
}

/// How the session token is placed in the `Authorization` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: <token>`
    #[default]
    Raw,
    /// `Authorization: Bearer <token>`
    Bearer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Backend used when the hostname is one of `local_hosts`.
    pub local_url: String,
    /// Backend used for every other hostname.
    pub deployed_url: String,
    pub local_hosts: Vec<String>,
    pub flavor: Flavor,
    pub auth_scheme: AuthScheme,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            local_url: "http://localhost:5050".to_string(),
            deployed_url: "https://chatflow.onrender.com".to_string(),
            local_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            flavor: Flavor::Token,
            auth_scheme: AuthScheme::Raw,
            connect_timeout_ms: 3_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Poll and debounce periods, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Room messages + room presence.
    pub messages_ms: u64,
    pub unread_ms: u64,
    pub rooms_ms: u64,
    /// Global online-user set feeding the DM list.
    pub online_ms: u64,
    pub heartbeat_ms: u64,
    pub dm_ms: u64,
    /// Idle gap after the last keystroke before `typing=false` is sent.
    pub typing_idle_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            messages_ms: 2_000,
            unread_ms: 5_000,
            rooms_ms: 10_000,
            online_ms: 5_000,
            heartbeat_ms: 10_000,
            dm_ms: 2_000,
            typing_idle_ms: 2_000,
        }
    }
}

impl PollingConfig {
    pub fn messages(&self) -> Duration {
        Duration::from_millis(self.messages_ms)
    }
    pub fn unread(&self) -> Duration {
        Duration::from_millis(self.unread_ms)
    }
    pub fn rooms(&self) -> Duration {
        Duration::from_millis(self.rooms_ms)
    }
    pub fn online(&self) -> Duration {
        Duration::from_millis(self.online_ms)
    }
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
    pub fn dm(&self) -> Duration {
        Duration::from_millis(self.dm_ms)
    }
    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }

    fn named(&self) -> [(&'static str, u64); 7] {
        [
            ("messages_ms", self.messages_ms),
            ("unread_ms", self.unread_ms),
            ("rooms_ms", self.rooms_ms),
            ("online_ms", self.online_ms),
            ("heartbeat_ms", self.heartbeat_ms),
            ("dm_ms", self.dm_ms),
            ("typing_idle_ms", self.typing_idle_ms),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Local ceiling checked before any transfer.
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub upload: UploadConfig,
}

impl ClientConfig {
    /// Parse a TOML document; missing tables and fields take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// The local-vs-deployed base URL switch, keyed on hostname.
    pub fn base_url_for_host(&self, hostname: &str) -> &str {
        let host = hostname.trim();
        if self
            .server
            .local_hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(host))
        {
            &self.server.local_url
        } else {
            &self.server.deployed_url
        }
    }

    /// Reject settings the runtime cannot honour (zero periods panic tokio intervals).
    pub fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self.polling.named().iter().find(|(_, ms)| *ms == 0) {
            return Err(ChatError::Config(format!("polling.{name} must be greater than zero")));
        }
        if self.server.local_url.trim().is_empty() || self.server.deployed_url.trim().is_empty() {
            return Err(ChatError::Config("server URLs must not be empty".to_string()));
        }
        if self.upload.max_bytes == 0 {
            return Err(ChatError::Config("upload.max_bytes must be greater than zero".to_string()));
        }
        Ok(())
    }
}
