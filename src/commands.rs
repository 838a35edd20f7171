//! REPL command parsing and the message composer.

use std::path::PathBuf;

use crate::api::MessageId;
use crate::error::{ChatError, Result};
use crate::text::{append_emoji, picker_emoji};

pub const HELP: &str = "\
Commands:
  /login <user> <password>        sign in
  /register <user> <password> [avatar]
  /guest [name]                   sign in without an account (legacy servers)
  /logout
  /join <room> [password]         join or switch room
  /leave
  /rooms                          list rooms
  /create <name> [password]       create a room
  /dm <user>                      open a direct message thread
  /back                           return from a DM to the room
  /reply <message-id> <text>
  /upload <path> [caption]        share a file (max 5 MB)
  /kick <user>    /ban <user>     moderation (room creator)
  /modlogs                        moderation log for the room
  /mentions                       messages mentioning you
  /clear                          clear the room history
  /theme <1-6>                    switch colour theme
  /emoji <n>                      add picker emoji n to the draft
  /help
  /quit
Anything else is sent as a message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { user: String, password: String },
    Register { user: String, password: String, avatar: String },
    Guest(Option<String>),
    Logout,
    Join { room: String, password: Option<String> },
    Leave,
    Rooms,
    Create { name: String, password: Option<String> },
    Dm(String),
    Back,
    Reply { id: MessageId, text: String },
    Upload { path: PathBuf, caption: Option<String> },
    Kick(String),
    Ban(String),
    ModLogs,
    Mentions,
    Clear,
    Theme(usize),
    Emoji(usize),
    Help,
    Quit,
    /// Plain text for the current room or DM.
    Say(String),
}

fn usage(text: &str) -> ChatError {
    ChatError::InvalidInput(format!("Usage: {text}"))
}

fn required(arg: Option<&str>, usage_text: &str) -> Result<String> {
    arg.map(str::to_string).ok_or_else(|| usage(usage_text))
}

fn index(arg: Option<&str>, usage_text: &str) -> Result<usize> {
    arg.and_then(|a| a.parse().ok()).ok_or_else(|| usage(usage_text))
}

/// Rest of the line after `n` whitespace-separated words, trimmed.
fn rest_after(line: &str, n: usize) -> Option<&str> {
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        rest = rest[end..].trim_start();
    }
    Some(rest.trim_end()).filter(|r| !r.is_empty())
}

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let line = line.trim();
        let Some(body) = line.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };

        let mut words = body.split_whitespace();
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg1 = words.next();
        let arg2 = words.next();

        let cmd = match name.as_str() {
            "login" => Command::Login {
                user: required(arg1, "/login <user> <password>")?,
                password: required(arg2, "/login <user> <password>")?,
            },
            "register" => Command::Register {
                user: required(arg1, "/register <user> <password> [avatar]")?,
                password: required(arg2, "/register <user> <password> [avatar]")?,
                avatar: words.next().unwrap_or_default().to_string(),
            },
            "guest" => Command::Guest(arg1.map(str::to_string)),
            "logout" => Command::Logout,
            "join" => Command::Join {
                room: required(arg1, "/join <room> [password]")?,
                password: arg2.map(str::to_string),
            },
            "leave" => Command::Leave,
            "rooms" => Command::Rooms,
            "create" => Command::Create {
                name: required(arg1, "/create <name> [password]")?,
                password: arg2.map(str::to_string),
            },
            "dm" => Command::Dm(required(arg1, "/dm <user>")?),
            "back" => Command::Back,
            "reply" => Command::Reply {
                id: MessageId::from(required(arg1, "/reply <message-id> <text>")?.as_str()),
                text: rest_after(body, 2)
                    .map(str::to_string)
                    .ok_or_else(|| usage("/reply <message-id> <text>"))?,
            },
            "upload" => Command::Upload {
                path: PathBuf::from(required(arg1, "/upload <path> [caption]")?),
                caption: rest_after(body, 2).map(str::to_string),
            },
            "kick" => Command::Kick(required(arg1, "/kick <user>")?),
            "ban" => Command::Ban(required(arg1, "/ban <user>")?),
            "modlogs" => Command::ModLogs,
            "mentions" => Command::Mentions,
            "clear" => Command::Clear,
            "theme" => Command::Theme(index(arg1, "/theme <1-6>")?),
            "emoji" => Command::Emoji(index(arg1, "/emoji <n>")?),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => {
                return Err(ChatError::InvalidInput(format!(
                    "Unknown command /{other}. Type /help"
                )))
            }
        };
        Ok(cmd)
    }
}

/// Draft message assembled from picker emoji and typed text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Append picker emoji `n` (1-based). Returns the emoji added.
    pub fn insert_emoji(&mut self, n: usize) -> Option<&'static str> {
        let emoji = picker_emoji(n)?;
        append_emoji(&mut self.draft, emoji);
        Some(emoji)
    }

    /// Draft plus `text`, leaving the composer empty.
    pub fn take_with(&mut self, text: &str) -> String {
        let mut out = std::mem::take(&mut self.draft);
        out.push_str(text);
        out
    }
}
