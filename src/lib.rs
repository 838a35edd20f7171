//! Terminal client for ChatFlow, a polling-based group chat service.
//!
//! [`client::ChatClient`] keeps a local mirror of the room the user is in
//! and reconciles it with the server on fixed poll intervals. The backend is
//! reached through [`api::ChatApi`]; output goes to a [`view::ChatView`].

pub mod api;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod render;
pub mod session;
pub mod text;
pub mod theme;
pub mod view;

pub use client::{ChatClient, ChatClientBuilder};
pub use error::{ChatError, Result};
