//! `moonwheel-discord`: serenity front end.
//!
//! [`client::DiscordChatClient`] is the REST-only [`moonwheel_notify::ChatClient`]
//! the scheduler delivers through. [`adapter::DiscordAdapter`] runs the
//! gateway connection that receives slash commands and button clicks.

pub mod adapter;
pub mod client;
pub mod commands;
pub mod components;
pub mod context;
pub mod embed;
pub mod error;
pub mod handler;

pub use adapter::DiscordAdapter;
pub use client::DiscordChatClient;
pub use context::DiscordAppContext;
pub use error::{DiscordError, Result};
