//! Discord platform boundary.
//!
//! Connects to the Discord gateway via serenity, applies access-control
//! policies to inbound messages, maps `!ask` (and dynamic plugin commands)
//! to the reasoning loop, and delivers text and media back to the channel.
//! The stop reaction cancels an in-flight run through the loop's
//! cancellation token.

pub mod access;
pub mod catalog;
pub mod commands;
pub mod error;
pub mod handler;
pub mod outbound;
pub mod state;

pub use {
    catalog::ToolServices,
    error::{Error, Result},
    handler::{Handler, required_intents},
    state::BotState,
};
