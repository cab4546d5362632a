//! Chat channels: how the coach reaches its user.
//!
//! The bot serves exactly one user on one channel, so the seam is small: an
//! outbound send plus a long-poll for inbound messages. Telegram is the only
//! production channel; tests substitute in-memory stubs.

pub mod telegram;

use async_trait::async_trait;

use crate::error::ChannelError;

/// A message from the user, already filtered to the configured chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub text: String,
}

/// Outbound half of a chat channel.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), ChannelError>;

    fn name(&self) -> &str;
}

pub use telegram::TelegramChannel;
