//! Telegram Bot API channel over HTTP long-polling.
//!
//! No webhook setup: the bot calls `getUpdates` with a long-poll timeout and
//! acknowledges updates by advancing the offset. Messages from any chat other
//! than the configured one are acknowledged and dropped — this is a
//! single-user bot, not a public one.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::channels::{ChatChannel, IncomingMessage};
use crate::config::TelegramConfig;
use crate::error::ChannelError;

const API_BASE: &str = "https://api.telegram.org";
const CHANNEL_NAME: &str = "telegram";

pub struct TelegramChannel {
    client: reqwest::Client,
    token: SecretString,
    chat_id: i64,
    poll_timeout: u64,
    offset: AtomicI64,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        // Request timeout must outlast the server-side long-poll window.
        let client = reqwest::Client::builder()
            .timeout(config.poll_timeout + Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            token: config.token.clone(),
            chat_id: config.user_chat_id,
            poll_timeout: config.poll_timeout.as_secs(),
            offset: AtomicI64::new(0),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token.expose_secret())
    }

    async fn call<T, R>(&self, method: &str, body: &T) -> Result<R, ChannelError>
    where
        T: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        let envelope: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;

        if !envelope.ok {
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.to_string(),
                reason: envelope
                    .description
                    .unwrap_or_else(|| "unknown api error".to_string()),
            });
        }
        envelope.result.ok_or_else(|| {
            ChannelError::InvalidMessage("ok response without result".to_string())
        })
    }

    /// Verify the token by asking the API who we are.
    pub async fn check_connection(&self) -> Result<String, ChannelError> {
        let me: BotUser = self.call("getMe", &serde_json::json!({})).await?;
        tracing::info!(username = %me.username, "telegram connection verified");
        Ok(me.username)
    }

    /// Long-poll for the next batch of messages from the configured chat.
    ///
    /// Blocks up to the poll timeout. Every received update advances the
    /// offset, including ones filtered out, so nothing is redelivered.
    pub async fn poll_messages(&self) -> Result<Vec<IncomingMessage>, ChannelError> {
        let request = GetUpdates {
            offset: self.offset.load(Ordering::Relaxed),
            timeout: self.poll_timeout,
            allowed_updates: &["message"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;

        let (messages, next_offset) = accept_updates(updates, self.chat_id);
        if let Some(next) = next_offset {
            self.offset.store(next, Ordering::Relaxed);
        }
        Ok(messages)
    }
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        let request = SendMessage {
            chat_id: self.chat_id,
            text,
        };
        let _sent: MessageEnvelope = self.call("sendMessage", &request).await?;
        tracing::debug!(chars = text.len(), "sent telegram message");
        Ok(())
    }

    fn name(&self) -> &str {
        CHANNEL_NAME
    }
}

/// Keep messages from the configured chat, compute the offset that
/// acknowledges every update in the batch.
fn accept_updates(updates: Vec<Update>, chat_id: i64) -> (Vec<IncomingMessage>, Option<i64>) {
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();
    let messages = updates
        .into_iter()
        .filter_map(|update| update.message)
        .filter(|message| message.chat.id == chat_id)
        .filter_map(|message| message.text)
        .map(|text| IncomingMessage { text })
        .collect();
    (messages, next_offset)
}

// -- Wire types --

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

/// sendMessage echoes the message back; we only need to know it parsed.
#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(rename = "message_id")]
    _message_id: i64,
}

#[derive(Deserialize)]
struct BotUser {
    username: String,
}
