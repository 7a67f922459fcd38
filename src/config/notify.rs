//! Notification settings.

use std::env;

use serde::{Deserialize, Serialize};

/// Telegram rejects messages longer than this many characters.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Telegram bot token. Set via `TELEGRAM_BOT_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat ID. Set via `TELEGRAM_CHAT_ID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,

    /// Maximum characters per message.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            telegram_chat_id: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl NotifyConfig {
    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram_bot_token = Some(token);
            }
        }
        if let Ok(chat_id) = env::var("TELEGRAM_CHAT_ID") {
            if !chat_id.is_empty() {
                self.telegram_chat_id = Some(chat_id);
            }
        }
        self
    }

    /// Token and chat ID, when both are configured.
    pub fn telegram(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) => Some((token.as_str(), chat.as_str())),
            _ => None,
        }
    }
}
