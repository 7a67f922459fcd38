//! Telegram Bot API delivery.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{chunk_text, Notifier, NotifyError, Report};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Sends reports to one chat through a bot.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
    chunk_size: usize,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str, chunk_size: usize) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            chunk_size,
        })
    }

    /// Point at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn check(
        method: &'static str,
        response: reqwest::Response,
    ) -> Result<(), NotifyError> {
        let status = response.status();
        let body: ApiResponse = match response.json().await {
            Ok(body) => body,
            Err(_) => ApiResponse {
                ok: false,
                description: Some(format!("HTTP {}", status)),
            },
        };
        if body.ok {
            Ok(())
        } else {
            Err(NotifyError::Api {
                method,
                description: body
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            })
        }
    }

    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;
        Self::check("sendMessage", response).await
    }

    async fn send_document(&self, path: &Path) -> Result<(), NotifyError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| NotifyError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("document", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        Self::check("sendDocument", response).await
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, report: &Report) -> Result<(), NotifyError> {
        let chunks = chunk_text(&report.text, self.chunk_size);
        debug!("Sending report in {} message(s)", chunks.len());
        for chunk in &chunks {
            self.send_message(chunk).await?;
        }
        for path in &report.attachments {
            self.send_document(path).await?;
        }
        info!("Report sent to Telegram");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let notifier = TelegramNotifier::new("123:ABC", "42", 4096)
            .unwrap()
            .with_api_base("http://127.0.0.1:8081/");
        assert_eq!(
            notifier.method_url("sendMessage"),
            "http://127.0.0.1:8081/bot123:ABC/sendMessage"
        );
    }
}
