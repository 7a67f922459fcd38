//! Run reports and where they are delivered.
//!
//! A [`Report`] is Telegram-flavored HTML plus optional file attachments.
//! When no bot is configured reports are printed instead.

pub mod format;
mod telegram;

pub use format::{chunk_text, failure_message, no_new_message, success_message};
pub use telegram::TelegramNotifier;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::NotifyConfig;

/// Errors from delivering a report.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram {method} failed: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("Cannot read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A message to deliver after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// HTML body (Telegram subset).
    pub text: String,
    /// Files sent after the text.
    pub attachments: Vec<PathBuf>,
}

impl Report {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, path: PathBuf) -> Self {
        self.attachments.push(path);
        self
    }
}

/// Delivers reports somewhere a human will see them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), NotifyError>;
}

/// Prints reports to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, report: &Report) -> Result<(), NotifyError> {
        println!("{}", report.text.trim_end());
        for path in &report.attachments {
            println!("Attachment: {}", path.display());
        }
        Ok(())
    }
}

/// Pick the Telegram notifier when credentials are configured.
pub fn notifier_from_config(config: &NotifyConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    match config.telegram() {
        Some((token, chat_id)) => Ok(Box::new(TelegramNotifier::new(
            token,
            chat_id,
            config.chunk_size,
        )?)),
        None => {
            tracing::info!("Telegram not configured, printing reports");
            Ok(Box::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let report = Report::new("<b>hi</b>").with_attachment(PathBuf::from("/tmp/a.zip"));
        assert_eq!(report.attachments.len(), 1);
        LogNotifier.send(&report).await.unwrap();
    }
}
