//! Webhook delivery.
//!
//! One POST per alert with a JSON body `{"content": "..."}`. There is no
//! retry; a failed delivery is reported to the caller and logged there.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {status}")]
    Status { status: u16 },
}

/// Body posted to a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub content: String,
}

impl WebhookPayload {
    /// `"{mentions}: {message}"`, or just the message when there are no mentions.
    pub fn new(mentions: &str, message: &str) -> Self {
        let content = if mentions.is_empty() {
            message.to_string()
        } else {
            format!("{mentions}: {message}")
        };
        Self { content }
    }
}

/// Anything that can deliver a payload to a webhook URL.
pub trait Notifier: Send + Sync {
    fn send(&self, hook_url: &str, payload: &WebhookPayload) -> Result<(), NotifyError>;
}

/// Posts payloads over HTTP.
pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("sectorwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, hook_url: &str, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let response = self.client.post(hook_url).json(payload).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Records every payload instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, WebhookPayload)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(hook_url, payload)` pairs in delivery order.
    pub fn sent(&self) -> Vec<(String, WebhookPayload)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, hook_url: &str, payload: &WebhookPayload) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((hook_url.to_string(), payload.clone()));
        Ok(())
    }
}
