//! # Outbound Mail
//!
//! Password reset links go out through a [`Mailer`]. `HttpMailer` posts to
//! a JSON mail relay; `LogMailer` only logs, for development and tests.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

use crate::error::AuthError;

/// A plain-text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), AuthError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Sends mail by POSTing `{from, to, subject, text}` to a relay endpoint.
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: Option<String>,
        from: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Mail(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            relay_url: relay_url.into(),
            api_key,
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: &MailMessage) -> Result<(), AuthError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        };

        let mut request = self.client.post(&self.relay_url).json(&payload);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Mail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Mail(format!(
                "relay responded with {}",
                response.status()
            )));
        }

        info!("Mail relayed");
        Ok(())
    }
}

/// Logs messages instead of sending them, keeping a copy of each.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AuthError> {
        info!(to = %message.to, subject = %message.subject, "Mail relay not configured, logging message");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}
