//! Outbound email backends

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// Optional `text/html` alternative
    pub html_body: Option<String>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail send timed out after {0} ms")]
    Timeout(u64),
}

/// Delivers one rendered email
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Console backend: writes the message to the log instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            html = email.html_body.is_some(),
            "Email (console backend)\n{}",
            email.body
        );
        Ok(())
    }
}

/// In-memory outbox, inspected by tests and local tooling
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<Email>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far
    pub async fn sent(&self) -> Vec<Email> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.outbox.lock().await.push(email.clone());
        Ok(())
    }
}
