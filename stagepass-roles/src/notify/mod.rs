//! Notification dispatch for audited workflow actions
//!
//! Runs strictly after the workflow transaction has committed. Every delivery is spawned
//! onto a [`TaskTracker`] so the HTTP response never waits for mail or webhooks, and
//! every failure is logged and dropped. [`NotificationDispatcher::drain`] waits for
//! in-flight deliveries (graceful shutdown, tests).

pub mod mailer;
pub mod templates;
pub mod webhook;

use sqlx::SqlitePool;
use stagepass_common::config::NotificationConfig;
use stagepass_common::db::settings::WEBHOOK_URL_KEY;
use stagepass_common::db::get_setting;
use stagepass_common::time::{millis_to_duration, to_db_timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::models::{Account, KycAuditEntry, UpgradeRequest};
pub use mailer::{Email, LogMailer, MailError, Mailer, MemoryMailer};
pub use templates::{render, RenderedMessage, TemplateContext, TemplateKey};
pub use webhook::{WebhookClient, WebhookError, WebhookPayload};

/// Everything needed to notify about one committed audit entry
#[derive(Debug, Clone)]
pub struct Notice {
    /// Request owner (recipient)
    pub account: Account,
    pub request: UpgradeRequest,
    pub entry: KycAuditEntry,
}

struct DispatcherInner {
    mailer: Arc<dyn Mailer>,
    webhook: Option<WebhookClient>,
    from_address: String,
    mail_timeout: Duration,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<DispatcherInner>,
    tracker: TaskTracker,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        webhook: Option<WebhookClient>,
        from_address: String,
        mail_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                mailer,
                webhook,
                from_address,
                mail_timeout,
            }),
            tracker: TaskTracker::new(),
        }
    }

    /// Build from the `[notifications]` section and an already resolved webhook URL
    pub fn from_config(
        config: &NotificationConfig,
        webhook_url: Option<String>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, WebhookError> {
        let webhook = webhook_url
            .map(|url| {
                WebhookClient::new(
                    url,
                    millis_to_duration(config.webhook_timeout_ms),
                    config.webhook_max_attempts,
                    millis_to_duration(config.webhook_retry_backoff_ms),
                )
            })
            .transpose()?;

        match &webhook {
            Some(client) => info!("KYC webhook enabled: {}", client.url()),
            None => info!("KYC webhook disabled"),
        }
        info!("Mail backend: {}", mailer.name());

        Ok(Self::new(
            mailer,
            webhook,
            config.from_address.clone(),
            millis_to_duration(config.mail_timeout_ms),
        ))
    }

    /// Queue delivery for a committed action and return immediately
    pub fn dispatch(&self, notice: Notice) {
        let inner = Arc::clone(&self.inner);
        self.tracker.spawn(async move {
            inner.deliver(notice).await;
        });
    }

    /// Deliveries still in flight
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every queued delivery has finished
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl DispatcherInner {
    async fn deliver(&self, notice: Notice) {
        let notes = notice.entry.notes.as_deref().unwrap_or("");

        if let Some(key) = TemplateKey::for_action(notice.entry.action) {
            let message = render(
                key,
                &TemplateContext {
                    account: &notice.account,
                    request: &notice.request,
                    notes,
                },
            );
            self.send_mail(key, &notice, message).await;
        }

        if let Some(webhook) = &self.webhook {
            let payload = WebhookPayload {
                request_id: notice.request.id,
                user_email: notice.account.email.clone(),
                action: notice.entry.action.as_str().to_string(),
                notes: notes.to_string(),
                timestamp: to_db_timestamp(&notice.entry.created_at),
            };
            if let Err(e) = webhook.post(&payload).await {
                warn!(
                    request_id = notice.request.id,
                    action = %notice.entry.action,
                    "Webhook delivery failed: {}",
                    e
                );
            }
        }
    }

    async fn send_mail(&self, key: TemplateKey, notice: &Notice, message: RenderedMessage) {
        let email = Email {
            from: self.from_address.clone(),
            to: notice.account.email.clone(),
            subject: message.subject,
            body: message.body,
            html_body: Some(message.html_body),
        };

        let outcome = match tokio::time::timeout(self.mail_timeout, self.mailer.send(&email)).await
        {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(self.mail_timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(()) => debug!(
                request_id = notice.request.id,
                template = %key,
                to = %email.to,
                "Notification sent"
            ),
            Err(e) => warn!(
                request_id = notice.request.id,
                template = %key,
                "Notification email failed: {}",
                e
            ),
        }
    }
}

/// Webhook URL in effect: `kyc_webhook_url` setting first, then TOML
///
/// A missing setting falls back to TOML; an empty setting disables the webhook.
pub async fn resolve_webhook_url(
    pool: &SqlitePool,
    toml_url: Option<&str>,
) -> stagepass_common::Result<Option<String>> {
    let url = match get_setting(pool, WEBHOOK_URL_KEY).await? {
        Some(value) => Some(value),
        None => toml_url.map(str::to_string),
    };
    Ok(url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()))
}
