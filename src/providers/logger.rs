//! Logger mailer that only logs messages.
//!
//! Useful for staging, or for a dry run of a campaign: every message is
//! reported through `tracing` and counted as delivered.

use async_trait::async_trait;
use std::sync::Arc;

use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{Connector, DeliveryResult, Mailer};

/// Logger mailer that emits tracing events for messages.
#[derive(Debug, Clone, Default)]
pub struct LoggerMailer {
    /// If true, log full message details. If false, just a recipient summary.
    log_full: bool,
}

impl LoggerMailer {
    /// Create a logger mailer with brief output.
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger mailer with full message details.
    pub fn full() -> Self {
        Self { log_full: true }
    }

    /// Set whether to log full message details.
    pub fn log_full(mut self, full: bool) -> Self {
        self.log_full = full;
        self
    }
}

#[async_trait]
impl Mailer for LoggerMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let message_id = uuid::Uuid::new_v4().to_string();

        if self.log_full {
            tracing::info!(
                message_id = %message_id,
                from = ?email.from.as_ref().map(|a| a.formatted()),
                to = ?email.to.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                cc = ?email.cc.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                bcc = ?email.bcc.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                reply_to = ?email.reply_to.as_ref().map(|a| a.formatted()),
                subject = %email.subject,
                has_html = email.html_body.is_some(),
                has_text = email.text_body.is_some(),
                "Email logged (full)"
            );

            if let Some(ref text) = email.text_body {
                tracing::debug!(body = %text, "Text body");
            }
            if let Some(ref html) = email.html_body {
                tracing::debug!(body = %html, "HTML body");
            }
        } else {
            tracing::info!(
                message_id = %message_id,
                to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
                recipients = email.all_recipients().len(),
                subject = %email.subject,
                "Email logged"
            );
        }

        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }
}

impl Connector for LoggerMailer {
    fn connect(&self) -> Result<Arc<dyn Mailer>, MailError> {
        Ok(Arc::new(self.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }
}
