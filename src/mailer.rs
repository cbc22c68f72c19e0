//! Mail transport traits and delivery result types.
//!
//! [`Mailer`] is the transport primitive: hand it one [`Email`], get back a
//! [`DeliveryResult`] or a categorized [`MailError`]. It is used through
//! `Arc<dyn Mailer>`, which is why it goes through `async_trait` rather than
//! native async traits.
//!
//! [`Connector`] sits one level above: the engine asks it for a fresh handle
//! before every message, so a refused connection costs one recipient rather
//! than the rest of the run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::email::Email;
use crate::error::MailError;

/// Result of a successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Message ID assigned by the transport
    pub message_id: String,
}

impl DeliveryResult {
    /// Create a new delivery result with just a message ID.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }
}

/// Trait for mail transports.
///
/// ```ignore
/// use mailshot::{Email, Mailer};
/// use mailshot::providers::LoggerMailer;
///
/// let mailer = LoggerMailer::new();
/// let result = mailer.deliver(&email).await?;
/// println!("Sent with ID: {}", result.message_id);
/// ```
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a single email.
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError>;

    /// Get the provider name (for logging/metrics).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }
}

#[async_trait]
impl Mailer for Arc<dyn Mailer> {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        (**self).deliver(email).await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}

/// Hands out a transport handle per outbound message.
///
/// Connecting may fail on its own (credentials rejected, relay down); the
/// engine records that failure against the one message it was meant for.
pub trait Connector: Send + Sync {
    /// Open a handle for the next message.
    fn connect(&self) -> Result<Arc<dyn Mailer>, MailError>;

    /// Provider name for logging/metrics.
    fn provider_name(&self) -> &'static str {
        "unknown"
    }
}

/// A connector that hands out the same already-open mailer every time.
///
/// Suitable for transports that pool their own connections.
#[derive(Clone)]
pub struct SharedConnector {
    mailer: Arc<dyn Mailer>,
}

impl SharedConnector {
    pub fn new<M: Mailer + 'static>(mailer: M) -> Self {
        Self {
            mailer: Arc::new(mailer),
        }
    }
}

impl Connector for SharedConnector {
    fn connect(&self) -> Result<Arc<dyn Mailer>, MailError> {
        Ok(Arc::clone(&self.mailer))
    }

    fn provider_name(&self) -> &'static str {
        self.mailer.provider_name()
    }
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn connect(&self) -> Result<Arc<dyn Mailer>, MailError> {
        (**self).connect()
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LoggerMailer;

    #[tokio::test]
    async fn test_shared_connector_reuses_mailer() {
        let connector = SharedConnector::new(LoggerMailer::new());
        assert_eq!(connector.provider_name(), "logger");

        let a = connector.connect().unwrap();
        let b = connector.connect().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let email = Email::new().from("a@example.com").to("b@example.com");
        assert!(a.deliver(&email).await.is_ok());
    }
}
