//! Local mailer for development and testing.
//!
//! Captures messages in memory instead of sending them, and can be told to
//! fail in the ways a real relay does: everything, one recipient, or the
//! next few connection attempts.
//!
//! ```rust,ignore
//! use mailshot::providers::LocalMailer;
//! use mailshot::testing::*;
//!
//! let mailer = LocalMailer::new();
//! mailer.reject_recipient("bounce@example.com", "550 mailbox unavailable");
//!
//! // ... run a campaign with `mailer.clone()` as the connector ...
//!
//! assert_email_count(&mailer, 2);
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{Connector, DeliveryResult, Mailer};
use crate::storage::{MemoryStorage, Storage, StoredEmail};

#[derive(Debug, Default)]
struct Faults {
    /// Every delivery fails with this message.
    all: Option<String>,
    /// Deliveries addressed to these recipients are rejected.
    rejected: HashMap<String, String>,
    /// Number of upcoming `connect()` calls to refuse.
    refuse_connections: usize,
}

/// Local mailer that stores messages in memory.
///
/// Clones share storage, fault configuration and counters, so a test can keep
/// one handle for assertions and give another to the engine.
#[derive(Clone)]
pub struct LocalMailer {
    storage: Arc<MemoryStorage>,
    faults: Arc<RwLock<Faults>>,
    connections: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl LocalMailer {
    /// Create a new local mailer with fresh storage.
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::shared())
    }

    /// Create a local mailer with existing storage.
    pub fn with_storage(storage: Arc<MemoryStorage>) -> Self {
        Self {
            storage,
            faults: Arc::new(RwLock::new(Faults::default())),
            connections: Arc::new(AtomicUsize::new(0)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get a reference to the underlying storage.
    pub fn storage(&self) -> Arc<MemoryStorage> {
        Arc::clone(&self.storage)
    }

    // =========================================================================
    // Failure Simulation
    // =========================================================================

    /// Fail every delivery with `message`.
    pub fn set_failure(&self, message: impl Into<String>) {
        self.faults.write().all = Some(message.into());
    }

    /// Reject any message that addresses `email` in any role.
    pub fn reject_recipient(&self, email: impl Into<String>, message: impl Into<String>) {
        self.faults
            .write()
            .rejected
            .insert(email.into(), message.into());
    }

    /// Refuse the next `count` calls to [`Connector::connect`].
    pub fn refuse_connections(&self, count: usize) {
        self.faults.write().refuse_connections = count;
    }

    /// Clear all configured failures.
    pub fn clear_failure(&self) {
        *self.faults.write() = Faults::default();
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// All captured messages, newest first.
    pub fn emails(&self) -> Vec<StoredEmail> {
        self.storage.all()
    }

    /// The most recently captured message.
    pub fn last_email(&self) -> Option<StoredEmail> {
        self.storage.all().into_iter().next()
    }

    /// Count of captured messages.
    pub fn email_count(&self) -> usize {
        self.storage.count()
    }

    pub fn has_emails(&self) -> bool {
        self.storage.count() > 0
    }

    /// Remove and return all captured messages.
    pub fn flush(&self) -> Vec<StoredEmail> {
        self.storage.flush()
    }

    /// Number of `deliver` calls, successful or not.
    pub fn delivery_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of `connect` calls, refused or not.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Whether any captured message lists `email` as a To recipient.
    pub fn sent_to(&self, email: &str) -> bool {
        self.storage
            .all()
            .iter()
            .any(|stored| stored.email.to.iter().any(|a| a.email == email))
    }

    /// Find captured messages matching a predicate.
    pub fn find_emails<F>(&self, predicate: F) -> Vec<StoredEmail>
    where
        F: Fn(&Email) -> bool,
    {
        self.storage
            .all()
            .into_iter()
            .filter(|stored| predicate(&stored.email))
            .collect()
    }
}

impl Default for LocalMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for LocalMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        {
            let faults = self.faults.read();
            if let Some(ref message) = faults.all {
                return Err(MailError::SendError(message.clone()));
            }
            if let Some((addr, message)) = email
                .all_recipients()
                .into_iter()
                .find_map(|a| faults.rejected.get(&a.email).map(|m| (&a.email, m)))
            {
                return Err(MailError::rejected(addr.clone(), message.clone()));
            }
        }

        let message_id = self.storage.push(email.clone());
        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

impl Connector for LocalMailer {
    fn connect(&self) -> Result<Arc<dyn Mailer>, MailError> {
        self.connections.fetch_add(1, Ordering::SeqCst);

        let mut faults = self.faults.write();
        if faults.refuse_connections > 0 {
            faults.refuse_connections -= 1;
            return Err(MailError::Connection("connection refused".into()));
        }
        Ok(Arc::new(self.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}
