//! In-memory capture of delivered messages for the local mailer.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::email::Email;

/// A captured message with metadata.
#[derive(Debug, Clone)]
pub struct StoredEmail {
    /// Unique identifier for this message.
    pub id: String,
    /// The message as delivered.
    pub email: Email,
    /// When the message was captured.
    pub sent_at: DateTime<Utc>,
}

/// Trait for message capture backends.
pub trait Storage: Send + Sync {
    /// Store a message and return its ID.
    fn push(&self, email: Email) -> String;

    /// Get a message by ID.
    fn get(&self, id: &str) -> Option<StoredEmail>;

    /// All stored messages, newest first.
    fn all(&self) -> Vec<StoredEmail>;

    /// Clear all stored messages.
    fn clear(&self);

    /// Count of stored messages.
    fn count(&self) -> usize;

    /// Remove and return all stored messages, newest first.
    fn flush(&self) -> Vec<StoredEmail>;
}

#[derive(Debug, Default)]
struct Inner {
    emails: HashMap<String, StoredEmail>,
    order: Vec<String>,
}

impl Inner {
    fn newest_first(&self) -> Vec<StoredEmail> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.emails.get(id).cloned())
            .collect()
    }
}

/// Thread-safe in-memory storage, used by `LocalMailer`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Storage for MemoryStorage {
    fn push(&self, email: Email) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let stored = StoredEmail {
            id: id.clone(),
            email,
            sent_at: Utc::now(),
        };

        let mut inner = self.inner.write();
        inner.emails.insert(id.clone(), stored);
        inner.order.push(id.clone());
        id
    }

    fn get(&self, id: &str) -> Option<StoredEmail> {
        self.inner.read().emails.get(id).cloned()
    }

    fn all(&self) -> Vec<StoredEmail> {
        self.inner.read().newest_first()
    }

    fn clear(&self) {
        let mut inner = self.inner.write();
        inner.emails.clear();
        inner.order.clear();
    }

    fn count(&self) -> usize {
        self.inner.read().emails.len()
    }

    fn flush(&self) -> Vec<StoredEmail> {
        let mut inner = self.inner.write();
        let result = inner.newest_first();
        inner.emails.clear();
        inner.order.clear();
        result
    }
}
