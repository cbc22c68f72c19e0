//! # mailshot
//!
//! Resolve a campaign's recipients, send it as one shared message or one
//! personalized message per contact, and record what happened to each
//! recipient.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mailshot::{mailer_from_env, Engine, EngineConfig, MemoryDirectory, MemoryOutcomeStore};
//!
//! let engine = Engine::new(
//!     EngineConfig::from_env()?,
//!     Arc::new(MemoryDirectory::from_path("campaigns.json")?),
//!     mailer_from_env()?,
//!     Arc::new(MemoryOutcomeStore::new()),
//! );
//!
//! let result = engine.run_campaign(7, true).await?;
//! println!("{result}");
//! ```
//!
//! ## Recipients
//!
//! Each role (To, CC, BCC) is resolved independently from manual addresses
//! (CC/BCC only), contact groups and ad-hoc contacts (To only). Within a role
//! addresses are unique and keep first-seen order; across roles they are not
//! deduplicated. Inactive contacts never appear.
//!
//! ## Delivery modes
//!
//! | To | Send mode | Delivery |
//! |----|-----------|----------|
//! | empty, CC/BCC not | any | one message, empty To, no outcomes |
//! | non-empty | shared | one message, primary recipients in BCC |
//! | non-empty | personalized | one message per primary recipient, placeholders rendered |
//! | everything empty | any | rejected with [`CampaignError::NoRecipients`] |
//!
//! Placeholders are `{{first_name}}`, `{{last_name}}`, `{{full_name}}` and
//! `{{email}}`; see [`render`].
//!
//! ## Feature Flags
//!
//! - `smtp` - SMTP transport via lettre
//! - `local` - [`LocalMailer`](providers::LocalMailer) and the [`testing`] helpers (default)
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//! - `cli` - the `mailshot` binary
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mailshot_messages_total` | Counter | mode, status | Transport calls |
//! | `mailshot_message_duration_seconds` | Histogram | mode | Transport call duration |
//! | `mailshot_outcomes_total` | Counter | status | Outcome rows written |
//! | `mailshot_run_duration_seconds` | Histogram | mode | Whole-run duration |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the mailshot crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod address_set;
mod campaign;
mod config;
mod directory;
mod dispatch;
mod email;
mod engine;
mod error;
mod executor;
mod mailer;
mod outcome;
mod personalize;
mod resolver;

pub mod providers;

#[cfg(feature = "local")]
mod storage;

#[cfg(feature = "local")]
pub mod testing;

pub use address::{Address, ToAddress};
pub use address_set::{AddressSet, Recipient};
pub use campaign::{
    Campaign, CampaignId, Contact, ContactGroup, ContactId, GroupId, Role, RoleSources, SendMode,
    Template,
};
pub use config::{mailer_from_env, EngineConfig};
pub use directory::{Directory, DirectoryData, MemoryDirectory};
pub use dispatch::{DeliveryMode, Frame};
pub use email::Email;
pub use engine::Engine;
pub use error::{CampaignError, MailError, TransportErrorKind};
pub use executor::{CancelHandle, Executor, RunContext};
pub use mailer::{Connector, DeliveryResult, Mailer, SharedConnector};
pub use outcome::{
    aggregate, delivery_rate, DeliveryOutcome, DeliveryStats, DeliveryStatus, MemoryOutcomeStore,
    OutcomeStore, RunResult, CANCELLED_DETAIL,
};
pub use personalize::{render, strip_html_tags, RenderedContent};
pub use resolver::{parse_manual, parse_reply_to, resolve, Recipients};

#[cfg(feature = "local")]
pub use storage::{MemoryStorage, Storage, StoredEmail};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Address, Campaign, CampaignError, Connector, Contact, ContactGroup, DeliveryStatus,
        Directory, Email, Engine, EngineConfig, MailError, Mailer, OutcomeStore, RunResult,
        SendMode, ToAddress,
    };

    #[cfg(feature = "local")]
    pub use crate::{MemoryStorage, Storage};
}
