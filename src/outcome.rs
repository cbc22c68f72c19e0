//! Delivery outcomes, their store, and run-level aggregation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::campaign::{CampaignId, ContactId};
use crate::dispatch::DeliveryMode;
use crate::error::{CampaignError, MailError, TransportErrorKind};

/// Detail recorded for recipients a cancelled run never reached.
pub const CANCELLED_DETAIL: &str = "cancelled before send";

/// Status of one primary recipient's delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sending,
    Sent,
    Failed,
    Bounced,
}

impl DeliveryStatus {
    /// Once terminal, an outcome is never rewritten.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Bounced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Bounced => "bounced",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record of one send attempt to one primary recipient in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub campaign_id: CampaignId,
    pub run_id: Uuid,
    /// The directory contact; always present for recipients resolved from groups or contacts.
    pub contact_id: Option<ContactId>,
    pub email: String,
    pub status: DeliveryStatus,
    /// Present only when `status` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<TransportErrorKind>,
    /// Transport message id when sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl DeliveryOutcome {
    fn base(
        campaign_id: CampaignId,
        run_id: Uuid,
        contact_id: Option<ContactId>,
        email: impl Into<String>,
        status: DeliveryStatus,
    ) -> Self {
        Self {
            campaign_id,
            run_id,
            contact_id,
            email: email.into(),
            status,
            error: None,
            error_kind: None,
            message_id: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn sent(
        campaign_id: CampaignId,
        run_id: Uuid,
        contact_id: Option<ContactId>,
        email: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Self::base(campaign_id, run_id, contact_id, email, DeliveryStatus::Sent)
        }
    }

    pub fn failed(
        campaign_id: CampaignId,
        run_id: Uuid,
        contact_id: Option<ContactId>,
        email: impl Into<String>,
        error: &MailError,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            error_kind: Some(error.category()),
            ..Self::base(campaign_id, run_id, contact_id, email, DeliveryStatus::Failed)
        }
    }

    /// A recipient that was never attempted because the run was cancelled.
    pub fn cancelled(
        campaign_id: CampaignId,
        run_id: Uuid,
        contact_id: Option<ContactId>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(CANCELLED_DETAIL.to_string()),
            ..Self::base(campaign_id, run_id, contact_id, email, DeliveryStatus::Failed)
        }
    }
}

/// Append-only persistence for delivery outcomes.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Record a terminal outcome. Must refuse to overwrite an existing
    /// terminal record for the same run and recipient.
    async fn record(&self, outcome: DeliveryOutcome) -> Result<(), CampaignError>;
}

/// In-memory outcome store.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    outcomes: RwLock<Vec<DeliveryOutcome>>,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All outcomes in recording order.
    pub fn all(&self) -> Vec<DeliveryOutcome> {
        self.outcomes.read().clone()
    }

    pub fn for_run(&self, run_id: Uuid) -> Vec<DeliveryOutcome> {
        self.outcomes
            .read()
            .iter()
            .filter(|o| o.run_id == run_id)
            .cloned()
            .collect()
    }

    pub fn for_campaign(&self, campaign_id: CampaignId) -> Vec<DeliveryOutcome> {
        self.outcomes
            .read()
            .iter()
            .filter(|o| o.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.outcomes.read().len()
    }
}

#[async_trait]
impl OutcomeStore for MemoryOutcomeStore {
    async fn record(&self, outcome: DeliveryOutcome) -> Result<(), CampaignError> {
        let mut outcomes = self.outcomes.write();
        let existing = outcomes
            .iter()
            .any(|o| o.run_id == outcome.run_id && o.email == outcome.email && o.status.is_terminal());
        if existing {
            return Err(CampaignError::Store(format!(
                "outcome for {} in run {} is already final",
                outcome.email, outcome.run_id
            )));
        }
        outcomes.push(outcome);
        Ok(())
    }
}

/// Percentage of `sent` over `total`, rounded to two decimals. `0` when `total` is `0`.
pub fn delivery_rate(sent: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((sent as f64 / total as f64) * 100.0 * 100.0).round() / 100.0
}

/// Tallies over a set of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    /// Outcomes with status `sent`.
    pub sent: usize,
    /// Every other terminal outcome, bounces included.
    pub failed: usize,
    /// Subset of `failed` that bounced.
    pub bounced: usize,
    /// Outcomes still `pending` or `sending`.
    pub in_flight: usize,
}

impl DeliveryStats {
    /// Every primary recipient counted, including those still in flight.
    pub fn total(&self) -> usize {
        self.sent + self.failed + self.in_flight
    }

    /// A run succeeds when at least one recipient was sent to.
    pub fn success(&self) -> bool {
        self.sent > 0
    }

    pub fn delivery_rate(&self) -> f64 {
        delivery_rate(self.sent, self.total())
    }
}

/// Tally outcomes.
pub fn aggregate<'a, I>(outcomes: I) -> DeliveryStats
where
    I: IntoIterator<Item = &'a DeliveryOutcome>,
{
    outcomes
        .into_iter()
        .fold(DeliveryStats::default(), |mut stats, outcome| {
            match outcome.status {
                DeliveryStatus::Sent => stats.sent += 1,
                DeliveryStatus::Failed => stats.failed += 1,
                DeliveryStatus::Bounced => {
                    stats.failed += 1;
                    stats.bounced += 1;
                }
                DeliveryStatus::Pending | DeliveryStatus::Sending => stats.in_flight += 1,
            }
            stats
        })
}

/// What a campaign run reports back to its caller. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub campaign_id: CampaignId,
    pub mode: DeliveryMode,
    pub success: bool,
    pub message: String,
    /// Recipients the transport accepted.
    pub sent: usize,
    /// Recipients that failed or were never attempted.
    pub failed: usize,
    /// Outcome rows written for this run.
    pub outcomes: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    /// Percentage of recipients sent to in this run.
    pub fn delivery_rate(&self) -> f64 {
        delivery_rate(self.sent, self.sent + self.failed)
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} sent, {} failed)", self.message, self.sent, self.failed)
    }
}
