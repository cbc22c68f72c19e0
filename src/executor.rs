//! Runs the transport calls for one campaign run and records their outcomes.
//!
//! Every message gets its own handle from the [`Connector`], and its outcome
//! is written as soon as the call returns. Personalized runs go through a
//! bounded pool of `max_in_flight` concurrent calls.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::address_set::Recipient;
use crate::campaign::Campaign;
use crate::dispatch::{DeliveryMode, Frame};
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{Connector, DeliveryResult};
use crate::outcome::{DeliveryOutcome, OutcomeStore, RunResult};
use crate::personalize::RenderedContent;
use crate::resolver::Recipients;

/// Stops a personalized run from scheduling further sends.
///
/// Calls already in flight finish and are recorded; recipients not yet
/// reached are recorded as failed.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Identity of one run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    sent: usize,
    failed: usize,
    recorded: usize,
    cancelled: usize,
}

impl Tally {
    fn add(&mut self, step: Step) {
        match step.status {
            StepStatus::Sent => self.sent += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Cancelled => {
                self.failed += 1;
                self.cancelled += 1;
            }
        }
        if step.recorded {
            self.recorded += 1;
        }
    }
}

enum StepStatus {
    Sent,
    Failed,
    Cancelled,
}

struct Step {
    status: StepStatus,
    recorded: bool,
}

/// Executes one run against a connector and an outcome store.
pub struct Executor<'a> {
    connector: &'a dyn Connector,
    outcomes: &'a dyn OutcomeStore,
    max_in_flight: usize,
    cancel: CancelHandle,
}

impl<'a> Executor<'a> {
    pub fn new(connector: &'a dyn Connector, outcomes: &'a dyn OutcomeStore) -> Self {
        Self {
            connector,
            outcomes,
            max_in_flight: 1,
            cancel: CancelHandle::new(),
        }
    }

    /// Cap on concurrent transport calls in personalized mode. `0` is treated as `1`.
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    pub fn cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send `campaign` to `recipients` using `mode`.
    pub async fn execute(
        &self,
        run: RunContext,
        campaign: &Campaign,
        mode: DeliveryMode,
        frame: &Frame,
        recipients: &Recipients,
    ) -> RunResult {
        let (success, message, tally) = match mode {
            DeliveryMode::Shared => self.shared(run, campaign, frame, recipients).await,
            DeliveryMode::CcBccOnly => self.cc_bcc_only(campaign, frame, recipients).await,
            DeliveryMode::Personalized => self.personalized(run, campaign, frame, recipients).await,
        };

        RunResult {
            run_id: run.run_id,
            campaign_id: campaign.id,
            mode,
            success,
            message,
            sent: tally.sent,
            failed: tally.failed,
            outcomes: tally.recorded,
            started_at: run.started_at,
            completed_at: Utc::now(),
        }
    }

    async fn shared(
        &self,
        run: RunContext,
        campaign: &Campaign,
        frame: &Frame,
        recipients: &Recipients,
    ) -> (bool, String, Tally) {
        let content = RenderedContent::verbatim(campaign);
        let email = frame.shared(&recipients.to.addresses(), &content);
        let result = self.send(&email, DeliveryMode::Shared).await;

        // One call; every primary recipient shares its outcome.
        let mut tally = Tally::default();
        for recipient in recipients.to.iter() {
            let step = self.record_result(run, campaign, recipient, &result).await;
            tally.add(step);
        }

        match result {
            Ok(_) => (true, format!("Sent to {} recipients", recipients.to.len()), tally),
            Err(e) => (false, format!("Delivery failed: {}", e), tally),
        }
    }

    async fn cc_bcc_only(
        &self,
        campaign: &Campaign,
        frame: &Frame,
        recipients: &Recipients,
    ) -> (bool, String, Tally) {
        let content = RenderedContent::verbatim(campaign);
        let email = frame.cc_bcc_only(&content);
        let copies = recipients.cc.len() + recipients.bcc.len();

        // No primary recipients, so nothing is recorded or counted.
        match self.send(&email, DeliveryMode::CcBccOnly).await {
            Ok(_) => (
                true,
                format!("Sent to {} CC/BCC recipients", copies),
                Tally::default(),
            ),
            Err(e) => (false, format!("Delivery failed: {}", e), Tally::default()),
        }
    }

    async fn personalized(
        &self,
        run: RunContext,
        campaign: &Campaign,
        frame: &Frame,
        recipients: &Recipients,
    ) -> (bool, String, Tally) {
        let tally = stream::iter(recipients.to.iter())
            .map(|recipient| self.personalized_step(run, campaign, frame, recipient))
            .buffer_unordered(self.max_in_flight)
            .fold(Tally::default(), |mut tally, step| async move {
                tally.add(step);
                tally
            })
            .await;

        let total = recipients.to.len();
        let mut message = format!("Sent to {} of {} recipients", tally.sent, total);
        if tally.cancelled > 0 {
            message.push_str(&format!(", {} cancelled before send", tally.cancelled));
        }
        (tally.sent > 0, message, tally)
    }

    async fn personalized_step(
        &self,
        run: RunContext,
        campaign: &Campaign,
        frame: &Frame,
        recipient: &Recipient,
    ) -> Step {
        let contact_id = recipient.contact.as_ref().map(|c| c.id);

        if self.cancel.is_cancelled() {
            let outcome =
                DeliveryOutcome::cancelled(campaign.id, run.run_id, contact_id, recipient.email());
            let recorded = self.record(outcome).await;
            return Step {
                status: StepStatus::Cancelled,
                recorded,
            };
        }

        let content = match &recipient.contact {
            Some(contact) => RenderedContent::for_contact(campaign, contact),
            None => RenderedContent::verbatim(campaign),
        };
        let email = frame.personalized(&recipient.address, &content);
        let result = self.send(&email, DeliveryMode::Personalized).await;
        self.record_result(run, campaign, recipient, &result).await
    }

    /// Connect and deliver one message.
    async fn send(&self, email: &Email, mode: DeliveryMode) -> Result<DeliveryResult, MailError> {
        tracing::debug!(
            mode = mode.as_str(),
            to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
            subject = %email.subject,
            "Delivering message"
        );

        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let result = match self.connector.connect() {
            Ok(mailer) => mailer.deliver(email).await,
            Err(e) => Err(e),
        };

        #[cfg(feature = "metrics")]
        {
            let status = if result.is_ok() { "success" } else { "error" };
            metrics::counter!("mailshot_messages_total", "mode" => mode.as_str(), "status" => status)
                .increment(1);
            metrics::histogram!("mailshot_message_duration_seconds", "mode" => mode.as_str())
                .record(start.elapsed().as_secs_f64());
        }

        match &result {
            Ok(r) => tracing::debug!(message_id = %r.message_id, "Message delivered"),
            Err(e) => tracing::warn!(error = %e, kind = %e.category(), "Message delivery failed"),
        }

        result
    }

    async fn record_result(
        &self,
        run: RunContext,
        campaign: &Campaign,
        recipient: &Recipient,
        result: &Result<DeliveryResult, MailError>,
    ) -> Step {
        let contact_id = recipient.contact.as_ref().map(|c| c.id);
        let (outcome, status) = match result {
            Ok(r) => (
                DeliveryOutcome::sent(campaign.id, run.run_id, contact_id, recipient.email(), &r.message_id),
                StepStatus::Sent,
            ),
            Err(e) => (
                DeliveryOutcome::failed(campaign.id, run.run_id, contact_id, recipient.email(), e),
                StepStatus::Failed,
            ),
        };
        let recorded = self.record(outcome).await;
        Step { status, recorded }
    }

    /// Write an outcome. A store failure is logged; the send it describes already happened.
    async fn record(&self, outcome: DeliveryOutcome) -> bool {
        #[cfg(feature = "metrics")]
        let status = outcome.status.as_str();

        let email = outcome.email.clone();
        match self.outcomes.record(outcome).await {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                metrics::counter!("mailshot_outcomes_total", "status" => status).increment(1);
                true
            }
            Err(e) => {
                tracing::error!(recipient = %email, error = %e, "Failed to record delivery outcome");
                false
            }
        }
    }
}

#[cfg(all(test, feature = "local"))]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::address_set::AddressSet;
    use crate::campaign::Contact;
    use crate::outcome::{DeliveryStatus, MemoryOutcomeStore};
    use crate::providers::LocalMailer;

    fn recipients(contacts: &[Contact]) -> Recipients {
        Recipients {
            to: contacts.iter().map(Recipient::from).collect::<AddressSet>(),
            ..Recipients::default()
        }
    }

    fn contacts() -> Vec<Contact> {
        vec![
            Contact::new(1, "ana@example.com").first_name("Ana"),
            Contact::new(2, "bo@example.com").first_name("Bo"),
            Contact::new(3, "cy@example.com").first_name("Cy"),
        ]
    }

    fn campaign() -> Campaign {
        Campaign::new(9, "c").subject("Hi {{first_name}}").html_body("<p>{{email}}</p>")
    }

    #[tokio::test]
    async fn test_personalized_records_each_outcome() {
        let mailer = LocalMailer::new();
        mailer.reject_recipient("bo@example.com", "550 mailbox unavailable");
        let store = MemoryOutcomeStore::new();
        let recipients = recipients(&contacts());
        let frame = Frame::new(Address::new("news@example.com"), None, &recipients);

        let result = Executor::new(&mailer, &store)
            .execute(RunContext::start(), &campaign(), DeliveryMode::Personalized, &frame, &recipients)
            .await;

        assert!(result.success);
        assert_eq!((result.sent, result.failed, result.outcomes), (2, 1, 3));
        assert_eq!(mailer.email_count(), 2);
        assert!(mailer.emails().iter().any(|s| s.email.subject == "Hi Ana"));

        let failed: Vec<_> = store
            .all()
            .into_iter()
            .filter(|o| o.status == DeliveryStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].contact_id, Some(2));
    }

    #[tokio::test]
    async fn test_shared_failure_marks_every_recipient() {
        let mailer = LocalMailer::new();
        mailer.set_failure("relay down");
        let store = MemoryOutcomeStore::new();
        let recipients = recipients(&contacts());
        let frame = Frame::new(Address::new("news@example.com"), None, &recipients);

        let result = Executor::new(&mailer, &store)
            .execute(RunContext::start(), &campaign(), DeliveryMode::Shared, &frame, &recipients)
            .await;

        assert!(!result.success);
        assert_eq!((result.sent, result.failed), (0, 3));
        assert_eq!(mailer.delivery_attempts(), 1);
        assert!(store.all().iter().all(|o| o.error.as_deref() == Some("Send error: relay down")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mailer = LocalMailer::new();
        let store = MemoryOutcomeStore::new();
        let recipients = recipients(&contacts());
        let frame = Frame::new(Address::new("news@example.com"), None, &recipients);
        let cancel = CancelHandle::new();
        cancel.cancel();

        let result = Executor::new(&mailer, &store)
            .cancel_handle(cancel)
            .execute(RunContext::start(), &campaign(), DeliveryMode::Personalized, &frame, &recipients)
            .await;

        assert!(!result.success);
        assert_eq!(result.failed, 3);
        assert_eq!(mailer.connection_count(), 0);
        assert!(store
            .all()
            .iter()
            .all(|o| o.error.as_deref() == Some(crate::outcome::CANCELLED_DETAIL)));
    }

    #[test]
    fn test_zero_in_flight_is_one() {
        let mailer = LocalMailer::new();
        let store = MemoryOutcomeStore::new();
        assert_eq!(Executor::new(&mailer, &store).max_in_flight(0).max_in_flight, 1);
    }
}
