//! The campaign delivery engine.

use std::sync::Arc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::address::Address;
use crate::campaign::{Campaign, CampaignId, SendMode};
use crate::config::EngineConfig;
use crate::directory::Directory;
use crate::dispatch::{DeliveryMode, Frame};
use crate::email::Email;
use crate::error::{CampaignError, MailError};
use crate::executor::{CancelHandle, Executor, RunContext};
use crate::mailer::{Connector, DeliveryResult};
use crate::outcome::{OutcomeStore, RunResult};
use crate::resolver;

/// Resolves, dispatches and records campaign runs.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use mailshot::{Engine, EngineConfig, MemoryDirectory, MemoryOutcomeStore};
/// use mailshot::providers::LocalMailer;
///
/// let engine = Engine::new(
///     EngineConfig::new("news@example.com").max_in_flight(4),
///     Arc::new(MemoryDirectory::from_path("campaigns.json")?),
///     Arc::new(LocalMailer::new()),
///     Arc::new(MemoryOutcomeStore::new()),
/// );
///
/// let result = engine.run_campaign(7, true).await?;
/// println!("{} sent, {} failed", result.sent, result.failed);
/// ```
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    directory: Arc<dyn Directory>,
    connector: Arc<dyn Connector>,
    outcomes: Arc<dyn OutcomeStore>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        directory: Arc<dyn Directory>,
        connector: Arc<dyn Connector>,
        outcomes: Arc<dyn OutcomeStore>,
    ) -> Self {
        Self {
            config,
            directory,
            connector,
            outcomes,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a campaign and run it. `personalize` selects one message per
    /// primary recipient; otherwise a single shared message is sent.
    pub async fn run_campaign(
        &self,
        campaign_id: CampaignId,
        personalize: bool,
    ) -> Result<RunResult, CampaignError> {
        self.run_campaign_with(campaign_id, personalize, CancelHandle::new())
            .await
    }

    /// [`run_campaign`](Self::run_campaign) with a handle the caller can cancel.
    pub async fn run_campaign_with(
        &self,
        campaign_id: CampaignId,
        personalize: bool,
        cancel: CancelHandle,
    ) -> Result<RunResult, CampaignError> {
        let mut campaign = self.directory.campaign(campaign_id).await?;
        campaign.mode = if personalize {
            SendMode::Personalized
        } else {
            SendMode::Shared
        };
        self.dispatch_with(&campaign, cancel).await
    }

    /// Run an already loaded campaign using its own send mode.
    pub async fn dispatch(&self, campaign: &Campaign) -> Result<RunResult, CampaignError> {
        self.dispatch_with(campaign, CancelHandle::new()).await
    }

    pub async fn dispatch_with(
        &self,
        campaign: &Campaign,
        cancel: CancelHandle,
    ) -> Result<RunResult, CampaignError> {
        let run = RunContext::start();
        let span = tracing::info_span!(
            "mailshot.run",
            campaign_id = campaign.id,
            run_id = %run.run_id,
            mode = tracing::field::Empty,
        );

        async {
            let result = self.run(run, campaign, cancel).await;
            if let Err(ref e) = result {
                if e.is_validation() {
                    tracing::warn!(error = %e, "Campaign rejected");
                } else {
                    tracing::error!(error = %e, "Campaign run aborted");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        run: RunContext,
        campaign: &Campaign,
        cancel: CancelHandle,
    ) -> Result<RunResult, CampaignError> {
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let reply_to = resolver::parse_reply_to(campaign)?.or_else(|| self.config.default_reply_to.clone());
        let recipients = resolver::resolve(campaign, &*self.directory).await?;
        let mode = DeliveryMode::select(&recipients, campaign.mode)?;
        tracing::Span::current().record("mode", mode.as_str());

        tracing::info!(
            to = recipients.to.len(),
            cc = recipients.cc.len(),
            bcc = recipients.bcc.len(),
            "Starting campaign run"
        );

        let frame = Frame::new(self.config.sender.clone(), reply_to, &recipients);
        let result = Executor::new(&*self.connector, &*self.outcomes)
            .max_in_flight(self.config.max_in_flight)
            .cancel_handle(cancel)
            .execute(run, campaign, mode, &frame, &recipients)
            .await;

        #[cfg(feature = "metrics")]
        metrics::histogram!("mailshot_run_duration_seconds", "mode" => mode.as_str())
            .record(start.elapsed().as_secs_f64());

        if result.success {
            tracing::info!(sent = result.sent, failed = result.failed, "Campaign run finished");
        } else {
            tracing::error!(sent = result.sent, failed = result.failed, message = %result.message, "Campaign run failed");
        }

        Ok(result)
    }

    /// Send a one-off diagnostic message to check transport settings.
    pub async fn send_test_email(&self, to: &str) -> Result<DeliveryResult, MailError> {
        let to = Address::parse(to.trim())?;
        let email = Email::new()
            .from(&self.config.sender)
            .to(to)
            .subject("mailshot test message")
            .text_body("This is a test message. If you received it, your mail transport is configured correctly.")
            .html_body(
                "<p>This is a test message.</p>\
                 <p>If you received it, your mail transport is configured correctly.</p>",
            );

        let span = tracing::info_span!("mailshot.test_email", provider = Connector::provider_name(&*self.connector));
        async {
            let result = match self.connector.connect() {
                Ok(mailer) => mailer.deliver(&email).await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(r) => tracing::info!(message_id = %r.message_id, "Test message delivered"),
                Err(e) => tracing::error!(error = %e, "Test message failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(all(test, feature = "local"))]
mod tests {
    use super::*;
    use crate::campaign::{Contact, ContactGroup};
    use crate::directory::MemoryDirectory;
    use crate::outcome::MemoryOutcomeStore;
    use crate::providers::LocalMailer;

    fn setup() -> (Engine, LocalMailer, Arc<MemoryDirectory>, Arc<MemoryOutcomeStore>) {
        let directory = Arc::new(MemoryDirectory::new());
        directory.insert_contact(Contact::new(1, "ana@example.com").first_name("Ana"));
        directory.insert_contact(Contact::new(2, "bo@example.com").first_name("Bo"));
        directory.insert_group(ContactGroup::new(10, "All").member(1).member(2));

        let mailer = LocalMailer::new();
        let outcomes = Arc::new(MemoryOutcomeStore::new());
        let engine = Engine::new(
            EngineConfig::new("news@example.com").default_reply_to("replies@example.com"),
            directory.clone(),
            Arc::new(mailer.clone()),
            outcomes.clone(),
        );
        (engine, mailer, directory, outcomes)
    }

    #[tokio::test]
    async fn test_personalize_flag_overrides_campaign_mode() {
        let (engine, mailer, directory, _) = setup();
        directory.insert_campaign(Campaign::new(5, "c").subject("Hi").to_group(10));

        let result = engine.run_campaign(5, true).await.unwrap();
        assert_eq!(result.mode, DeliveryMode::Personalized);
        assert_eq!(mailer.email_count(), 2);

        mailer.flush();
        let result = engine.run_campaign(5, false).await.unwrap();
        assert_eq!(result.mode, DeliveryMode::Shared);
        assert_eq!(mailer.email_count(), 1);
    }

    #[tokio::test]
    async fn test_default_reply_to_applies() {
        let (engine, mailer, directory, _) = setup();
        directory.insert_campaign(Campaign::new(5, "c").subject("Hi").to_group(10));
        engine.run_campaign(5, false).await.unwrap();

        let email = mailer.last_email().unwrap().email;
        assert_eq!(email.reply_to.unwrap().email, "replies@example.com");
    }

    #[tokio::test]
    async fn test_invalid_reply_to_rejected() {
        let (engine, mailer, _, outcomes) = setup();
        let campaign = Campaign::new(5, "c").reply_to("nope").to_group(10);

        let err = engine.dispatch(&campaign).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(mailer.delivery_attempts(), 0);
        assert_eq!(outcomes.count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_campaign() {
        let (engine, _, _, _) = setup();
        assert!(matches!(
            engine.run_campaign(404, false).await,
            Err(CampaignError::CampaignNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_send_test_email() {
        let (engine, mailer, _, _) = setup();
        engine.send_test_email("admin@example.com").await.unwrap();
        assert!(mailer.sent_to("admin@example.com"));

        assert!(matches!(
            engine.send_test_email("not an address").await,
            Err(MailError::InvalidAddress(_))
        ));
    }
}
