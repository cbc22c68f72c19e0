//! Engine and transport configuration.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_PROVIDER` | `smtp`, `local`, `logger`, `logger_full` |
//! | `EMAIL_FROM` | Sender address (required) |
//! | `EMAIL_FROM_NAME` | Sender display name |
//! | `EMAIL_REPLY_TO` | Reply-to used when a campaign sets none |
//! | `MAILSHOT_MAX_IN_FLIGHT` | Concurrent sends in personalized mode (default: 1) |
//! | `SMTP_HOST` | SMTP server host |
//! | `SMTP_PORT` | SMTP server port (default: 587) |
//! | `SMTP_USERNAME` | SMTP username |
//! | `SMTP_PASSWORD` | SMTP password |

use std::env;
use std::sync::Arc;

use crate::address::{Address, ToAddress};
use crate::error::{CampaignError, MailError};
use crate::mailer::Connector;
use crate::providers;

/// Settings shared by every run of an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sender of every outbound message.
    pub sender: Address,
    /// Reply-to for campaigns that do not set their own.
    pub default_reply_to: Option<Address>,
    /// Concurrent transport calls in personalized mode.
    pub max_in_flight: usize,
}

impl EngineConfig {
    pub fn new(sender: impl ToAddress) -> Self {
        Self {
            sender: sender.to_address(),
            default_reply_to: None,
            max_in_flight: 1,
        }
    }

    pub fn default_reply_to(mut self, addr: impl ToAddress) -> Self {
        self.default_reply_to = Some(addr.to_address());
        self
    }

    /// `0` is treated as `1`.
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    /// Read `EMAIL_FROM`, `EMAIL_FROM_NAME`, `EMAIL_REPLY_TO` and `MAILSHOT_MAX_IN_FLIGHT`.
    pub fn from_env() -> Result<Self, CampaignError> {
        let email = env::var("EMAIL_FROM")
            .map_err(|_| CampaignError::Configuration("EMAIL_FROM not set".into()))?;
        let sender = match env::var("EMAIL_FROM_NAME") {
            Ok(name) if !name.trim().is_empty() => Address::parse_with_name(&name, &email),
            _ => Address::parse(&email),
        }
        .map_err(|_| CampaignError::Configuration(format!("EMAIL_FROM is not a valid address: {}", email)))?;

        let mut config = Self::new(sender);

        if let Ok(reply_to) = env::var("EMAIL_REPLY_TO") {
            let addr = Address::parse(reply_to.trim()).map_err(|_| {
                CampaignError::Configuration(format!("EMAIL_REPLY_TO is not a valid address: {}", reply_to))
            })?;
            config = config.default_reply_to(addr);
        }

        if let Ok(max) = env::var("MAILSHOT_MAX_IN_FLIGHT") {
            let max: usize = max.trim().parse().map_err(|_| {
                CampaignError::Configuration(format!("MAILSHOT_MAX_IN_FLIGHT must be a number, got '{}'", max))
            })?;
            config = config.max_in_flight(max);
        }

        Ok(config)
    }
}

/// Build a connector from `EMAIL_PROVIDER`.
///
/// Defaults to `local` when the feature is enabled and `EMAIL_PROVIDER` is
/// unset, `smtp` when `SMTP_HOST` is set.
pub fn mailer_from_env() -> Result<Arc<dyn Connector>, MailError> {
    let provider = match env::var("EMAIL_PROVIDER") {
        Ok(p) => p.to_lowercase(),
        Err(_) => match detect_provider() {
            Some(p) => {
                tracing::debug!(provider = p, "Auto-detected email provider");
                p.to_string()
            }
            None => {
                return Err(MailError::Configuration(
                    "EMAIL_PROVIDER not set and could not auto-detect. \
                    Set EMAIL_PROVIDER or SMTP_HOST."
                        .into(),
                ));
            }
        },
    };

    match provider.as_str() {
        #[cfg(feature = "smtp")]
        "smtp" => {
            let host = env::var("SMTP_HOST")
                .map_err(|_| MailError::Configuration("SMTP_HOST not set".into()))?;
            let port: u16 = match env::var("SMTP_PORT") {
                Ok(p) => p
                    .parse()
                    .map_err(|_| MailError::Configuration(format!("SMTP_PORT is not a port: {}", p)))?,
                Err(_) => 587,
            };
            let username = env::var("SMTP_USERNAME").unwrap_or_default();
            let password = env::var("SMTP_PASSWORD").unwrap_or_default();

            let builder = if username.is_empty() {
                providers::SmtpMailer::new(&host, port)
            } else {
                providers::SmtpMailer::new(&host, port).credentials(&username, &password)
            };
            Ok(Arc::new(builder))
        }
        #[cfg(not(feature = "smtp"))]
        "smtp" => Err(MailError::Configuration(
            "EMAIL_PROVIDER=smtp but 'smtp' feature is not enabled. \
            Add `features = [\"smtp\"]` to Cargo.toml"
                .into(),
        )),

        #[cfg(feature = "local")]
        "local" => Ok(Arc::new(providers::LocalMailer::new())),
        #[cfg(not(feature = "local"))]
        "local" => Err(MailError::Configuration(
            "EMAIL_PROVIDER=local but 'local' feature is not enabled. \
            Add `features = [\"local\"]` to Cargo.toml"
                .into(),
        )),

        "logger" => Ok(Arc::new(providers::LoggerMailer::new())),
        "logger_full" => Ok(Arc::new(providers::LoggerMailer::full())),

        _ => Err(MailError::Configuration(format!(
            "Unknown EMAIL_PROVIDER: {}. Valid providers are: smtp, local, logger, logger_full",
            provider
        ))),
    }
}

fn detect_provider() -> Option<&'static str> {
    #[cfg(feature = "smtp")]
    if env::var("SMTP_HOST").is_ok() {
        return Some("smtp");
    }
    #[cfg(feature = "local")]
    {
        return Some("local");
    }
    #[allow(unreachable_code)]
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = EngineConfig::new(("News", "news@example.com"))
            .default_reply_to("replies@example.com")
            .max_in_flight(0);

        assert_eq!(config.sender.formatted(), "News <news@example.com>");
        assert_eq!(config.default_reply_to.unwrap().email, "replies@example.com");
        assert_eq!(config.max_in_flight, 1);
    }

    // Environment-driven cases share process state, so they run in one test.
    #[test]
    fn test_from_env() {
        env::remove_var("EMAIL_FROM");
        assert!(matches!(
            EngineConfig::from_env(),
            Err(CampaignError::Configuration(_))
        ));

        env::set_var("EMAIL_FROM", "news@example.com");
        env::set_var("EMAIL_FROM_NAME", "Newsroom");
        env::set_var("MAILSHOT_MAX_IN_FLIGHT", "4");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.sender.formatted(), "Newsroom <news@example.com>");
        assert_eq!(config.max_in_flight, 4);
        assert!(config.default_reply_to.is_none());

        env::set_var("MAILSHOT_MAX_IN_FLIGHT", "many");
        assert!(EngineConfig::from_env().is_err());

        env::set_var("EMAIL_PROVIDER", "carrier_pigeon");
        assert!(matches!(mailer_from_env(), Err(MailError::Configuration(_))));

        env::set_var("EMAIL_PROVIDER", "logger");
        assert_eq!(mailer_from_env().unwrap().provider_name(), "logger");

        for var in ["EMAIL_FROM", "EMAIL_FROM_NAME", "MAILSHOT_MAX_IN_FLIGHT", "EMAIL_PROVIDER"] {
            env::remove_var(var);
        }
    }
}
