//! Error types for mailshot.
//!
//! Two layers: [`MailError`] is what a single transport call can fail with,
//! and is recorded against one recipient. [`CampaignError`] aborts a whole
//! run before any message leaves the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The transport is missing settings or the feature is not compiled in.
    Configuration,
    /// The relay refused our credentials.
    Authentication,
    /// Could not reach the relay (refused, timeout, TLS).
    Connection,
    /// The relay accepted the connection but rejected the recipient or message.
    RecipientRejected,
    /// The message could not be built (bad header value, bad address).
    InvalidMessage,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Authentication => "authentication",
            Self::Connection => "connection",
            Self::RecipientRejected => "recipient_rejected",
            Self::InvalidMessage => "invalid_message",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when handing one message to a transport.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Email transport is not configured.
    #[error("Email provider not configured")]
    NotConfigured,

    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Error building the email message.
    #[error("Build error: {0}")]
    BuildError(String),

    /// The relay could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The relay refused authentication.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The relay rejected a specific recipient.
    #[error("Recipient rejected ({recipient}): {message}")]
    RecipientRejected { recipient: String, message: String },

    /// The relay permanently rejected the message without naming a recipient.
    #[error("Message rejected: {0}")]
    MessageRejected(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    SendError(String),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MailError {
    /// Create a recipient rejection.
    pub fn rejected(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecipientRejected {
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    /// Category of this failure, as recorded on delivery outcomes.
    pub fn category(&self) -> TransportErrorKind {
        match self {
            Self::NotConfigured | Self::Configuration(_) => TransportErrorKind::Configuration,
            Self::MissingField(_) | Self::InvalidAddress(_) | Self::BuildError(_) => {
                TransportErrorKind::InvalidMessage
            }
            Self::Connection(_) => TransportErrorKind::Connection,
            Self::Authentication(_) => TransportErrorKind::Authentication,
            Self::RecipientRejected { .. } | Self::MessageRejected(_) => {
                TransportErrorKind::RecipientRejected
            }
            Self::SendError(_) | Self::Internal(_) => TransportErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::BuildError(err.to_string())
    }
}

/// The parts of an SMTP failure that decide its category.
#[cfg(any(feature = "smtp", test))]
#[derive(Debug, Clone, Copy, Default)]
struct SmtpFailure<'a> {
    /// Reply code, when the relay answered.
    code: Option<&'a str>,
    /// Timed out or failed the TLS handshake.
    unreachable: bool,
    /// 5xx reply.
    permanent: bool,
    /// 4xx reply, or any other unexpected reply.
    transient: bool,
}

#[cfg(any(feature = "smtp", test))]
impl SmtpFailure<'_> {
    fn classify(self, detail: String) -> MailError {
        match self.code {
            Some("530") | Some("534") | Some("535") => MailError::Authentication(detail),
            _ if self.unreachable => MailError::Connection(detail),
            _ if self.permanent => MailError::MessageRejected(detail),
            _ if self.transient => MailError::SendError(detail),
            _ => MailError::Connection(detail),
        }
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        let code = err.status().map(|c| c.to_string());
        SmtpFailure {
            code: code.as_deref(),
            unreachable: err.is_timeout() || err.is_tls(),
            permanent: err.is_permanent(),
            transient: err.is_transient() || err.is_response(),
        }
        .classify(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

/// Errors that abort a campaign run before any outcome is written.
#[derive(Debug, Clone, Error)]
pub enum CampaignError {
    /// A manually entered address (CC, BCC, reply-to) is malformed.
    #[error("Invalid {field} address: '{address}'")]
    InvalidAddress { field: &'static str, address: String },

    /// To, CC and BCC all resolved to nothing.
    #[error("No recipients found")]
    NoRecipients,

    /// The campaign id is unknown to the directory.
    #[error("Campaign not found: {0}")]
    CampaignNotFound(u64),

    /// A template was inactive or otherwise unusable.
    #[error("Template error: {0}")]
    Template(String),

    /// The contact/campaign store could not be read.
    #[error("Directory error: {0}")]
    Store(String),

    /// Engine configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CampaignError {
    /// True for errors caused by the campaign's own content rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. } | Self::NoRecipients | Self::Template(_)
        )
    }
}

impl From<serde_json::Error> for CampaignError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            MailError::Connection("refused".into()).category(),
            TransportErrorKind::Connection
        );
        assert_eq!(
            MailError::rejected("a@example.com", "550 no such user").category(),
            TransportErrorKind::RecipientRejected
        );
        assert_eq!(
            MailError::InvalidAddress("x".into()).category(),
            TransportErrorKind::InvalidMessage
        );
        assert_eq!(MailError::NotConfigured.category(), TransportErrorKind::Configuration);
    }

    #[test]
    fn test_rejected_display() {
        let err = MailError::rejected("a@example.com", "550 mailbox unavailable");
        assert_eq!(
            err.to_string(),
            "Recipient rejected (a@example.com): 550 mailbox unavailable"
        );
    }

    #[test]
    fn test_smtp_auth_codes_are_authentication() {
        for code in ["530", "534", "535"] {
            let err = SmtpFailure {
                code: Some(code),
                permanent: true,
                ..Default::default()
            }
            .classify(format!("{code} 5.7.8 bad credentials"));
            assert!(matches!(err, MailError::Authentication(_)));
            assert_eq!(err.category(), TransportErrorKind::Authentication);
        }
    }

    #[test]
    fn test_smtp_permanent_is_message_rejected() {
        let err = SmtpFailure {
            code: Some("554"),
            permanent: true,
            ..Default::default()
        }
        .classify("554 5.7.1 message refused".into());

        assert!(matches!(err, MailError::MessageRejected(_)));
        assert_eq!(err.category(), TransportErrorKind::RecipientRejected);
        assert_eq!(err.to_string(), "Message rejected: 554 5.7.1 message refused");
        assert!(!err.to_string().contains("()"));
    }

    #[test]
    fn test_smtp_transient_is_send_error() {
        let err = SmtpFailure {
            code: Some("451"),
            transient: true,
            ..Default::default()
        }
        .classify("451 try again later".into());
        assert!(matches!(err, MailError::SendError(_)));
        assert_eq!(err.category(), TransportErrorKind::Other);
    }

    #[test]
    fn test_smtp_timeout_is_connection() {
        let err = SmtpFailure {
            unreachable: true,
            ..Default::default()
        }
        .classify("timed out".into());
        assert_eq!(err.category(), TransportErrorKind::Connection);

        // No reply at all (refused, dropped)
        let err = SmtpFailure::default().classify("connection refused".into());
        assert!(matches!(err, MailError::Connection(_)));
    }

    #[test]
    fn test_is_validation() {
        assert!(CampaignError::NoRecipients.is_validation());
        assert!(CampaignError::InvalidAddress {
            field: "cc",
            address: "nope".into()
        }
        .is_validation());
        assert!(!CampaignError::Store("down".into()).is_validation());
        assert!(!CampaignError::CampaignNotFound(7).is_validation());
    }
}
