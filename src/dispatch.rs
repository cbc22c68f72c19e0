//! Delivery mode selection and outbound message framing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::campaign::SendMode;
use crate::email::Email;
use crate::error::CampaignError;
use crate::personalize::RenderedContent;
use crate::resolver::Recipients;

/// How a run reaches its recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One message; primary recipients travel in BCC.
    Shared,
    /// One message per primary recipient.
    Personalized,
    /// No primary recipients; one message to CC/BCC with an empty To.
    CcBccOnly,
}

impl DeliveryMode {
    /// Pick the mode for a resolved run.
    ///
    /// | To        | CC or BCC | Mode                    |
    /// |-----------|-----------|-------------------------|
    /// | non-empty | any       | `send_mode`             |
    /// | empty     | non-empty | `CcBccOnly`             |
    /// | empty     | empty     | `NoRecipients` error    |
    pub fn select(recipients: &Recipients, send_mode: SendMode) -> Result<Self, CampaignError> {
        if recipients.is_empty() {
            return Err(CampaignError::NoRecipients);
        }
        if recipients.to.is_empty() {
            return Ok(Self::CcBccOnly);
        }
        Ok(match send_mode {
            SendMode::Shared => Self::Shared,
            SendMode::Personalized => Self::Personalized,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Personalized => "personalized",
            Self::CcBccOnly => "cc_bcc_only",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts every message of a run shares: sender, reply-to, and the CC and
/// BCC sets, which are attached verbatim to each message.
#[derive(Debug, Clone)]
pub struct Frame {
    pub from: Address,
    pub reply_to: Option<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
}

impl Frame {
    pub fn new(from: Address, reply_to: Option<Address>, recipients: &Recipients) -> Self {
        Self {
            from,
            reply_to,
            cc: recipients.cc.addresses(),
            bcc: recipients.bcc.addresses(),
        }
    }

    fn message(&self, content: &RenderedContent) -> Email {
        let mut email = Email::new()
            .from(&self.from)
            .maybe_reply_to(self.reply_to.as_ref())
            .subject(&content.subject)
            .put_cc(self.cc.clone())
            .put_bcc(self.bcc.clone());
        if !content.html_body.is_empty() {
            email = email.html_body(&content.html_body);
        }
        if !content.text_body.is_empty() {
            email = email.text_body(&content.text_body);
        }
        email
    }

    /// One message for everyone. The visible To is the sender; primary
    /// recipients go ahead of the campaign's own BCC list.
    pub fn shared(&self, to: &[Address], content: &RenderedContent) -> Email {
        let mut email = self.message(content).put_to(vec![self.from.clone()]);
        email.bcc = to.iter().cloned().chain(self.bcc.iter().cloned()).collect();
        email
    }

    /// A message addressed to a single primary recipient.
    pub fn personalized(&self, to: &Address, content: &RenderedContent) -> Email {
        self.message(content).put_to(vec![to.clone()])
    }

    /// A message with an empty To.
    pub fn cc_bcc_only(&self, content: &RenderedContent) -> Email {
        self.message(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_set::{AddressSet, Recipient};
    use crate::campaign::{Campaign, Contact};

    fn set(emails: &[&str]) -> AddressSet {
        emails
            .iter()
            .map(|e| Recipient::manual(Address::new(*e)))
            .collect()
    }

    fn content() -> RenderedContent {
        RenderedContent::verbatim(&Campaign::new(1, "c").subject("Hi").html_body("<p>Hi</p>"))
    }

    #[test]
    fn test_select() {
        let mut recipients = Recipients::default();
        assert!(matches!(
            DeliveryMode::select(&recipients, SendMode::Shared),
            Err(CampaignError::NoRecipients)
        ));

        recipients.bcc = set(&["b@example.com"]);
        assert_eq!(
            DeliveryMode::select(&recipients, SendMode::Personalized).unwrap(),
            DeliveryMode::CcBccOnly
        );

        recipients.to.insert(Recipient::from(&Contact::new(1, "a@example.com")));
        assert_eq!(
            DeliveryMode::select(&recipients, SendMode::Personalized).unwrap(),
            DeliveryMode::Personalized
        );
        assert_eq!(
            DeliveryMode::select(&recipients, SendMode::Shared).unwrap(),
            DeliveryMode::Shared
        );
    }

    #[test]
    fn test_shared_message_hides_primary_recipients() {
        let recipients = Recipients {
            to: set(&["a@example.com", "b@example.com"]),
            cc: set(&["boss@example.com"]),
            bcc: set(&["audit@example.com", "a@example.com"]),
        };
        let frame = Frame::new(Address::new("news@example.com"), None, &recipients);
        let email = frame.shared(&recipients.to.addresses(), &content());

        assert_eq!(email.to, vec![Address::new("news@example.com")]);
        assert_eq!(email.cc, vec![Address::new("boss@example.com")]);
        let bcc: Vec<_> = email.bcc.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(
            bcc,
            vec!["a@example.com", "b@example.com", "audit@example.com", "a@example.com"]
        );
    }

    #[test]
    fn test_personalized_message() {
        let recipients = Recipients {
            cc: set(&["boss@example.com"]),
            ..Recipients::default()
        };
        let frame = Frame::new(
            Address::new("news@example.com"),
            Some(Address::new("replies@example.com")),
            &recipients,
        );
        let email = frame.personalized(&Address::new("ana@example.com"), &content());

        assert_eq!(email.to, vec![Address::new("ana@example.com")]);
        assert_eq!(email.cc.len(), 1);
        assert_eq!(email.reply_to, Some(Address::new("replies@example.com")));
        assert_eq!(email.html_body.as_deref(), Some("<p>Hi</p>"));
        assert_eq!(email.text_body.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_cc_bcc_only_message_has_empty_to() {
        let recipients = Recipients {
            cc: set(&["boss@example.com"]),
            ..Recipients::default()
        };
        let frame = Frame::new(Address::new("news@example.com"), None, &recipients);
        let email = frame.cc_bcc_only(&content());

        assert!(email.to.is_empty());
        assert!(email.from.is_some() && email.has_recipients());
    }

    #[test]
    fn test_empty_bodies_are_omitted() {
        let frame = Frame::new(Address::new("news@example.com"), None, &Recipients::default());
        let content = RenderedContent::verbatim(&Campaign::new(1, "c").subject("Hi"));
        let email = frame.personalized(&Address::new("a@example.com"), &content);
        assert!(email.html_body.is_none());
        assert!(email.text_body.is_none());
    }
}
