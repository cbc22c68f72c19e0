//! Campaign, contact, group and template records.
//!
//! These are owned by the authoring system; the engine only reads them. They
//! deserialize from the same JSON shape the CLI fixtures use.

use serde::{Deserialize, Serialize};

use crate::address::{Address, ToAddress};
use crate::error::CampaignError;

pub type CampaignId = u64;
pub type ContactId = u64;
pub type GroupId = u64;

/// How messages for the To role are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// One message, primary recipients hidden in BCC.
    #[default]
    Shared,
    /// One message per primary recipient, with placeholder substitution.
    Personalized,
}

/// A recipient role on an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    To,
    Cc,
    Bcc,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
        }
    }
}

/// An individual recipient in the contact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Contact {
    pub fn new(id: ContactId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: None,
            last_name: None,
            active: true,
        }
    }

    pub fn first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    pub fn last_name(mut self, name: impl Into<String>) -> Self {
        self.last_name = Some(name.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// First and last name joined by a single space, trimmed.
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }

    /// The contact's address, carrying the full name when there is one.
    pub fn address(&self) -> Address {
        let name = self.full_name();
        if name.is_empty() {
            Address::new(&self.email)
        } else {
            Address::with_name(name, &self.email)
        }
    }
}

impl ToAddress for Contact {
    fn to_address(&self) -> Address {
        self.address()
    }
}

/// A named list of contacts. Membership is read at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<ContactId>,
}

impl ContactGroup {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, contact: ContactId) -> Self {
        self.members.push(contact);
        self
    }
}

/// Reusable message content a campaign can be started from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub subject: String,
    pub html_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// The directory-backed recipient sources for one role.
///
/// `contacts` holds ad-hoc picks and is only used for To. Manual CC and BCC
/// lists live on the campaign itself.
#[derive(Debug, Clone, Copy)]
pub struct RoleSources<'a> {
    pub role: Role,
    pub groups: &'a [GroupId],
    pub contacts: &'a [ContactId],
}

/// A message plus its recipient selection.
///
/// Built with the same chained style as [`Email`](crate::Email):
///
/// ```
/// use mailshot::{Campaign, SendMode};
///
/// let campaign = Campaign::new(1, "Launch")
///     .subject("We're live, {{first_name}}!")
///     .html_body("<p>Hello {{full_name}}</p>")
///     .to_group(10)
///     .cc("boss@example.com, press@example.com")
///     .mode(SendMode::Personalized);
///
/// assert_eq!(campaign.to_groups, vec![10]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Comma-separated manual CC addresses.
    pub cc: String,
    /// Comma-separated manual BCC addresses.
    pub bcc: String,
    pub to_groups: Vec<GroupId>,
    pub cc_groups: Vec<GroupId>,
    pub bcc_groups: Vec<GroupId>,
    /// Ad-hoc contacts for the To role.
    pub contacts: Vec<ContactId>,
    pub mode: SendMode,
}

impl Campaign {
    pub fn new(id: CampaignId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Start a campaign from a template's content.
    pub fn from_template(
        id: CampaignId,
        name: impl Into<String>,
        template: &Template,
    ) -> Result<Self, CampaignError> {
        if !template.active {
            return Err(CampaignError::Template(format!(
                "template '{}' is inactive",
                template.name
            )));
        }
        Ok(Self {
            subject: template.subject.clone(),
            html_body: template.html_body.clone(),
            text_body: template.text_body.clone(),
            ..Self::new(id, name)
        })
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = body.into();
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    pub fn reply_to(mut self, addr: impl Into<String>) -> Self {
        self.reply_to = Some(addr.into());
        self
    }

    pub fn cc(mut self, list: impl Into<String>) -> Self {
        self.cc = list.into();
        self
    }

    pub fn bcc(mut self, list: impl Into<String>) -> Self {
        self.bcc = list.into();
        self
    }

    pub fn to_group(mut self, group: GroupId) -> Self {
        self.to_groups.push(group);
        self
    }

    pub fn cc_group(mut self, group: GroupId) -> Self {
        self.cc_groups.push(group);
        self
    }

    pub fn bcc_group(mut self, group: GroupId) -> Self {
        self.bcc_groups.push(group);
        self
    }

    pub fn contact(mut self, contact: ContactId) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn mode(mut self, mode: SendMode) -> Self {
        self.mode = mode;
        self
    }

    /// Recipient sources for `role`.
    pub fn sources(&self, role: Role) -> RoleSources<'_> {
        match role {
            Role::To => RoleSources {
                role,
                groups: &self.to_groups,
                contacts: &self.contacts,
            },
            Role::Cc => RoleSources {
                role,
                groups: &self.cc_groups,
                contacts: &[],
            },
            Role::Bcc => RoleSources {
                role,
                groups: &self.bcc_groups,
                contacts: &[],
            },
        }
    }
}
