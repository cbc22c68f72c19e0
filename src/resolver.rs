//! Recipient resolution.
//!
//! Every role goes through [`resolve_role`]: manual addresses first, then
//! group members, then ad-hoc contacts, deduplicated into one
//! [`AddressSet`]. Roles are resolved independently and never deduplicated
//! against each other; an address may be both To and CC.

use serde::Serialize;

use crate::address::Address;
use crate::address_set::{self, AddressSet, Recipient};
use crate::campaign::{Campaign, Role, RoleSources};
use crate::directory::Directory;
use crate::error::CampaignError;

/// The three resolved roles of a campaign run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recipients {
    pub to: AddressSet,
    pub cc: AddressSet,
    pub bcc: AddressSet,
}

impl Recipients {
    /// True when no role has anyone in it.
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }

    /// Unique primary recipients; the denominator of the delivery rate.
    pub fn total_primary(&self) -> usize {
        self.to.len()
    }
}

/// Parse a manual comma-separated list for `role`.
///
/// The first malformed token is reported; nothing is skipped.
pub fn parse_manual(role: Role, input: &str) -> Result<AddressSet, CampaignError> {
    let mut set = AddressSet::new();
    for token in address_set::tokens(input) {
        let address = Address::parse(token).map_err(|_| CampaignError::InvalidAddress {
            field: role.as_str(),
            address: token.to_string(),
        })?;
        set.insert(Recipient::manual(address));
    }
    Ok(set)
}

/// Validate the campaign's reply-to, if it has one.
pub fn parse_reply_to(campaign: &Campaign) -> Result<Option<Address>, CampaignError> {
    match campaign.reply_to.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(addr) => Address::parse(addr)
            .map(Some)
            .map_err(|_| CampaignError::InvalidAddress {
                field: "reply_to",
                address: addr.to_string(),
            }),
    }
}

/// Resolve To, CC and BCC for a campaign.
///
/// Manual lists are validated before the directory is touched, so a typo
/// fails the run without any store round-trip.
pub async fn resolve<D>(campaign: &Campaign, directory: &D) -> Result<Recipients, CampaignError>
where
    D: Directory + ?Sized,
{
    // To is sourced from groups and contacts only
    let to_manual = AddressSet::new();
    let cc_manual = parse_manual(Role::Cc, &campaign.cc)?;
    let bcc_manual = parse_manual(Role::Bcc, &campaign.bcc)?;

    let recipients = Recipients {
        to: resolve_role(directory, campaign.sources(Role::To), to_manual).await?,
        cc: resolve_role(directory, campaign.sources(Role::Cc), cc_manual).await?,
        bcc: resolve_role(directory, campaign.sources(Role::Bcc), bcc_manual).await?,
    };

    tracing::debug!(
        campaign_id = campaign.id,
        to = recipients.to.len(),
        cc = recipients.cc.len(),
        bcc = recipients.bcc.len(),
        "Resolved recipients"
    );

    Ok(recipients)
}

/// Merge one role's sources into `set`, which already holds its manual addresses.
async fn resolve_role<D>(
    directory: &D,
    sources: RoleSources<'_>,
    mut set: AddressSet,
) -> Result<AddressSet, CampaignError>
where
    D: Directory + ?Sized,
{
    for &group in sources.groups {
        let members = directory.active_members(group).await?;
        set.extend(members.iter().filter(|c| c.active).map(Recipient::from));
    }

    for &id in sources.contacts {
        match directory.contact(id).await? {
            Some(contact) if contact.active => {
                set.insert(Recipient::from(&contact));
            }
            Some(_) => {
                tracing::debug!(contact_id = id, role = sources.role.as_str(), "Skipping inactive contact");
            }
            None => {
                tracing::warn!(contact_id = id, role = sources.role.as_str(), "Campaign references unknown contact");
            }
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{Contact, ContactGroup};
    use crate::directory::MemoryDirectory;

    fn directory() -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        directory.insert_contact(Contact::new(1, "ana@example.com").first_name("Ana"));
        directory.insert_contact(Contact::new(2, "bo@example.com"));
        directory.insert_contact(Contact::new(3, "gone@example.com").inactive());
        directory.insert_contact(Contact::new(4, "cy@example.com"));
        directory.insert_group(ContactGroup::new(10, "All").member(1).member(2).member(3));
        directory.insert_group(ContactGroup::new(11, "Managers").member(2).member(4));
        directory
    }

    #[tokio::test]
    async fn test_dedup_across_groups_and_contacts() {
        let campaign = Campaign::new(1, "c").to_group(10).to_group(11).contact(1).contact(4);
        let recipients = resolve(&campaign, &directory()).await.unwrap();

        assert_eq!(
            recipients.to.emails(),
            vec!["ana@example.com", "bo@example.com", "cy@example.com"]
        );
        assert_eq!(recipients.total_primary(), 3);
    }

    #[tokio::test]
    async fn test_manual_and_group_overlap() {
        let campaign = Campaign::new(1, "c").cc("bo@example.com, x@example.com").cc_group(11);
        let recipients = resolve(&campaign, &directory()).await.unwrap();

        assert_eq!(
            recipients.cc.emails(),
            vec!["bo@example.com", "x@example.com", "cy@example.com"]
        );
        // First occurrence wins: the manual entry carries no contact
        assert!(recipients.cc.iter().next().unwrap().contact.is_none());
    }

    #[tokio::test]
    async fn test_inactive_excluded_everywhere() {
        let campaign = Campaign::new(1, "c")
            .to_group(10)
            .contact(3)
            .bcc_group(10);
        let recipients = resolve(&campaign, &directory()).await.unwrap();

        assert!(!recipients.to.contains("gone@example.com"));
        assert!(!recipients.bcc.contains("gone@example.com"));
    }

    #[tokio::test]
    async fn test_roles_not_cross_deduplicated() {
        let campaign = Campaign::new(1, "c").contact(1).cc("ana@example.com");
        let recipients = resolve(&campaign, &directory()).await.unwrap();

        assert!(recipients.to.contains("ana@example.com"));
        assert!(recipients.cc.contains("ana@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_manual_fails_before_lookup() {
        let directory = directory();
        directory.set_offline(true);

        let campaign = Campaign::new(1, "c").to_group(10).bcc("ok@example.com, broken");
        let err = resolve(&campaign, &directory).await.unwrap_err();

        assert!(matches!(
            err,
            CampaignError::InvalidAddress { field: "bcc", ref address } if address == "broken"
        ));
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let directory = directory();
        directory.set_offline(true);

        let campaign = Campaign::new(1, "c").to_group(10);
        assert!(matches!(
            resolve(&campaign, &directory).await,
            Err(CampaignError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_to_entries_all_come_from_the_directory() {
        let campaign = Campaign::new(1, "c").to_group(11).contact(1).cc("x@example.com");
        let recipients = resolve(&campaign, &directory()).await.unwrap();

        assert_eq!(recipients.to.len(), 3);
        assert!(recipients.to.iter().all(|r| r.contact.is_some()));
    }

    #[tokio::test]
    async fn test_empty_campaign_resolves_empty() {
        let recipients = resolve(&Campaign::new(1, "c"), &directory()).await.unwrap();
        assert!(recipients.is_empty());
    }

    #[test]
    fn test_parse_reply_to() {
        let campaign = Campaign::new(1, "c").reply_to(" replies@example.com ");
        assert_eq!(
            parse_reply_to(&campaign).unwrap().unwrap().email,
            "replies@example.com"
        );
        assert!(parse_reply_to(&Campaign::new(1, "c")).unwrap().is_none());
        assert!(parse_reply_to(&Campaign::new(1, "c").reply_to("bad")).is_err());
    }
}
