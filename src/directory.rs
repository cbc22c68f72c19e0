//! Contact and campaign store interface.
//!
//! The engine never owns campaign or contact data; it reads it through a
//! [`Directory`] at send time, so group edits made after a campaign was
//! authored are picked up by its next run.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::campaign::{Campaign, CampaignId, Contact, ContactGroup, ContactId, GroupId};
use crate::error::CampaignError;

/// Read access to campaigns, groups and contacts.
///
/// Any `Err` is treated as the store being unreachable and aborts the run.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Load a campaign by id.
    async fn campaign(&self, id: CampaignId) -> Result<Campaign, CampaignError>;

    /// Active members of a group, in membership order.
    async fn active_members(&self, group: GroupId) -> Result<Vec<Contact>, CampaignError>;

    /// Look up a single contact. `Ok(None)` if it no longer exists.
    async fn contact(&self, id: ContactId) -> Result<Option<Contact>, CampaignError>;
}

/// Serialized form of a [`MemoryDirectory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryData {
    pub campaigns: Vec<Campaign>,
    pub groups: Vec<ContactGroup>,
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Default)]
struct State {
    campaigns: HashMap<CampaignId, Campaign>,
    groups: HashMap<GroupId, ContactGroup>,
    contacts: HashMap<ContactId, Contact>,
    offline: bool,
}

/// In-memory directory, used by the CLI (loaded from JSON) and by tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<State>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: DirectoryData) -> Self {
        let directory = Self::new();
        for contact in data.contacts {
            directory.insert_contact(contact);
        }
        for group in data.groups {
            directory.insert_group(group);
        }
        for campaign in data.campaigns {
            directory.insert_campaign(campaign);
        }
        directory
    }

    pub fn from_json(json: &str) -> Result<Self, CampaignError> {
        Ok(Self::from_data(serde_json::from_str(json)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CampaignError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CampaignError::Store(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn insert_campaign(&self, campaign: Campaign) {
        self.state.write().campaigns.insert(campaign.id, campaign);
    }

    pub fn insert_group(&self, group: ContactGroup) {
        self.state.write().groups.insert(group.id, group);
    }

    pub fn insert_contact(&self, contact: Contact) {
        self.state.write().contacts.insert(contact.id, contact);
    }

    /// Apply an edit to a stored contact. Returns `false` if it does not exist.
    pub fn update_contact<F: FnOnce(&mut Contact)>(&self, id: ContactId, edit: F) -> bool {
        match self.state.write().contacts.get_mut(&id) {
            Some(contact) => {
                edit(contact);
                true
            }
            None => false,
        }
    }

    /// Make every lookup fail, as an unreachable store would.
    pub fn set_offline(&self, offline: bool) {
        self.state.write().offline = offline;
    }

    fn check_online(state: &State) -> Result<(), CampaignError> {
        if state.offline {
            return Err(CampaignError::Store("directory unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn campaign(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        let state = self.state.read();
        Self::check_online(&state)?;
        state
            .campaigns
            .get(&id)
            .cloned()
            .ok_or(CampaignError::CampaignNotFound(id))
    }

    async fn active_members(&self, group: GroupId) -> Result<Vec<Contact>, CampaignError> {
        let state = self.state.read();
        Self::check_online(&state)?;

        let Some(group) = state.groups.get(&group) else {
            tracing::warn!(group_id = group, "Campaign references unknown group");
            return Ok(Vec::new());
        };

        Ok(group
            .members
            .iter()
            .filter_map(|id| state.contacts.get(id))
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn contact(&self, id: ContactId) -> Result<Option<Contact>, CampaignError> {
        let state = self.state.read();
        Self::check_online(&state)?;
        Ok(state.contacts.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "contacts": [
            {"id": 1, "email": "a@example.com", "first_name": "Ann"},
            {"id": 2, "email": "b@example.com", "active": false},
            {"id": 3, "email": "c@example.com"}
        ],
        "groups": [{"id": 10, "name": "Customers", "members": [3, 2, 1]}],
        "campaigns": [{"id": 7, "name": "Launch", "subject": "Hi", "to_groups": [10]}]
    }"#;

    #[tokio::test]
    async fn test_from_json() {
        let directory = MemoryDirectory::from_json(FIXTURE).unwrap();
        let campaign = directory.campaign(7).await.unwrap();
        assert_eq!(campaign.name, "Launch");
        assert!(matches!(
            directory.campaign(8).await,
            Err(CampaignError::CampaignNotFound(8))
        ));
    }

    #[tokio::test]
    async fn test_active_members_in_order() {
        let directory = MemoryDirectory::from_json(FIXTURE).unwrap();
        let members = directory.active_members(10).await.unwrap();
        let emails: Vec<_> = members.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["c@example.com", "a@example.com"]);
    }

    #[tokio::test]
    async fn test_unknown_group_is_empty() {
        let directory = MemoryDirectory::from_json(FIXTURE).unwrap();
        assert!(directory.active_members(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_membership_is_late_bound() {
        let directory = MemoryDirectory::from_json(FIXTURE).unwrap();
        assert!(directory.update_contact(1, |c| c.active = false));
        assert_eq!(directory.active_members(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline() {
        let directory = MemoryDirectory::from_json(FIXTURE).unwrap();
        directory.set_offline(true);
        assert!(matches!(
            directory.active_members(10).await,
            Err(CampaignError::Store(_))
        ));
    }
}
