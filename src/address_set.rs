//! Ordered, duplicate-free recipient collections.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::address::Address;
use crate::campaign::Contact;

/// One resolved recipient: an address and, when it came from the directory,
/// the contact it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

impl Recipient {
    /// A manually entered address with no contact behind it.
    pub fn manual(address: Address) -> Self {
        Self {
            address,
            contact: None,
        }
    }

    pub fn email(&self) -> &str {
        &self.address.email
    }
}

impl From<&Contact> for Recipient {
    fn from(contact: &Contact) -> Self {
        Self {
            address: contact.address(),
            contact: Some(contact.clone()),
        }
    }
}

/// Split a comma-separated address list into trimmed, non-empty tokens.
pub fn tokens(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// A set of recipients keyed by exact address value.
///
/// Insertion order is kept and the first occurrence of an address wins, so a
/// contact reached through a manual entry and a group keeps whichever came
/// first. Comparison is case-sensitive, as stored.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AddressSet {
    entries: Vec<Recipient>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a recipient. Returns `false` if the address was already present.
    pub fn insert(&mut self, recipient: Recipient) -> bool {
        if !self.seen.insert(recipient.address.email.clone()) {
            return false;
        }
        self.entries.push(recipient);
        true
    }

    pub fn contains(&self, email: &str) -> bool {
        self.seen.contains(email)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recipient> {
        self.entries.iter()
    }

    /// The addresses, in insertion order.
    pub fn addresses(&self) -> Vec<Address> {
        self.entries.iter().map(|r| r.address.clone()).collect()
    }

    pub fn emails(&self) -> Vec<&str> {
        self.entries.iter().map(Recipient::email).collect()
    }
}

impl Extend<Recipient> for AddressSet {
    fn extend<I: IntoIterator<Item = Recipient>>(&mut self, iter: I) {
        for recipient in iter {
            self.insert(recipient);
        }
    }
}

impl FromIterator<Recipient> for AddressSet {
    fn from_iter<I: IntoIterator<Item = Recipient>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a Recipient;
    type IntoIter = std::slice::Iter<'a, Recipient>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl PartialEq for AddressSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}
