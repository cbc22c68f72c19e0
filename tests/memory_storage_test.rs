//! Memory storage tests.

#![cfg(feature = "local")]

use mailshot::{Email, MemoryStorage, Storage};

// ============================================================================
// Push & Get
// ============================================================================

#[test]
fn new_storage_starts_empty() {
    let storage = MemoryStorage::new();
    assert_eq!(storage.count(), 0);
    assert!(storage.all().is_empty());
}

#[test]
fn push_returns_unique_id() {
    let storage = MemoryStorage::new();

    let id1 = storage.push(Email::new().subject("First"));
    let id2 = storage.push(Email::new().subject("Second"));

    assert_ne!(id1, id2);
    assert!(!id1.is_empty());
    assert_eq!(storage.count(), 2);
}

#[test]
fn get_retrieves_email_by_id() {
    let storage = MemoryStorage::new();

    storage.push(Email::new().subject("First"));
    let id = storage.push(Email::new().subject("Launch day"));

    assert_eq!(storage.get(&id).unwrap().email.subject, "Launch day");
    assert!(storage.get("unknown-id").is_none());
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn all_returns_emails_newest_first() {
    let storage = MemoryStorage::new();

    storage.push(Email::new().subject("First"));
    storage.push(Email::new().subject("Second"));
    storage.push(Email::new().subject("Third"));

    let subjects: Vec<_> = storage.all().into_iter().map(|s| s.email.subject).collect();
    assert_eq!(subjects, vec!["Third", "Second", "First"]);
}

// ============================================================================
// Clear & Flush
// ============================================================================

#[test]
fn clear_removes_all_emails() {
    let storage = MemoryStorage::new();
    storage.push(Email::new().subject("First"));
    storage.push(Email::new().subject("Second"));

    storage.clear();
    assert_eq!(storage.count(), 0);
    assert!(storage.all().is_empty());
}

#[test]
fn flush_returns_all_and_clears() {
    let storage = MemoryStorage::new();
    storage.push(Email::new().subject("First"));
    storage.push(Email::new().subject("Second"));

    let flushed = storage.flush();
    assert_eq!(flushed.len(), 2);
    assert_eq!(flushed[0].email.subject, "Second");
    assert_eq!(storage.count(), 0);
}

#[test]
fn flush_on_empty_returns_empty() {
    assert!(MemoryStorage::new().flush().is_empty());
}
