//! Assertion helpers for tests that run campaigns against a [`LocalMailer`].
//!
//! ```rust,ignore
//! use mailshot::providers::LocalMailer;
//! use mailshot::testing::*;
//! use mailshot::DeliveryStatus;
//!
//! #[tokio::test]
//! async fn test_launch() {
//!     let mailer = LocalMailer::new();
//!
//!     // ... run a campaign ...
//!
//!     assert_email_count(&mailer, 3);
//!     assert_email_to(&mailer, "ana@example.com");
//!     assert_email_cc(&mailer, "boss@example.com");
//!     assert_outcome_status(&outcomes, "ana@example.com", DeliveryStatus::Sent);
//! }
//! ```

use uuid::Uuid;

use crate::address::Address;
use crate::outcome::{DeliveryOutcome, DeliveryStatus, MemoryOutcomeStore};
use crate::providers::LocalMailer;
use crate::storage::StoredEmail;

fn join(addrs: &[Address]) -> String {
    addrs
        .iter()
        .map(|a| a.email.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_email_summary(emails: &[StoredEmail]) -> String {
    if emails.is_empty() {
        return "  (no emails sent)".to_string();
    }

    emails
        .iter()
        .enumerate()
        .map(|(i, stored)| {
            let e = &stored.email;
            format!(
                "  {}. To: [{}], Cc: [{}], Bcc: [{}], Subject: \"{}\"",
                i + 1,
                join(&e.to),
                join(&e.cc),
                join(&e.bcc),
                e.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_outcome_summary(outcomes: &[DeliveryOutcome]) -> String {
    if outcomes.is_empty() {
        return "  (no outcomes recorded)".to_string();
    }

    outcomes
        .iter()
        .map(|o| match &o.error {
            Some(error) => format!("  {} -> {} ({})", o.email, o.status, error),
            None => format!("  {} -> {}", o.email, o.status),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn assert_any(mailer: &LocalMailer, role: &str, email: &str, pick: fn(&StoredEmail) -> &[Address]) {
    let emails = mailer.emails();
    let found = emails
        .iter()
        .any(|stored| pick(stored).iter().any(|a| a.email == email));

    assert!(
        found,
        "Expected an email with '{}' in {}.\n\nEmails sent:\n{}",
        email,
        role,
        format_email_summary(&emails)
    );
}

/// Assert that at least one email was sent.
pub fn assert_email_sent(mailer: &LocalMailer) {
    assert!(
        mailer.has_emails(),
        "Expected at least one email to be sent, but none were sent"
    );
}

/// Assert that no emails were sent.
pub fn assert_no_emails_sent(mailer: &LocalMailer) {
    let emails = mailer.emails();
    assert!(
        emails.is_empty(),
        "Expected no emails to be sent, but {} were sent.\n\nEmails sent:\n{}",
        emails.len(),
        format_email_summary(&emails)
    );
}

/// Assert that exactly `expected` emails were sent.
pub fn assert_email_count(mailer: &LocalMailer, expected: usize) {
    let actual = mailer.email_count();
    assert!(
        actual == expected,
        "Expected {} email(s) to be sent, but {} were sent.\n\nEmails sent:\n{}",
        expected,
        actual,
        format_email_summary(&mailer.emails())
    );
}

/// Assert that some email listed `email` in its visible To.
pub fn assert_email_to(mailer: &LocalMailer, email: &str) {
    assert_any(mailer, "To", email, |s| s.email.to.as_slice());
}

/// Assert that some email copied `email` in CC.
pub fn assert_email_cc(mailer: &LocalMailer, email: &str) {
    assert_any(mailer, "CC", email, |s| s.email.cc.as_slice());
}

/// Assert that some email carried `email` in BCC.
pub fn assert_email_bcc(mailer: &LocalMailer, email: &str) {
    assert_any(mailer, "BCC", email, |s| s.email.bcc.as_slice());
}

/// Assert that no email reached `email` in any role.
pub fn refute_email_to(mailer: &LocalMailer, email: &str) {
    let emails = mailer.emails();
    let reached = emails
        .iter()
        .any(|s| s.email.all_recipients().iter().any(|a| a.email == email));
    assert!(
        !reached,
        "Expected no email to reach '{}', but one did.\n\nEmails sent:\n{}",
        email,
        format_email_summary(&emails)
    );
}

/// Assert that some email had exactly this subject.
pub fn assert_email_subject(mailer: &LocalMailer, subject: &str) {
    let emails = mailer.emails();
    assert!(
        emails.iter().any(|s| s.email.subject == subject),
        "Expected an email with subject \"{}\".\n\nEmails sent:\n{}",
        subject,
        format_email_summary(&emails)
    );
}

/// Assert that some email's HTML body contains `needle`.
pub fn assert_email_html_contains(mailer: &LocalMailer, needle: &str) {
    let emails = mailer.emails();
    let found = emails
        .iter()
        .any(|s| s.email.html_body.as_deref().is_some_and(|b| b.contains(needle)));
    assert!(
        found,
        "Expected an email whose HTML body contains \"{}\".\n\nEmails sent:\n{}",
        needle,
        format_email_summary(&emails)
    );
}

/// Assert that the latest outcome recorded for `email` has `status`.
pub fn assert_outcome_status(store: &MemoryOutcomeStore, email: &str, status: DeliveryStatus) {
    let outcomes = store.all();
    let latest = outcomes.iter().rev().find(|o| o.email == email);

    match latest {
        Some(outcome) => assert!(
            outcome.status == status,
            "Expected outcome for '{}' to be {}, but it is {}.\n\nOutcomes:\n{}",
            email,
            status,
            outcome.status,
            format_outcome_summary(&outcomes)
        ),
        None => panic!(
            "Expected an outcome for '{}', but none was recorded.\n\nOutcomes:\n{}",
            email,
            format_outcome_summary(&outcomes)
        ),
    }
}

/// Assert that a run wrote exactly `expected` outcome rows.
pub fn assert_outcome_count(store: &MemoryOutcomeStore, run_id: Uuid, expected: usize) {
    let outcomes = store.for_run(run_id);
    assert!(
        outcomes.len() == expected,
        "Expected {} outcome(s) for run {}, but {} were recorded.\n\nOutcomes:\n{}",
        expected,
        run_id,
        outcomes.len(),
        format_outcome_summary(&outcomes)
    );
}
