//! Per-contact placeholder substitution.
//!
//! Recognized placeholders are `{{first_name}}`, `{{last_name}}`,
//! `{{full_name}}` and `{{email}}`. Anything else in braces is left exactly
//! as written. Substitution is a single pass, so a contact whose name happens
//! to contain `{{email}}` is not expanded a second time.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::campaign::{Campaign, Contact};

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{(first_name|last_name|full_name|email)\}\}")
            .expect("placeholder pattern is valid")
    })
}

/// Substitute the contact's fields into `body`.
///
/// ```
/// use mailshot::{render, Contact};
///
/// let ana = Contact::new(1, "ana@x.com").first_name("Ana");
/// assert_eq!(
///     render("Hi {{first_name}}, you are {{email}} {{company}}", &ana),
///     "Hi Ana, you are ana@x.com {{company}}"
/// );
/// ```
pub fn render(body: &str, contact: &Contact) -> String {
    placeholder()
        .replace_all(body, |caps: &Captures<'_>| match &caps[1] {
            "first_name" => contact.first_name.clone().unwrap_or_default(),
            "last_name" => contact.last_name.clone().unwrap_or_default(),
            "full_name" => contact.full_name(),
            "email" => contact.email.clone(),
            other => format!("{{{{{other}}}}}"),
        })
        .into_owned()
}

/// A campaign's content rendered for one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl RenderedContent {
    /// Content as authored, without substitution.
    pub fn verbatim(campaign: &Campaign) -> Self {
        Self {
            subject: campaign.subject.clone(),
            html_body: campaign.html_body.clone(),
            text_body: text_body(campaign),
        }
    }

    /// Content with every part rendered for `contact`.
    pub fn for_contact(campaign: &Campaign, contact: &Contact) -> Self {
        Self {
            subject: render(&campaign.subject, contact),
            html_body: render(&campaign.html_body, contact),
            text_body: render(&text_body(campaign), contact),
        }
    }
}

/// The campaign's text body, or one derived from its HTML.
pub fn text_body(campaign: &Campaign) -> String {
    match campaign.text_body.as_deref() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => strip_html_tags(&campaign.html_body),
    }
}

/// Drop tags and collapse whitespace.
pub fn strip_html_tags(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let tag = TAG.get_or_init(|| Regex::new(r"<[^<]+?>").expect("tag pattern is valid"));
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").expect("space pattern is valid"));

    let text = tag.replace_all(html, "");
    space.replace_all(&text, " ").trim().to_string()
}
