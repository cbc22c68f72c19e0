//! Campaigns loaded from a JSON directory, as the CLI does.

#![cfg(feature = "local")]

use std::sync::Arc;

use mailshot::providers::{LocalMailer, LoggerMailer};
use mailshot::testing::*;
use mailshot::{
    resolve, Campaign, Directory, Engine, EngineConfig, MemoryDirectory, MemoryOutcomeStore,
    SendMode, SharedConnector, Template,
};

const FIXTURE: &str = r#"{
    "contacts": [
        {"id": 1, "email": "ana@example.com", "first_name": "Ana"},
        {"id": 2, "email": "bo@example.com", "first_name": "Bo", "active": false},
        {"id": 3, "email": "cy@example.com", "first_name": "Cy", "last_name": "Park"},
        {"id": 4, "email": "dee@example.com"}
    ],
    "groups": [
        {"id": 10, "name": "Customers", "members": [1, 2, 3]},
        {"id": 11, "name": "Partners", "members": [3, 4]}
    ],
    "campaigns": [
        {
            "id": 1,
            "name": "Spring sale",
            "subject": "Spring sale for {{first_name}}",
            "html_body": "<p>Hi {{full_name}}</p>",
            "cc": "sales@example.com",
            "to_groups": [10, 11],
            "contacts": [1],
            "mode": "personalized"
        }
    ]
}"#;

#[tokio::test]
async fn resolves_fixture_recipients_in_order() {
    let directory = MemoryDirectory::from_json(FIXTURE).unwrap();
    let campaign = directory.campaign(1).await.unwrap();
    let recipients = resolve(&campaign, &directory).await.unwrap();

    assert_eq!(
        recipients.to.emails(),
        vec!["ana@example.com", "cy@example.com", "dee@example.com"]
    );
    assert_eq!(recipients.cc.emails(), vec!["sales@example.com"]);
    assert!(recipients.bcc.is_empty());
}

#[tokio::test]
async fn campaign_mode_from_fixture_is_used_by_dispatch() {
    let directory = Arc::new(MemoryDirectory::from_json(FIXTURE).unwrap());
    let mailer = LocalMailer::new();
    let outcomes = Arc::new(MemoryOutcomeStore::new());
    let engine = Engine::new(
        EngineConfig::new("shop@example.com"),
        directory.clone(),
        Arc::new(mailer.clone()),
        outcomes.clone(),
    );

    let campaign = directory.campaign(1).await.unwrap();
    assert_eq!(campaign.mode, SendMode::Personalized);
    let result = engine.dispatch(&campaign).await.unwrap();

    assert_eq!(result.sent, 3);
    assert_email_subject(&mailer, "Spring sale for Cy");
    assert_email_html_contains(&mailer, "<p>Hi Cy Park</p>");
    assert_email_subject(&mailer, "Spring sale for ");
    assert_email_cc(&mailer, "sales@example.com");
    refute_email_to(&mailer, "bo@example.com");
}

#[tokio::test]
async fn campaign_from_template_runs() {
    let template = Template {
        name: "welcome".into(),
        subject: "Welcome aboard".into(),
        html_body: "<h1>Welcome</h1><p>Glad you are here.</p>".into(),
        text_body: None,
        active: true,
    };
    let campaign = Campaign::from_template(2, "Onboarding", &template)
        .unwrap()
        .to_group(11);

    let mailer = LocalMailer::new();
    let engine = Engine::new(
        EngineConfig::new("shop@example.com"),
        Arc::new(MemoryDirectory::from_json(FIXTURE).unwrap()),
        Arc::new(mailer.clone()),
        Arc::new(MemoryOutcomeStore::new()),
    );
    engine.dispatch(&campaign).await.unwrap();

    let email = mailer.last_email().unwrap().email;
    assert_eq!(email.subject, "Welcome aboard");
    assert_eq!(email.text_body.as_deref(), Some("WelcomeGlad you are here."));
}

#[tokio::test]
async fn shared_connector_with_logger_transport() {
    let engine = Engine::new(
        EngineConfig::new("shop@example.com"),
        Arc::new(MemoryDirectory::from_json(FIXTURE).unwrap()),
        Arc::new(SharedConnector::new(LoggerMailer::new())),
        Arc::new(MemoryOutcomeStore::new()),
    );

    let result = engine.run_campaign(1, false).await.unwrap();
    assert!(result.success);
    assert_eq!(result.sent, 3);
}
