//! mailshot CLI - send campaigns and check transport settings.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mailshot::{
    aggregate, mailer_from_env, resolve, CancelHandle, Directory, Engine, EngineConfig,
    MemoryDirectory, MemoryOutcomeStore,
};

/// Campaign delivery engine.
#[derive(Parser)]
#[command(name = "mailshot")]
#[command(about = "Send email campaigns to contact groups")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one diagnostic message through the configured transport
    TestEmail {
        /// Recipient (defaults to the sender)
        #[arg(long)]
        to: Option<String>,
    },

    /// Send a campaign by id
    Send {
        /// Campaign to send
        campaign_id: u64,

        /// JSON file with campaigns, groups and contacts
        #[arg(long, env = "MAILSHOT_DATA", default_value = "mailshot.json")]
        data: PathBuf,

        /// One message per recipient with placeholders filled in, instead of a shared BCC message
        #[arg(long, alias = "individual")]
        personalize: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Write the run's delivery outcomes to this file as JSON
        #[arg(long)]
        outcomes: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("mailshot=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mailshot=info,warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = EngineConfig::from_env()?;
    let connector = mailer_from_env()?;

    match cli.command {
        Commands::TestEmail { to } => {
            let to = to.unwrap_or_else(|| config.sender.email.clone());
            println!("Testing email configuration...");
            println!("From: {}", config.sender);
            println!("To: {}", to);
            println!("Transport: {}", connector.provider_name());

            let engine = Engine::new(
                config,
                Arc::new(MemoryDirectory::new()),
                connector,
                Arc::new(MemoryOutcomeStore::new()),
            );
            match engine.send_test_email(&to).await {
                Ok(result) => {
                    println!("Test email sent to {} ({})", to, result.message_id);
                }
                Err(e) => {
                    eprintln!("Failed to send test email: {}", e);
                    eprintln!("Error category: {}", e.category());
                    std::process::exit(1);
                }
            }
        }

        Commands::Send {
            campaign_id,
            data,
            personalize,
            yes,
            outcomes,
        } => {
            let directory = Arc::new(
                MemoryDirectory::from_path(&data)
                    .with_context(|| format!("loading {}", data.display()))?,
            );
            let campaign = directory.campaign(campaign_id).await?;
            let recipients = resolve(&campaign, &*directory).await?;

            println!("Sending campaign: {}", campaign.name);
            println!("Subject: {}", campaign.subject);
            println!("From: {}", config.sender);
            println!(
                "Recipients: {} (cc: {}, bcc: {})",
                recipients.total_primary(),
                recipients.cc.len(),
                recipients.bcc.len()
            );
            if personalize {
                println!("Mode: individual emails (personalized)");
            } else {
                println!("Mode: shared (BCC)");
            }
            println!();

            if !yes && !confirm("Do you want to proceed? (yes/no): ")? {
                println!("Campaign sending cancelled");
                return Ok(());
            }

            let store = Arc::new(MemoryOutcomeStore::new());
            let engine = Engine::new(config, directory, connector, store.clone());

            let cancel = CancelHandle::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, finishing in-flight sends");
                    on_interrupt.cancel();
                }
            });

            let result = engine
                .run_campaign_with(campaign_id, personalize, cancel)
                .await?;
            let stats = aggregate(&store.for_run(result.run_id));

            if result.success {
                println!("{}", result.message);
            } else {
                eprintln!("{}", result.message);
            }
            println!("Sent: {}", result.sent);
            println!("Failed: {}", result.failed);
            println!("Delivery rate: {:.2}%", stats.delivery_rate());

            if let Some(path) = outcomes {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                serde_json::to_writer_pretty(file, &store.for_run(result.run_id))?;
                println!("Outcomes written to {}", path.display());
            }

            if !result.success {
                bail!("campaign {} was not delivered", campaign_id);
            }
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "yes" | "y"))
}
