//! Send one SMS through the live Twilio gateway and print the receipt.
//!
//! Used to verify Twilio credentials before wiring the messaging server into
//! an agent.

use anyhow::{Result, bail};
use caregap_mcp::backend::messaging::{MessagingBackend, TwilioMessaging};
use caregap_mcp::config::IntegrationsConfig;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "send-test-sms")]
#[command(about = "Send a test SMS via Twilio")]
#[command(version)]
struct Cli {
    /// Destination number in E.164 format
    #[arg(long, env = "TEST_PHONE_NUMBER")]
    to: String,

    /// Message text
    #[arg(
        long,
        default_value = "Test message from the care-gap action server. If you received this, Twilio is configured correctly."
    )]
    body: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let integrations = IntegrationsConfig::from_env();
    if !integrations.twilio.is_configured() {
        bail!("Twilio is not configured: set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_FROM_NUMBER");
    }

    let sender = TwilioMessaging::new(&integrations.twilio);
    if let Some(reason) = sender.misconfiguration() {
        bail!("Twilio is misconfigured: {reason}");
    }
    info!(to = %cli.to, "Sending test SMS");

    let receipt = sender.send(&cli.to, &cli.body).await?;
    println!("SMS sent");
    println!("  Message ID: {}", receipt.message_id);
    println!("  To:         {}", receipt.to);
    println!("  Status:     {}", receipt.status.as_str());
    println!("  Timestamp:  {}", receipt.timestamp);
    Ok(())
}
