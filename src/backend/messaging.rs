//! SMS delivery: Twilio REST API or the in-process demo log

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::BackendMode;
use crate::config::TwilioConfig;
use crate::error::IntegrationError;
use crate::session::SessionState;

pub const DEMO_NOTE: &str = "Demo mode - set TWILIO_* env vars to send real SMS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Accepted by the gateway
    Sent,
    /// Recorded locally only
    Simulated,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Simulated => "simulated",
        }
    }
}

/// Confirmation of one outbound SMS
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmsReceipt {
    pub status: DeliveryStatus,
    pub message_id: String,
    pub to: String,
    pub body: String,
    pub timestamp: String,
    pub mode: BackendMode,
    pub note: Option<String>,
}

#[async_trait]
pub trait MessagingBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, IntegrationError>;
}

/// Local wall-clock time without offset, microsecond precision
fn iso_timestamp(at: DateTime<Local>) -> String {
    at.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Demo sender: every send succeeds and lands in the session log.
#[derive(Debug, Clone)]
pub struct MockMessaging {
    session: SessionState,
}

impl MockMessaging {
    pub fn new(session: SessionState) -> Self {
        Self { session }
    }
}

#[async_trait]
impl MessagingBackend for MockMessaging {
    fn mode(&self) -> BackendMode {
        BackendMode::Demo
    }

    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, IntegrationError> {
        let now = Local::now();
        let receipt = SmsReceipt {
            status: DeliveryStatus::Simulated,
            message_id: format!("SM_MOCK_{}", now.format("%Y%m%d%H%M%S")),
            to: to.to_string(),
            body: body.to_string(),
            timestamp: iso_timestamp(now),
            mode: BackendMode::Demo,
            note: Some(DEMO_NOTE.to_string()),
        };

        self.session.record_sent(receipt.clone()).await;
        info!(to = %to, message_id = %receipt.message_id, "SMS simulated");
        Ok(receipt)
    }
}

#[derive(Debug, Serialize)]
struct TwilioMessageForm<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
    code: Option<i64>,
}

/// Live sender over the Twilio Messages REST resource.
///
/// Missing credentials are reported by every send rather than at startup.
#[derive(Debug, Clone)]
pub struct TwilioMessaging {
    account: Result<TwilioAccount, String>,
}

#[derive(Debug, Clone)]
struct TwilioAccount {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioAccount {
    fn from_config(config: &TwilioConfig) -> Result<Self, IntegrationError> {
        let (Some(account_sid), Some(auth_token)) = (&config.account_sid, &config.auth_token) else {
            return Err(IntegrationError::Misconfigured(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN must be set".to_string(),
            ));
        };
        let from_number = config.from_number.clone().unwrap_or_default();
        if from_number.is_empty() {
            warn!("TWILIO_FROM_NUMBER is not set; Twilio will reject sends without a sender");
        }

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: account_sid.clone(),
            auth_token: auth_token.clone(),
            from_number,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

impl TwilioMessaging {
    pub fn new(config: &TwilioConfig) -> Self {
        let account = TwilioAccount::from_config(config).map_err(|e| e.to_string());
        if let Err(reason) = &account {
            warn!(%reason, "Twilio adapter is incomplete; sends will fail");
        }
        Self { account }
    }

    /// Configuration problem that every send will report, if any
    pub fn misconfiguration(&self) -> Option<&str> {
        self.account.as_ref().err().map(String::as_str)
    }
}

#[async_trait]
impl MessagingBackend for TwilioMessaging {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, IntegrationError> {
        let account = self
            .account
            .as_ref()
            .map_err(|reason| IntegrationError::Misconfigured(reason.clone()))?;
        debug!(to = %to, "Sending SMS via Twilio");

        let response = account
            .client
            .post(account.messages_url())
            .basic_auth(&account.account_sid, Some(&account.auth_token))
            .form(&TwilioMessageForm {
                to,
                from: &account.from_number,
                body,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TwilioErrorBody>(&text) {
                Ok(TwilioErrorBody { message: Some(message), code: Some(code) }) => {
                    format!("{message} (code {code})")
                }
                Ok(TwilioErrorBody { message: Some(message), .. }) => message,
                _ if text.is_empty() => status.to_string(),
                _ => text,
            };
            return Err(IntegrationError::Api {
                service: "Twilio",
                status: status.as_u16(),
                message,
            });
        }

        let message: TwilioMessage = response.json().await?;
        info!(to = %to, message_id = %message.sid, "SMS sent via Twilio");

        Ok(SmsReceipt {
            status: DeliveryStatus::Sent,
            message_id: message.sid,
            to: to.to_string(),
            body: body.to_string(),
            timestamp: iso_timestamp(Local::now()),
            mode: BackendMode::Live,
            note: None,
        })
    }
}
