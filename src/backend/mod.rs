//! Backend adapters and the live/demo fallback policy
//!
//! Each external integration has one capability trait with a live and a demo
//! implementation. [`FallbackPolicy`] picks one per integration at startup from
//! credential presence; the choice never changes for the life of the process.

pub mod messaging;
pub mod patients;
pub mod warehouse;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::IntegrationsConfig;
use crate::error::IntegrationError;

/// External systems the tool servers can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Integration {
    Twilio,
    Databricks,
    Firemetrics,
}

impl Integration {
    pub const ALL: [Integration; 3] = [
        Integration::Twilio,
        Integration::Databricks,
        Integration::Firemetrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Integration::Twilio => "twilio",
            Integration::Databricks => "databricks",
            Integration::Firemetrics => "firemetrics",
        }
    }

    /// Variables that must be non-empty for live mode
    pub fn required_env(&self) -> &'static [&'static str] {
        match self {
            Integration::Twilio => &["TWILIO_ACCOUNT_SID", "TWILIO_AUTH_TOKEN"],
            Integration::Databricks => &["DATABRICKS_HOST", "DATABRICKS_TOKEN"],
            Integration::Firemetrics => &["FIREMETRICS_DB_HOST"],
        }
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which adapter variant serves an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendMode {
    Live,
    Demo,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Live => "Live",
            BackendMode::Demo => "Demo",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Startup-time live/demo decision for every integration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    twilio: BackendMode,
    databricks: BackendMode,
    firemetrics: BackendMode,
}

impl FallbackPolicy {
    pub fn from_config(config: &IntegrationsConfig) -> Self {
        let mode = |live: bool| if live { BackendMode::Live } else { BackendMode::Demo };
        Self {
            twilio: mode(config.twilio.is_configured()),
            databricks: mode(config.databricks.is_configured()),
            firemetrics: mode(config.firemetrics.is_configured()),
        }
    }

    pub fn all_demo() -> Self {
        Self {
            twilio: BackendMode::Demo,
            databricks: BackendMode::Demo,
            firemetrics: BackendMode::Demo,
        }
    }

    pub fn resolve_backend(&self, integration: Integration) -> BackendMode {
        match integration {
            Integration::Twilio => self.twilio,
            Integration::Databricks => self.databricks,
            Integration::Firemetrics => self.firemetrics,
        }
    }

    /// Log the resolved mode of each integration in `integrations`
    pub fn log_modes(&self, integrations: &[Integration]) {
        for integration in integrations {
            match self.resolve_backend(*integration) {
                BackendMode::Live => info!(integration = %integration, "Integration configured, using live backend"),
                BackendMode::Demo => warn!(
                    integration = %integration,
                    required = ?integration.required_env(),
                    "Integration not configured, using demo backend"
                ),
            }
        }
    }
}

/// Run an adapter future under an optional deadline
pub async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    operation: &str,
    future: F,
) -> Result<T, IntegrationError>
where
    F: Future<Output = Result<T, IntegrationError>>,
{
    match deadline {
        None => future.await,
        Some(after) => tokio::time::timeout(after, future)
            .await
            .map_err(|_| IntegrationError::Timeout {
                operation: operation.to_string(),
                after,
            })?,
    }
}
