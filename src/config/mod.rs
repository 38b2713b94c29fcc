//! Configuration management
//!
//! Process settings come from the command line ([`ServerConfig`]); integration
//! credentials come from the environment ([`IntegrationsConfig`]) and are read
//! exactly once at startup.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default Twilio REST endpoint.
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Default PostgreSQL port for the Firemetrics patient store.
pub const FIREMETRICS_DEFAULT_PORT: u16 = 5432;

/// Which tool catalogue this process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// SMS outreach (`action-server`)
    Messaging,
    /// CQL to SQL transformation (`cql-converter`)
    Transform,
    /// Warehouse queries and patient lookup (`data-platform`)
    Data,
}

impl ServerKind {
    /// Name advertised in the `initialize` handshake
    pub fn server_name(&self) -> &'static str {
        match self {
            ServerKind::Messaging => "action-server",
            ServerKind::Transform => "cql-converter",
            ServerKind::Data => "data-platform",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Messaging => "messaging",
            ServerKind::Transform => "transform",
            ServerKind::Data => "data",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "messaging" | "action" | "action-server" => Ok(ServerKind::Messaging),
            "transform" | "cql" | "cql-converter" => Ok(ServerKind::Transform),
            "data" | "data-platform" => Ok(ServerKind::Data),
            other => Err(format!("unknown server kind: {other}")),
        }
    }
}

/// Transport the server loop runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Tool catalogue to serve
    pub server: ServerKind,
    /// Transport (default: stdio)
    pub transport: TransportKind,
    /// Server host for HTTP transport (default: localhost)
    pub host: String,
    /// Server port for HTTP transport (default: 3000)
    pub port: u16,
    /// Log level (default: info)
    pub log_level: String,
    /// Deadline applied to each live adapter call; `None` waits indefinitely
    pub adapter_timeout_secs: Option<u64>,
}

impl ServerConfig {
    pub fn adapter_timeout(&self) -> Option<Duration> {
        self.adapter_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerKind::Messaging,
            transport: TransportKind::Stdio,
            host: "localhost".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            adapter_timeout_secs: None,
        }
    }
}

/// Twilio SMS gateway credentials
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub api_base: String,
}

impl TwilioConfig {
    /// Live sends need both the account SID and the auth token
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some()
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base: TWILIO_API_BASE.to_string(),
        }
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redacted(&self.auth_token))
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Databricks SQL warehouse credentials
#[derive(Clone, Default)]
pub struct DatabricksConfig {
    pub host: Option<String>,
    pub token: Option<String>,
    pub warehouse_id: Option<String>,
    pub http_path: Option<String>,
}

impl DatabricksConfig {
    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.token.is_some()
    }

    /// Workspace base URL; a bare hostname is assumed to be https
    pub fn base_url(&self) -> Option<String> {
        self.host.as_deref().map(|host| {
            let host = host.trim_end_matches('/');
            if host.starts_with("http://") || host.starts_with("https://") {
                host.to_string()
            } else {
                format!("https://{host}")
            }
        })
    }

    /// Explicit warehouse id, else the last segment of the warehouse HTTP path
    /// (`/sql/1.0/warehouses/<id>`).
    pub fn resolved_warehouse_id(&self) -> Option<String> {
        self.warehouse_id.clone().or_else(|| {
            self.http_path
                .as_deref()
                .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
        })
    }
}

impl fmt::Debug for DatabricksConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabricksConfig")
            .field("host", &self.host)
            .field("token", &redacted(&self.token))
            .field("warehouse_id", &self.warehouse_id)
            .field("http_path", &self.http_path)
            .finish()
    }
}

/// Firemetrics PostgreSQL connection settings
#[derive(Clone)]
pub struct FiremetricsConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl FiremetricsConfig {
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }
}

impl Default for FiremetricsConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: FIREMETRICS_DEFAULT_PORT,
            user: None,
            password: None,
            database: "firemetrics".to_string(),
        }
    }
}

impl fmt::Debug for FiremetricsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiremetricsConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &redacted(&self.password))
            .field("database", &self.database)
            .finish()
    }
}

/// Credentials for every external integration
#[derive(Debug, Clone, Default)]
pub struct IntegrationsConfig {
    pub twilio: TwilioConfig,
    pub databricks: DatabricksConfig,
    pub firemetrics: FiremetricsConfig,
}

impl IntegrationsConfig {
    /// Read integration settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Values are trimmed and empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            twilio: TwilioConfig {
                account_sid: get("TWILIO_ACCOUNT_SID"),
                auth_token: get("TWILIO_AUTH_TOKEN"),
                from_number: get("TWILIO_FROM_NUMBER"),
                api_base: get("TWILIO_API_BASE").unwrap_or_else(|| TWILIO_API_BASE.to_string()),
            },
            databricks: DatabricksConfig {
                host: get("DATABRICKS_HOST"),
                token: get("DATABRICKS_TOKEN"),
                warehouse_id: get("DATABRICKS_WAREHOUSE"),
                http_path: get("DATABRICKS_HTTP_PATH"),
            },
            firemetrics: FiremetricsConfig {
                host: get("FIREMETRICS_DB_HOST"),
                port: get("FIREMETRICS_DB_PORT")
                    .and_then(|port| port.parse().ok())
                    .unwrap_or(FIREMETRICS_DEFAULT_PORT),
                user: get("FIREMETRICS_DB_USER"),
                password: get("FIREMETRICS_DB_PASSWORD"),
                database: "firemetrics".to_string(),
            },
        }
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "***")
}
