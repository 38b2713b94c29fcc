//! Error types for tool dispatch
//!
//! Every failure a tool call can produce is one of four kinds (see
//! [`FailureKind`]). Adapter and validator errors are folded into [`ToolError`]
//! at the dispatch boundary and never escape the server loop.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    UnknownTool,
    ValidationError,
    IntegrationError,
    NotFound,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnknownTool => "UnknownTool",
            FailureKind::ValidationError => "ValidationError",
            FailureKind::IntegrationError => "IntegrationError",
            FailureKind::NotFound => "NotFound",
        }
    }

    /// Whether the wire response should carry `isError: true`.
    ///
    /// A missing record is an answer, not a fault.
    pub fn is_error(&self) -> bool {
        !matches!(self, FailureKind::NotFound)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument rejected before dispatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Tool arguments must be a JSON object")]
    NotAnObject,

    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("Parameter '{name}' must not be empty")]
    EmptyValue { name: String },

    /// Missing or empty value of a parameter that declares its own wording
    #[error("{message}")]
    Required { name: String, message: String },

    #[error("Parameter '{name}' must be of type {expected}")]
    InvalidType { name: String, expected: &'static str },

    #[error("Invalid value '{value}' for parameter '{name}' (allowed: {})", .allowed.join(", "))]
    InvalidValue {
        name: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Parameter '{name}' exceeds {max} characters")]
    TooLong { name: String, max: usize },
}

/// Failure talking to a live backend
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Statement {statement_id} finished in state {state}: {message}")]
    Statement {
        statement_id: String,
        state: String,
        message: String,
    },

    #[error("Unexpected response from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Misconfigured(String),

    #[error("{operation} did not complete within {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },
}

/// Failure of a single tool call
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("No {} found with ID: {id}", .entity.to_lowercase())]
    NotFound { entity: &'static str, id: String },
}

impl ToolError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ToolError::UnknownTool(_) => FailureKind::UnknownTool,
            ToolError::Validation(_) => FailureKind::ValidationError,
            ToolError::Integration(_) => FailureKind::IntegrationError,
            ToolError::NotFound { .. } => FailureKind::NotFound,
        }
    }
}

/// Registry construction failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name '{0}'")]
    DuplicateTool(String),
}
