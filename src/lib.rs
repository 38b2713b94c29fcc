//! # Care-gap MCP servers
//!
//! Model Context Protocol tool servers for care-gap closure workflows:
//! patient outreach over SMS, CQL to SQL translation, and analytics and
//! patient lookups against the data platform. Each integration runs live
//! when its credentials are present and falls back to deterministic demo
//! data otherwise.

pub mod backend;
pub mod config;
pub mod cql;
pub mod error;
pub mod fixtures;
pub mod report;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

// Re-export commonly used types
pub use backend::{BackendMode, FallbackPolicy, Integration};
pub use config::{IntegrationsConfig, ServerConfig, ServerKind, TransportKind};
pub use error::{FailureKind, ToolError};
pub use server::{ToolCallOutput, ToolServer};
pub use session::SessionState;

/// Current version of the servers
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
