//! Transport layer for the MCP protocol
//!
//! Supports two transports:
//! - stdio: newline-delimited JSON-RPC on standard input/output
//! - http: JSON-RPC over `POST /mcp` (feature `http-transport`)

#[cfg(feature = "http-transport")]
pub mod http;
pub mod stdio;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

#[cfg(feature = "http-transport")]
pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// MCP protocol revision implemented by this server
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const JSONRPC_PARSE_ERROR: i32 = -32700;
pub const JSONRPC_INVALID_REQUEST: i32 = -32600;
pub const JSONRPC_METHOD_NOT_FOUND: i32 = -32601;
pub const JSONRPC_INVALID_PARAMS: i32 = -32602;
pub const JSONRPC_INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC request id; numbers and strings are both legal
pub type RequestId = Value;

/// JSON-RPC 2.0 message wrapper for proper serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request {
        jsonrpc: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Response {
        jsonrpc: String,
        id: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<McpError>,
    },
}

/// MCP message types (internal representation)
#[derive(Debug, Clone)]
pub enum McpMessage {
    Initialize {
        id: RequestId,
        params: InitializeParams,
    },
    Ping {
        id: RequestId,
    },
    ToolsList {
        id: RequestId,
    },
    ToolsCall {
        id: RequestId,
        params: ToolsCallParams,
    },
    /// A request for a method this server does not implement
    Unsupported {
        id: RequestId,
        method: String,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: RequestId,
        result: Option<Value>,
        error: Option<McpError>,
    },
}

/// Initialize parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Client info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Tool call parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(JSONRPC_METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }
}

impl McpMessage {
    pub fn result(id: RequestId, result: Value) -> Self {
        McpMessage::Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: RequestId, error: McpError) -> Self {
        McpMessage::Response {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Convert MCP message to JSON-RPC message for serialization
    pub fn to_jsonrpc(&self) -> JsonRpcMessage {
        let request = |id: &RequestId, method: &str, params: Option<Value>| JsonRpcMessage::Request {
            jsonrpc: "2.0".to_string(),
            id: Some(id.clone()),
            method: method.to_string(),
            params,
        };

        match self {
            McpMessage::Initialize { id, params } => {
                request(id, "initialize", serde_json::to_value(params).ok())
            }
            McpMessage::Ping { id } => request(id, "ping", None),
            McpMessage::ToolsList { id } => request(id, "tools/list", None),
            McpMessage::ToolsCall { id, params } => {
                request(id, "tools/call", serde_json::to_value(params).ok())
            }
            McpMessage::Unsupported { id, method } => request(id, method, None),
            McpMessage::Notification { method, params } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: None,
                method: method.clone(),
                params: params.clone(),
            },
            McpMessage::Response { id, result, error } => JsonRpcMessage::Response {
                jsonrpc: "2.0".to_string(),
                id: id.clone(),
                result: result.clone(),
                error: error.clone(),
            },
        }
    }

    /// Convert JSON-RPC message to MCP message.
    ///
    /// Malformed parameters for a known method yield an `INVALID_PARAMS` error.
    pub fn from_jsonrpc(jsonrpc: JsonRpcMessage) -> Result<Self, McpError> {
        match jsonrpc {
            JsonRpcMessage::Request { id: None, method, params, .. } => {
                Ok(McpMessage::Notification { method, params })
            }
            JsonRpcMessage::Request { id: Some(id), method, params, .. } => match method.as_str() {
                "initialize" => {
                    let params = match params {
                        Some(p) => serde_json::from_value(p).map_err(|e| {
                            McpError::new(JSONRPC_INVALID_PARAMS, format!("Invalid initialize params: {e}"))
                        })?,
                        None => InitializeParams::default(),
                    };
                    Ok(McpMessage::Initialize { id, params })
                }
                "ping" => Ok(McpMessage::Ping { id }),
                "tools/list" => Ok(McpMessage::ToolsList { id }),
                "tools/call" => {
                    let params = params
                        .ok_or_else(|| McpError::new(JSONRPC_INVALID_PARAMS, "Missing tool call params"))
                        .and_then(|p| {
                            serde_json::from_value(p).map_err(|e| {
                                McpError::new(JSONRPC_INVALID_PARAMS, format!("Invalid tool call params: {e}"))
                            })
                        })?;
                    Ok(McpMessage::ToolsCall { id, params })
                }
                _ => Ok(McpMessage::Unsupported { id, method }),
            },
            JsonRpcMessage::Response { id, result, error, .. } => {
                Ok(McpMessage::Response { id, result, error })
            }
        }
    }
}

impl JsonRpcMessage {
    pub fn error_response(id: RequestId, error: McpError) -> Self {
        JsonRpcMessage::Response {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request { id, .. } => id.as_ref(),
            JsonRpcMessage::Response { id, .. } => Some(id),
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Request { id: None, .. })
    }
}

/// Message handler trait for processing incoming MCP messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming MCP message
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>>;

    /// Liveness payload for transports that expose one
    async fn health(&self) -> Value {
        json!({ "status": "healthy", "version": crate::VERSION })
    }
}

/// Trait for all transport implementations
#[async_trait]
pub trait Transport {
    /// Start the transport and serve until it ends or is shut down
    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<()>;

    /// Stop the transport gracefully
    async fn shutdown(&self) -> Result<()>;
}

/// Route one decoded JSON value through `handler`.
///
/// Returns the reply to write back, or `None` for notifications.
pub async fn process_value(handler: &dyn MessageHandler, value: Value) -> Option<JsonRpcMessage> {
    let jsonrpc: JsonRpcMessage = match serde_json::from_value(value) {
        Ok(message) => message,
        Err(e) => {
            warn!("Invalid JSON-RPC message: {}", e);
            return Some(JsonRpcMessage::error_response(
                Value::Null,
                McpError::new(JSONRPC_INVALID_REQUEST, format!("Invalid request: {e}")),
            ));
        }
    };

    let id = jsonrpc.id().cloned();
    let notification = jsonrpc.is_notification();

    let message = match McpMessage::from_jsonrpc(jsonrpc) {
        Ok(message) => message,
        Err(err) => {
            warn!("Rejected request: {}", err.message);
            return id.map(|id| JsonRpcMessage::error_response(id, err));
        }
    };

    match handler.handle_message(message).await {
        Ok(Some(response)) => Some(response.to_jsonrpc()),
        Ok(None) => None,
        Err(e) => {
            error!("Handler error: {:#}", e);
            match (notification, id) {
                (false, Some(id)) => Some(JsonRpcMessage::error_response(
                    id,
                    McpError::new(JSONRPC_INTERNAL_ERROR, e.to_string()),
                )),
                _ => None,
            }
        }
    }
}

/// Route one line of text; malformed JSON gets a `PARSE_ERROR` reply.
pub async fn process_line(handler: &dyn MessageHandler, line: &str) -> Option<JsonRpcMessage> {
    debug!("Received line: {}", line);
    match serde_json::from_str::<Value>(line) {
        Ok(value) => process_value(handler, value).await,
        Err(e) => {
            warn!("Failed to parse JSON message: {} - Line: {}", e, line);
            Some(JsonRpcMessage::error_response(
                Value::Null,
                McpError::new(JSONRPC_PARSE_ERROR, format!("Parse error: {e}")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>> {
            match message {
                McpMessage::ToolsList { id } => Ok(Some(McpMessage::result(id, json!({"tools": []})))),
                McpMessage::Ping { .. } => Err(anyhow::anyhow!("boom")),
                _ => Ok(None),
            }
        }
    }

    fn error_code(message: &JsonRpcMessage) -> Option<i32> {
        match message {
            JsonRpcMessage::Response { error: Some(e), .. } => Some(e.code),
            _ => None,
        }
    }

    #[test]
    fn test_initialize_params_are_camel_case() {
        let message: JsonRpcMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }
        }))
        .unwrap();

        match McpMessage::from_jsonrpc(message).unwrap() {
            McpMessage::Initialize { params, .. } => {
                assert_eq!(params.client_info.unwrap().name, "test-client");
                assert_eq!(params.protocol_version.as_deref(), Some("2024-11-05"));
            }
            other => panic!("expected initialize, got {other:?}"),
        }
    }

    #[test]
    fn test_string_ids_are_preserved() {
        let message: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"tools/list"}"#).unwrap();
        let mcp = McpMessage::from_jsonrpc(message).unwrap();
        let reply = McpMessage::result(
            match mcp {
                McpMessage::ToolsList { id } => id,
                other => panic!("expected tools/list, got {other:?}"),
            },
            json!({}),
        );
        let text = serde_json::to_string(&reply.to_jsonrpc()).unwrap();
        assert!(text.contains(r#""id":"abc""#));
        assert!(!text.contains("error"));
    }

    #[test]
    fn test_missing_id_is_notification() {
        let message: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(message.is_notification());
        assert!(matches!(
            McpMessage::from_jsonrpc(message),
            Ok(McpMessage::Notification { .. })
        ));
    }

    #[test]
    fn test_tools_call_without_params_is_invalid() {
        let message: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call"}"#).unwrap();
        let err = McpMessage::from_jsonrpc(message).unwrap_err();
        assert_eq!(err.code, JSONRPC_INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_process_line_errors() {
        let parse = process_line(&Echo, "{not json").await.unwrap();
        assert_eq!(error_code(&parse), Some(JSONRPC_PARSE_ERROR));

        let invalid = process_line(&Echo, r#"{"hello":"world"}"#).await.unwrap();
        assert_eq!(error_code(&invalid), Some(JSONRPC_INVALID_REQUEST));

        let internal = process_line(&Echo, r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#).await.unwrap();
        assert_eq!(error_code(&internal), Some(JSONRPC_INTERNAL_ERROR));

        let note = process_line(&Echo, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
        assert!(note.is_none());

        let ok = process_line(&Echo, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await.unwrap();
        assert_eq!(error_code(&ok), None);
    }
}
