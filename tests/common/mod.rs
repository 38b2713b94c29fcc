#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use caregap_mcp::backend::BackendMode;
use caregap_mcp::backend::messaging::{DeliveryStatus, MessagingBackend, SmsReceipt};
use caregap_mcp::backend::warehouse::{QueryResult, WarehouseBackend};
use caregap_mcp::config::{IntegrationsConfig, ServerKind};
use caregap_mcp::error::IntegrationError;
use caregap_mcp::transport::stdio::serve_io;
use caregap_mcp::transport::{JsonRpcMessage, MessageHandler};
use caregap_mcp::{SessionState, ToolServer};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, WriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Test utilities for integration testing
pub mod test_utils {
    use super::*;

    /// Server of `kind` with every integration in demo mode
    pub fn demo_server(kind: ServerKind) -> ToolServer {
        ToolServer::build(kind, &IntegrationsConfig::default(), SessionState::new(), None)
            .expect("demo server builds")
    }

    /// Integrations config assembled from literal `(name, value)` pairs
    pub fn integrations(vars: &[(&str, &str)]) -> IntegrationsConfig {
        IntegrationsConfig::from_lookup(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
    }

    pub fn initialize_request(id: i64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }
        })
    }

    pub fn tools_list_request(id: i64) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": "tools/list"})
    }

    pub fn tool_call_request(id: i64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        })
    }

    /// Text of the first content block of a `tools/call` response
    pub fn content_text(response: &Value) -> &str {
        response["result"]["content"][0]["text"]
            .as_str()
            .expect("tool result carries text content")
    }
}

/// Messaging backend that counts sends and always succeeds
#[derive(Default)]
pub struct CountingMessaging {
    pub sends: AtomicUsize,
}

impl CountingMessaging {
    pub fn count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingBackend for CountingMessaging {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, IntegrationError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SmsReceipt {
            status: DeliveryStatus::Sent,
            message_id: format!("SM_COUNT_{n}"),
            to: to.to_string(),
            body: body.to_string(),
            timestamp: "2025-01-01T00:00:00.000000".to_string(),
            mode: BackendMode::Live,
            note: None,
        })
    }
}

/// Warehouse that never answers
pub struct StalledWarehouse;

#[async_trait]
impl WarehouseBackend for StalledWarehouse {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn execute(&self, _query: &str) -> Result<QueryResult, IntegrationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(IntegrationError::Misconfigured("unreachable".to_string()))
    }
}

/// In-process stdio client talking to a server loop over duplex pipes
pub struct StdioClient {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl StdioClient {
    pub fn spawn(handler: Arc<dyn MessageHandler>) -> Self {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(serve_io(server_read, server_write, handler, rx));

        Self {
            writer: client_write,
            lines: BufReader::new(client_read).lines(),
            shutdown,
            task,
        }
    }

    pub async fn send_raw(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send(&mut self, message: &Value) -> Result<()> {
        self.send_raw(&serde_json::to_string(message)?).await
    }

    pub async fn recv(&mut self) -> Result<Value> {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .map_err(|_| anyhow!("Timeout waiting for response"))??
            .ok_or_else(|| anyhow!("Server closed the stream"))?;
        Ok(serde_json::from_str(&line)?)
    }

    pub async fn request(&mut self, message: &Value) -> Result<Value> {
        self.send(message).await?;
        self.recv().await
    }

    /// Close the input side and wait for the loop to finish
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        drop(self.writer);
        self.task.await?
    }

    pub async fn stop(self) -> Result<()> {
        self.shutdown.send_replace(true);
        self.task.await?
    }
}

/// Test assertions
pub mod assertions {
    use super::*;

    pub fn assert_success_response(message: &Value) {
        assert_eq!(message["jsonrpc"], "2.0");
        assert!(message.get("result").is_some(), "expected result in {message}");
        assert!(message.get("error").is_none(), "unexpected error in {message}");
    }

    pub fn assert_error_response(message: &Value, code: i64) {
        assert_eq!(message["jsonrpc"], "2.0");
        assert!(message.get("result").is_none(), "unexpected result in {message}");
        assert_eq!(message["error"]["code"], code, "wrong error code in {message}");
    }

    /// `isError` present and true
    pub fn assert_tool_error(response: &Value) {
        assert_success_response(response);
        assert_eq!(response["result"]["isError"], true, "expected isError in {response}");
    }

    /// `isError` absent or false
    pub fn assert_tool_ok(response: &Value) {
        assert_success_response(response);
        assert_ne!(response["result"]["isError"], true, "unexpected isError in {response}");
    }

    pub fn assert_error_kind(text: &str, kind: &str) {
        assert!(
            text.contains(&format!("**Error Kind:** {kind}")),
            "expected error kind {kind} in report:\n{text}"
        );
    }

    pub fn assert_jsonrpc_error(message: &JsonRpcMessage, code: i32) {
        match message {
            JsonRpcMessage::Response { error: Some(error), .. } => assert_eq!(error.code, code),
            other => panic!("expected error response, got {other:?}"),
        }
    }
}
