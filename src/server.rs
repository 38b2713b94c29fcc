//! Tool server: registry lookup, validation, dispatch and report rendering

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub use crate::config::ServerKind;

use crate::backend::messaging::{MessagingBackend, MockMessaging, TwilioMessaging};
use crate::backend::patients::{FiremetricsStore, MockPatientStore, PatientDirectory};
use crate::backend::warehouse::{DatabricksWarehouse, MockWarehouse, WarehouseBackend};
use crate::backend::{BackendMode, FallbackPolicy, Integration};
use crate::config::IntegrationsConfig;
use crate::error::ToolError;
use crate::report;
use crate::session::SessionState;
use crate::tools::{self, CallResult, InputValidator, ToolDescriptor, ToolFailure, ToolRegistry};
use crate::transport::{JSONRPC_INVALID_PARAMS, McpError, McpMessage, MessageHandler, PROTOCOL_VERSION};

/// Rendered outcome of one `tools/call`
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutput {
    pub text: String,
    pub is_error: bool,
}

/// One tool server process: a fixed catalogue bound to policy-selected backends
pub struct ToolServer {
    kind: ServerKind,
    registry: ToolRegistry,
    policy: FallbackPolicy,
    session: SessionState,
    validator: InputValidator,
    // held for the whole of a call so calls never overlap
    dispatch: Mutex<()>,
}

impl ToolServer {
    /// Assemble a server around an existing registry
    pub fn new(kind: ServerKind, registry: ToolRegistry, policy: FallbackPolicy, session: SessionState) -> Self {
        Self {
            kind,
            registry,
            policy,
            session,
            validator: InputValidator::default(),
            dispatch: Mutex::new(()),
        }
    }

    pub fn with_validator(mut self, validator: InputValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Build the catalogue for `kind`, choosing live or demo backends once from
    /// `integrations`.
    pub fn build(
        kind: ServerKind,
        integrations: &IntegrationsConfig,
        session: SessionState,
        adapter_timeout: Option<Duration>,
    ) -> Result<Self> {
        let policy = FallbackPolicy::from_config(integrations);
        policy.log_modes(Self::integrations_for(kind));

        let catalogue = match kind {
            ServerKind::Messaging => {
                let backend: Arc<dyn MessagingBackend> = match policy.resolve_backend(Integration::Twilio) {
                    BackendMode::Live => Arc::new(TwilioMessaging::new(&integrations.twilio)),
                    BackendMode::Demo => Arc::new(MockMessaging::new(session.clone())),
                };
                tools::messaging::catalogue(backend, session.clone(), adapter_timeout)
            }
            ServerKind::Transform => tools::transform::catalogue(),
            ServerKind::Data => {
                let warehouse: Arc<dyn WarehouseBackend> = match policy.resolve_backend(Integration::Databricks) {
                    BackendMode::Live => Arc::new(DatabricksWarehouse::new(&integrations.databricks)),
                    BackendMode::Demo => Arc::new(MockWarehouse),
                };
                let directory: Arc<dyn PatientDirectory> = match policy.resolve_backend(Integration::Firemetrics) {
                    BackendMode::Live => Arc::new(FiremetricsStore::new(&integrations.firemetrics)),
                    BackendMode::Demo => Arc::new(MockPatientStore),
                };
                tools::data::catalogue(warehouse, directory, adapter_timeout)
            }
        };

        let registry = ToolRegistry::new(catalogue).context("Failed to assemble tool registry")?;
        info!(server = kind.server_name(), tools = registry.len(), "Tool registry built");
        Ok(Self::new(kind, registry, policy, session))
    }

    /// Integrations a server kind depends on
    pub fn integrations_for(kind: ServerKind) -> &'static [Integration] {
        match kind {
            ServerKind::Messaging => &[Integration::Twilio],
            ServerKind::Transform => &[],
            ServerKind::Data => &[Integration::Databricks, Integration::Firemetrics],
        }
    }

    pub fn kind(&self) -> ServerKind {
        self.kind
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn backend_mode(&self, integration: Integration) -> BackendMode {
        self.policy.resolve_backend(integration)
    }

    /// Descriptors in declaration order
    pub fn list_tools(&self) -> Vec<&ToolDescriptor> {
        self.registry.list_tools()
    }

    /// Look up, validate and run one tool. Never fails: every problem becomes
    /// a [`CallResult::Failure`].
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> CallResult {
        let _turn = self.dispatch.lock().await;

        let Some(tool) = self.registry.get(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return CallResult::Failure(ToolFailure {
                tool: name.to_string(),
                integration: None,
                error: ToolError::UnknownTool(name.to_string()),
            });
        };

        let outcome = match self.validator.validate(tool.descriptor(), arguments) {
            Ok(args) => tool.invoke(args).await,
            Err(e) => {
                debug!(tool = %name, error = %e, "Arguments rejected");
                Err(e.into())
            }
        };

        match outcome {
            Ok(payload) => {
                info!(tool = %name, "Tool call succeeded");
                CallResult::Success(payload)
            }
            Err(error) => {
                warn!(tool = %name, kind = %error.kind(), error = %error, "Tool call failed");
                CallResult::Failure(ToolFailure {
                    tool: name.to_string(),
                    integration: tool.integration(),
                    error,
                })
            }
        }
    }

    /// Run a call and render its report
    pub async fn call_tool_rendered(&self, name: &str, arguments: Option<Value>) -> ToolCallOutput {
        let call_id = Uuid::new_v4();
        let span = info_span!("tool_call", %call_id, tool = %name);

        async {
            let result = self.call_tool(name, arguments).await;
            ToolCallOutput {
                text: report::render(&result),
                is_error: result.failure_kind().is_some_and(|kind| kind.is_error()),
            }
        }
        .instrument(span)
        .await
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.kind.server_name(),
                "version": crate::VERSION
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        })
    }
}

#[async_trait]
impl MessageHandler for ToolServer {
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>> {
        match message {
            McpMessage::Initialize { id, params } => {
                let client = params
                    .client_info
                    .as_ref()
                    .map(|c| c.name.as_str())
                    .unwrap_or("unknown");
                info!("Received initialize request from client: {}", client);
                Ok(Some(McpMessage::result(id, self.initialize_result())))
            }

            McpMessage::Ping { id } => Ok(Some(McpMessage::result(id, json!({})))),

            McpMessage::ToolsList { id } => {
                debug!("Received tools list request");
                let tools: Vec<Value> = self.list_tools().iter().map(|d| d.to_json()).collect();
                Ok(Some(McpMessage::result(id, json!({ "tools": tools }))))
            }

            McpMessage::ToolsCall { id, params } => {
                if params.name.is_empty() {
                    return Ok(Some(McpMessage::error(
                        id,
                        McpError::new(JSONRPC_INVALID_PARAMS, "Tool name must not be empty"),
                    )));
                }
                let output = self.call_tool_rendered(&params.name, params.arguments).await;

                let mut result = json!({
                    "content": [
                        {
                            "type": "text",
                            "text": output.text
                        }
                    ]
                });
                if output.is_error {
                    result["isError"] = json!(true);
                }
                Ok(Some(McpMessage::result(id, result)))
            }

            McpMessage::Unsupported { id, method } => {
                warn!("Unsupported method: {}", method);
                Ok(Some(McpMessage::error(id, McpError::method_not_found(&method))))
            }

            McpMessage::Notification { method, .. } => {
                debug!("Received notification: {}", method);
                Ok(None)
            }

            McpMessage::Response { .. } => {
                // this server never issues requests
                warn!("Received unexpected response message");
                Ok(None)
            }
        }
    }

    async fn health(&self) -> Value {
        let integrations: serde_json::Map<String, Value> = Self::integrations_for(self.kind)
            .iter()
            .map(|i| (i.as_str().to_string(), json!(self.backend_mode(*i))))
            .collect();

        json!({
            "status": "healthy",
            "server": self.kind.server_name(),
            "version": crate::VERSION,
            "tools": self.registry.len(),
            "integrations": integrations,
            "sent_messages": self.session.sent_count().await,
            "timestamp": chrono::Utc::now()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::tools::ToolPayload;
    use crate::transport::{InitializeParams, RequestId, ToolsCallParams};

    fn demo_server(kind: ServerKind) -> ToolServer {
        ToolServer::build(kind, &IntegrationsConfig::default(), SessionState::new(), None).unwrap()
    }

    fn tool_names(server: &ToolServer) -> Vec<String> {
        server.list_tools().iter().map(|d| d.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_catalogues() {
        assert_eq!(
            tool_names(&demo_server(ServerKind::Messaging)),
            vec!["send_sms_notification", "get_sent_messages"]
        );
        assert_eq!(
            tool_names(&demo_server(ServerKind::Transform)),
            vec!["convert_cql_to_sql", "validate_cql"]
        );
        assert_eq!(
            tool_names(&demo_server(ServerKind::Data)),
            vec!["execute_databricks_sql", "lookup_patient_details"]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let server = demo_server(ServerKind::Transform);
        let result = server.call_tool("no_such_tool", Some(json!({}))).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::UnknownTool));
    }

    #[tokio::test]
    async fn test_default_dialect_applied() {
        let server = demo_server(ServerKind::Transform);
        let result = server
            .call_tool("convert_cql_to_sql", Some(json!({"cql_logic": "define X: true"})))
            .await;
        match result.payload() {
            Some(ToolPayload::SqlConversion(conversion)) => {
                assert_eq!(conversion.dialect.as_str(), "spark-sql");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_validate_cql_is_a_report_not_a_failure() {
        let server = demo_server(ServerKind::Transform);
        let output = server
            .call_tool_rendered("validate_cql", Some(json!({"cql_expression": ""})))
            .await;
        assert!(!output.is_error);
        assert!(output.text.starts_with("## CQL Validation Result: Invalid"));
    }

    #[tokio::test]
    async fn test_handle_tools_call_sets_is_error() {
        let server = demo_server(ServerKind::Messaging);
        let response = server
            .handle_message(McpMessage::ToolsCall {
                id: RequestId::from(7),
                params: ToolsCallParams {
                    name: "send_sms_notification".into(),
                    arguments: Some(json!({"phone_number": "+15550000000"})),
                },
            })
            .await
            .unwrap()
            .unwrap();

        match response {
            McpMessage::Response { result: Some(result), error: None, .. } => {
                assert_eq!(result["isError"], json!(true));
                let text = result["content"][0]["text"].as_str().unwrap();
                assert!(text.contains("Message body is required"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(server.session().sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_initialize_advertises_server_name() {
        let server = demo_server(ServerKind::Data);
        let response = server
            .handle_message(McpMessage::Initialize {
                id: RequestId::from(1),
                params: InitializeParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        match response {
            McpMessage::Response { result: Some(result), .. } => {
                assert_eq!(result["serverInfo"]["name"], "data-platform");
                assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_health_reports_modes() {
        let server = demo_server(ServerKind::Data);
        let health = server.health().await;
        assert_eq!(health["integrations"]["databricks"], "Demo");
        assert_eq!(health["integrations"]["firemetrics"], "Demo");
        assert_eq!(health["tools"], 2);
    }
}
