//! Analytics queries: Databricks SQL Statement Execution API or demo rows

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::BackendMode;
use crate::config::DatabricksConfig;
use crate::error::IntegrationError;
use crate::fixtures::DEMO_PATIENTS;

pub const DEMO_MATCH_NOTE: &str = "Using mock data - set DATABRICKS_* env vars for real connection";
pub const DEMO_EMPTY_NOTE: &str = "Query executed (mock mode - no matching data)";

/// Keywords that make the demo warehouse answer with the risk cohort
const DEMO_KEYWORDS: [&str; 3] = ["patient", "risk", "gap"];

const DEMO_COLUMNS: [&str; 8] = [
    "PatientID",
    "patient_name",
    "RiskScore",
    "GapStatus",
    "last_hba1c_date",
    "last_hba1c_value",
    "days_overdue",
    "glycemic_control",
];

/// Tabular query output; each row is aligned with `columns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub mode: BackendMode,
    pub note: Option<String>,
}

#[async_trait]
pub trait WarehouseBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    async fn execute(&self, query: &str) -> Result<QueryResult, IntegrationError>;
}

/// Demo warehouse answering keyword-matched queries with the fixture cohort
#[derive(Debug, Clone, Default)]
pub struct MockWarehouse;

#[async_trait]
impl WarehouseBackend for MockWarehouse {
    fn mode(&self) -> BackendMode {
        BackendMode::Demo
    }

    async fn execute(&self, query: &str) -> Result<QueryResult, IntegrationError> {
        let lowered = query.to_lowercase();
        if !DEMO_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            debug!("Demo query matched no keyword");
            return Ok(QueryResult {
                columns: Vec::new(),
                rows: Vec::new(),
                row_count: 0,
                mode: BackendMode::Demo,
                note: Some(DEMO_EMPTY_NOTE.to_string()),
            });
        }

        let rows: Vec<Vec<Value>> = DEMO_PATIENTS
            .iter()
            .map(|p| {
                vec![
                    json!(p.patient_id),
                    json!(p.patient_name),
                    json!(p.risk_score),
                    json!(p.gap_status),
                    json!(p.last_hba1c_date),
                    json!(p.last_hba1c_value),
                    json!(p.days_overdue),
                    json!(p.glycemic_control),
                ]
            })
            .collect();

        Ok(QueryResult {
            columns: DEMO_COLUMNS.iter().map(|c| c.to_string()).collect(),
            row_count: rows.len(),
            rows,
            mode: BackendMode::Demo,
            note: Some(DEMO_MATCH_NOTE.to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    wait_timeout: &'a str,
    on_wait_timeout: &'a str,
    disposition: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: Option<String>,
    status: StatementStatus,
    manifest: Option<Manifest>,
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    schema: Option<ManifestSchema>,
    total_row_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Live warehouse over `POST /api/2.0/sql/statements`.
///
/// Results are requested inline as JSON arrays; a statement still running after
/// the server-side wait is cancelled and reported as a failure. An incomplete
/// configuration is kept and reported on every call.
#[derive(Debug, Clone)]
pub struct DatabricksWarehouse {
    endpoint: Result<StatementEndpoint, String>,
}

#[derive(Debug, Clone)]
struct StatementEndpoint {
    client: reqwest::Client,
    base_url: String,
    token: String,
    warehouse_id: String,
}

impl StatementEndpoint {
    fn from_config(config: &DatabricksConfig) -> Result<Self, IntegrationError> {
        let (Some(base_url), Some(token)) = (config.base_url(), config.token.clone()) else {
            return Err(IntegrationError::Misconfigured(
                "DATABRICKS_HOST and DATABRICKS_TOKEN must be set".to_string(),
            ));
        };
        let Some(warehouse_id) = config.resolved_warehouse_id() else {
            return Err(IntegrationError::Misconfigured(
                "Set DATABRICKS_WAREHOUSE or DATABRICKS_HTTP_PATH to select a SQL warehouse".to_string(),
            ));
        };

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url,
            token,
            warehouse_id,
        })
    }

    fn statements_url(&self) -> String {
        format!("{}/api/2.0/sql/statements", self.base_url)
    }
}

impl DatabricksWarehouse {
    pub fn new(config: &DatabricksConfig) -> Self {
        let endpoint = StatementEndpoint::from_config(config).map_err(|e| e.to_string());
        if let Err(reason) = &endpoint {
            warn!(%reason, "Databricks adapter is incomplete; queries will fail");
        }
        Self { endpoint }
    }
}

#[async_trait]
impl WarehouseBackend for DatabricksWarehouse {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn execute(&self, query: &str) -> Result<QueryResult, IntegrationError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .map_err(|reason| IntegrationError::Misconfigured(reason.clone()))?;
        debug!(warehouse_id = %endpoint.warehouse_id, "Submitting Databricks statement");

        let response = endpoint
            .client
            .post(endpoint.statements_url())
            .bearer_auth(&endpoint.token)
            .json(&StatementRequest {
                statement: query,
                warehouse_id: &endpoint.warehouse_id,
                wait_timeout: "30s",
                on_wait_timeout: "CANCEL",
                disposition: "INLINE",
                format: "JSON_ARRAY",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });
            return Err(IntegrationError::Api {
                service: "Databricks",
                status: status.as_u16(),
                message,
            });
        }

        let body: StatementResponse = response.json().await?;
        if body.status.state != "SUCCEEDED" {
            return Err(IntegrationError::Statement {
                statement_id: body.statement_id.unwrap_or_else(|| "unknown".to_string()),
                message: body
                    .status
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "statement did not succeed".to_string()),
                state: body.status.state,
            });
        }

        let columns: Vec<String> = body
            .manifest
            .as_ref()
            .and_then(|m| m.schema.as_ref())
            .map(|s| s.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        let rows = body.result.map(|r| r.data_array).unwrap_or_default();
        let row_count = body
            .manifest
            .and_then(|m| m.total_row_count)
            .unwrap_or(rows.len());

        info!(row_count, "Databricks statement succeeded");
        Ok(QueryResult {
            columns,
            rows,
            row_count,
            mode: BackendMode::Live,
            note: None,
        })
    }
}
