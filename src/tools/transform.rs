//! Transform catalogue: `convert_cql_to_sql` and `validate_cql`

use async_trait::async_trait;
use serde_json::json;

use super::registry::{ParamSpec, ParamType, Tool, ToolDescriptor};
use super::{ToolPayload, ValidatedArguments};
use crate::cql::{self, CqlValidation, SqlDialect};
use crate::error::{ToolError, ValidationError};

pub const CONVERT_CQL_TO_SQL: &str = "convert_cql_to_sql";
pub const VALIDATE_CQL: &str = "validate_cql";

const CONVERT_DESCRIPTION: &str = "Convert Clinical Quality Language (CQL) to executable SQL.

CQL is the healthcare industry standard for expressing clinical logic in a
human-readable format. This tool transpiles CQL to SQL for execution on
data platforms like Databricks, Snowflake, or BigQuery.

The generated SQL includes:
- Patient cohort identification
- Clinical condition filtering using SNOMED/ICD codes
- Observation/lab result analysis using LOINC codes
- Risk stratification logic
- Measure calculation (numerator/denominator)

Supported dialects: spark-sql, snowflake, bigquery, postgresql";

const VALIDATE_DESCRIPTION: &str = "Validate a CQL (Clinical Quality Language) expression for syntax errors.

Checks the CQL expression for:
- Proper library and using declarations
- Valid define statements
- Correct function syntax
- Type compatibility

Returns validation status and any warnings or errors.";

pub struct ConvertCqlTool {
    descriptor: ToolDescriptor,
}

impl ConvertCqlTool {
    pub fn new() -> Self {
        let descriptor = ToolDescriptor::new(CONVERT_CQL_TO_SQL, CONVERT_DESCRIPTION)
            .param(ParamSpec::required(
                "cql_logic",
                ParamType::String,
                "The CQL expression or measure logic to convert",
            ))
            .param(
                ParamSpec::optional(
                    "target_dialect",
                    ParamType::String,
                    "Target SQL dialect (default: spark-sql)",
                )
                .one_of(&SqlDialect::NAMES)
                .with_default(json!(SqlDialect::default().as_str())),
            );
        Self { descriptor }
    }
}

impl Default for ConvertCqlTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ConvertCqlTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: ValidatedArguments) -> Result<ToolPayload, ToolError> {
        let cql_logic = args.str("cql_logic")?;
        let requested = args.str("target_dialect")?;
        let dialect: SqlDialect = requested.parse().map_err(|_| ValidationError::InvalidValue {
            name: "target_dialect".to_string(),
            value: requested.to_string(),
            allowed: SqlDialect::NAMES.iter().map(|d| d.to_string()).collect(),
        })?;

        Ok(ToolPayload::SqlConversion(cql::translate(cql_logic, dialect)))
    }
}

pub struct ValidateCqlTool {
    descriptor: ToolDescriptor,
}

impl ValidateCqlTool {
    pub fn new() -> Self {
        let descriptor = ToolDescriptor::new(VALIDATE_CQL, VALIDATE_DESCRIPTION).param(ParamSpec::required(
            "cql_expression",
            ParamType::String,
            "The CQL expression to validate",
        ));
        Self { descriptor }
    }
}

impl Default for ValidateCqlTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ValidateCqlTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: ValidatedArguments) -> Result<ToolPayload, ToolError> {
        let expression = args.str("cql_expression")?;
        Ok(ToolPayload::CqlValidation(CqlValidation::check(expression)))
    }
}

/// Tools served by the transform server, in listing order
pub fn catalogue() -> Vec<Box<dyn Tool>> {
    vec![Box::new(ConvertCqlTool::new()), Box::new(ValidateCqlTool::new())]
}
