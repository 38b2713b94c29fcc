//! Data catalogue: `execute_databricks_sql` and `lookup_patient_details`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::registry::{ParamSpec, ParamType, Tool, ToolDescriptor};
use super::{ToolPayload, ValidatedArguments};
use crate::backend::patients::PatientDirectory;
use crate::backend::warehouse::WarehouseBackend;
use crate::backend::{Integration, with_deadline};
use crate::error::ToolError;

pub const EXECUTE_DATABRICKS_SQL: &str = "execute_databricks_sql";
pub const LOOKUP_PATIENT_DETAILS: &str = "lookup_patient_details";

const EXECUTE_DESCRIPTION: &str = "Execute a SQL query on Databricks SQL Warehouse.

Use this for analytics queries on FHIR data:
- Quality measure calculations (CMS measures)
- Risk stratification queries
- Population health analytics
- Care gap identification

The Databricks warehouse contains flattened FHIR data in tables like:
- patient, encounter, observation, condition, procedure
- Pre-computed measure views (e.g., cms125_measure_report)

Returns query results with columns and data rows.";

const LOOKUP_DESCRIPTION: &str = "Look up patient contact information from Firemetrics.

Firemetrics provides fast PostgreSQL-based access to FHIR patient data.
Use this to retrieve:
- Patient's preferred name
- Phone number for outreach
- Preferred language for communication
- Best time to contact

This is typically used after identifying patients from a Databricks
analytics query, to get their contact details for care management.";

pub struct ExecuteSqlTool {
    descriptor: ToolDescriptor,
    warehouse: Arc<dyn WarehouseBackend>,
    deadline: Option<Duration>,
}

impl ExecuteSqlTool {
    pub fn new(warehouse: Arc<dyn WarehouseBackend>, deadline: Option<Duration>) -> Self {
        let descriptor = ToolDescriptor::new(EXECUTE_DATABRICKS_SQL, EXECUTE_DESCRIPTION).param(
            ParamSpec::required("sql_query", ParamType::String, "The SQL query to execute on Databricks"),
        );
        Self { descriptor, warehouse, deadline }
    }
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn integration(&self) -> Option<Integration> {
        Some(Integration::Databricks)
    }

    async fn invoke(&self, args: ValidatedArguments) -> Result<ToolPayload, ToolError> {
        let query = args.str("sql_query")?;
        let result = with_deadline(self.deadline, EXECUTE_DATABRICKS_SQL, self.warehouse.execute(query)).await?;
        Ok(ToolPayload::Query(result))
    }
}

pub struct LookupPatientTool {
    descriptor: ToolDescriptor,
    directory: Arc<dyn PatientDirectory>,
    deadline: Option<Duration>,
}

impl LookupPatientTool {
    pub fn new(directory: Arc<dyn PatientDirectory>, deadline: Option<Duration>) -> Self {
        let descriptor = ToolDescriptor::new(LOOKUP_PATIENT_DETAILS, LOOKUP_DESCRIPTION).param(
            ParamSpec::required("patient_id", ParamType::String, "The FHIR Patient resource ID"),
        );
        Self { descriptor, directory, deadline }
    }
}

#[async_trait]
impl Tool for LookupPatientTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn integration(&self) -> Option<Integration> {
        Some(Integration::Firemetrics)
    }

    async fn invoke(&self, args: ValidatedArguments) -> Result<ToolPayload, ToolError> {
        let patient_id = args.str("patient_id")?;
        let record = with_deadline(self.deadline, LOOKUP_PATIENT_DETAILS, self.directory.get(patient_id)).await?;

        record
            .map(ToolPayload::Patient)
            .ok_or_else(|| ToolError::NotFound {
                entity: "Patient",
                id: patient_id.to_string(),
            })
    }
}

/// Tools served by the data server, in listing order
pub fn catalogue(
    warehouse: Arc<dyn WarehouseBackend>,
    directory: Arc<dyn PatientDirectory>,
    deadline: Option<Duration>,
) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(ExecuteSqlTool::new(warehouse, deadline)),
        Box::new(LookupPatientTool::new(directory, deadline)),
    ]
}
