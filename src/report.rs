//! Markdown reports for call results
//!
//! [`render`] is total: every [`CallResult`] produces a report, and a fault
//! while formatting degrades to a short generic error report.

use std::fmt::{self, Write};

use serde_json::Value;
use tracing::error;

use crate::backend::messaging::SmsReceipt;
use crate::backend::patients::{self, PatientRecord};
use crate::backend::warehouse::QueryResult;
use crate::backend::{BackendMode, Integration};
use crate::cql::{CqlValidation, SqlConversion};
use crate::error::{FailureKind, ToolError};
use crate::tools::{CallResult, ToolFailure, ToolPayload};

/// Rows shown in a query report before eliding the rest
pub const MAX_TABLE_ROWS: usize = 10;

/// Characters of a message body shown in the sent-message listing
pub const PREVIEW_CHARS: usize = 50;

const FALLBACK_REPORT: &str = "## Error\n\n**Error Kind:** Internal\n**Error:** Failed to render tool result";

pub fn render(result: &CallResult) -> String {
    let mut out = String::new();
    let written = match result {
        CallResult::Success(payload) => write_payload(&mut out, payload),
        CallResult::Failure(failure) => write_failure(&mut out, failure),
    };
    match written {
        Ok(()) => out,
        Err(e) => {
            error!("Report formatting failed: {}", e);
            FALLBACK_REPORT.to_string()
        }
    }
}

fn write_payload(out: &mut String, payload: &ToolPayload) -> fmt::Result {
    match payload {
        ToolPayload::SmsSent(receipt) => write_sms_sent(out, receipt),
        ToolPayload::SentMessages(sent) => write_sent_messages(out, sent),
        ToolPayload::Query(result) => write_query(out, result),
        ToolPayload::Patient(record) => write_patient(out, record),
        ToolPayload::SqlConversion(conversion) => write_conversion(out, conversion),
        ToolPayload::CqlValidation(outcome) => write_cql_validation(out, outcome),
    }
}

fn write_sms_sent(out: &mut String, receipt: &SmsReceipt) -> fmt::Result {
    writeln!(out, "## SMS Notification Sent ✅")?;
    writeln!(out)?;
    writeln!(out, "**Mode:** {}", receipt.mode)?;
    writeln!(out, "**To:** {}", receipt.to)?;
    writeln!(out, "**Message SID:** {}", receipt.message_id)?;
    writeln!(out, "**Timestamp:** {}", receipt.timestamp)?;
    writeln!(out)?;
    writeln!(out, "### Message Content:")?;
    writeln!(out, "> {}", receipt.body)?;
    if let Some(note) = &receipt.note {
        write!(out, "\n*{note}*")?;
    }
    Ok(())
}

fn write_sent_messages(out: &mut String, sent: &[SmsReceipt]) -> fmt::Result {
    if sent.is_empty() {
        return write!(out, "## Sent Messages\n\nNo messages have been sent in this session.");
    }

    writeln!(out, "## Sent Messages ({} total)", sent.len())?;
    writeln!(out)?;
    for (i, message) in sent.iter().enumerate() {
        let mut preview: String = message.body.chars().take(PREVIEW_CHARS).collect();
        if message.body.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        writeln!(out, "### Message {}", i + 1)?;
        writeln!(out, "- **To:** {}", message.to)?;
        writeln!(out, "- **Status:** {}", message.status.as_str())?;
        writeln!(out, "- **Time:** {}", message.timestamp)?;
        writeln!(out, "- **Content:** {preview}")?;
        writeln!(out)?;
    }
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => s.replace('|', "\\|"),
        other => other.to_string(),
    }
}

fn write_query(out: &mut String, result: &QueryResult) -> fmt::Result {
    writeln!(out, "## Databricks Query Results")?;
    writeln!(out)?;
    writeln!(out, "**Status:** Success")?;
    writeln!(out, "**Rows Returned:** {}", result.row_count)?;
    if result.mode == BackendMode::Demo {
        writeln!(out, "**Mode:** Demo (mock data)")?;
    }

    if !result.rows.is_empty() {
        writeln!(out)?;
        writeln!(out, "### Results:")?;
        writeln!(out)?;
        writeln!(out, "| {} |", result.columns.join(" | "))?;
        writeln!(out, "| {} |", vec!["---"; result.columns.len()].join(" | "))?;
        for row in result.rows.iter().take(MAX_TABLE_ROWS) {
            let cells: Vec<String> = (0..result.columns.len())
                .map(|i| row.get(i).map(cell).unwrap_or_default())
                .collect();
            writeln!(out, "| {} |", cells.join(" | "))?;
        }
        if result.row_count > MAX_TABLE_ROWS {
            writeln!(out)?;
            writeln!(out, "*...and {} more rows*", result.row_count - MAX_TABLE_ROWS)?;
        }
    }

    if let Some(note) = &result.note {
        writeln!(out)?;
        writeln!(out, "*{note}*")?;
    }
    Ok(())
}

fn write_patient(out: &mut String, record: &PatientRecord) -> fmt::Result {
    let or = |value: &Option<String>, fallback: &'static str| {
        value.clone().unwrap_or_else(|| fallback.to_string())
    };

    writeln!(out, "## Patient Details (Firemetrics)")?;
    writeln!(out)?;
    writeln!(out, "**Patient ID:** {}", record.patient_id)?;
    writeln!(out, "**Preferred Name:** {}", or(&record.preferred_name, "N/A"))?;
    writeln!(out, "**Phone Number:** {}", or(&record.phone_number, "N/A"))?;
    writeln!(out, "**Preferred Language:** {}", or(&record.preferred_language, "English"))?;
    writeln!(out, "**Best Contact Time:** {}", or(&record.best_contact_time, "Any time"))?;
    if record.mode == BackendMode::Demo {
        write!(out, "\n*{}*", patients::DEMO_NOTE)?;
    }
    Ok(())
}

fn write_conversion(out: &mut String, conversion: &SqlConversion) -> fmt::Result {
    let dialect = conversion.dialect;
    writeln!(out, "## CQL to SQL Conversion Complete")?;
    writeln!(out)?;
    writeln!(out, "**Target Dialect:** {dialect}")?;
    writeln!(out, "**Conversion Status:** Success")?;
    writeln!(out)?;
    writeln!(out, "### Generated SQL:")?;
    writeln!(out)?;
    writeln!(out, "```sql")?;
    writeln!(out, "{}", conversion.sql)?;
    writeln!(out, "```")?;
    writeln!(out)?;
    writeln!(out, "### Conversion Notes:")?;
    writeln!(out, "- CQL clinical logic preserved in SQL CTEs (Common Table Expressions)")?;
    writeln!(out, "- FHIR resource paths mapped to SQL table/column references")?;
    writeln!(out, "- Terminology codes (SNOMED, LOINC, ICD) embedded for filtering")?;
    writeln!(out, "- Risk stratification logic included for patient prioritization")?;
    writeln!(out)?;
    writeln!(out, "*This SQL is ready for execution on your {dialect} platform.*")
}

fn write_cql_validation(out: &mut String, outcome: &CqlValidation) -> fmt::Result {
    let status = if outcome.valid { "Valid" } else { "Invalid" };
    writeln!(out, "## CQL Validation Result: {status}")?;
    writeln!(out)?;

    if !outcome.errors.is_empty() {
        writeln!(out, "### Errors:")?;
        for e in &outcome.errors {
            writeln!(out, "- {e}")?;
        }
    }
    if !outcome.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "### Warnings:")?;
        for w in &outcome.warnings {
            writeln!(out, "- {w}")?;
        }
    }
    if let Some(message) = &outcome.message {
        write!(out, "\n{message}")?;
    }
    Ok(())
}

fn remediation_hints(integration: Integration) -> &'static [&'static str] {
    match integration {
        Integration::Twilio => &[
            "Phone number format (should be +1XXXXXXXXXX)",
            "Twilio credentials are valid",
            "Twilio account has sufficient balance",
        ],
        Integration::Databricks => &[
            "DATABRICKS_HOST and DATABRICKS_TOKEN are valid",
            "DATABRICKS_WAREHOUSE (or DATABRICKS_HTTP_PATH) names a running SQL warehouse",
            "The query is valid Databricks SQL",
        ],
        Integration::Firemetrics => &[
            "FIREMETRICS_DB_HOST is reachable",
            "FIREMETRICS_DB_USER and FIREMETRICS_DB_PASSWORD are valid",
            "The patient table exists in the firemetrics database",
        ],
    }
}

fn failure_title(failure: &ToolFailure) -> String {
    match (&failure.error, failure.integration) {
        (ToolError::NotFound { entity, .. }, _) => format!("{entity} Not Found"),
        (ToolError::UnknownTool(_), _) => "Unknown Tool".to_string(),
        (ToolError::Integration(_), Some(Integration::Twilio)) => "SMS Failed ❌".to_string(),
        (ToolError::Integration(_), Some(Integration::Databricks)) => "Query Error".to_string(),
        (ToolError::Integration(_), Some(Integration::Firemetrics)) => "Lookup Error".to_string(),
        (ToolError::Integration(_), None) => "Integration Error".to_string(),
        (ToolError::Validation(_), _) => "Error".to_string(),
    }
}

fn write_failure(out: &mut String, failure: &ToolFailure) -> fmt::Result {
    writeln!(out, "## {}", failure_title(failure))?;
    writeln!(out)?;

    let kind = failure.error.kind();
    if kind == FailureKind::NotFound {
        return write!(out, "{}", failure.error);
    }

    writeln!(out, "**Operation:** {}", failure.tool)?;
    writeln!(out, "**Error Kind:** {kind}")?;
    writeln!(out, "**Error:** {}", failure.error)?;

    if let (FailureKind::IntegrationError, Some(integration)) = (kind, failure.integration) {
        writeln!(out)?;
        writeln!(out, "Please check:")?;
        for (i, hint) in remediation_hints(integration).iter().enumerate() {
            writeln!(out, "{}. {hint}", i + 1)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::messaging::DeliveryStatus;
    use crate::cql::{self, SqlDialect};
    use crate::error::{IntegrationError, ValidationError};
    use serde_json::json;

    fn receipt(body: &str) -> SmsReceipt {
        SmsReceipt {
            status: DeliveryStatus::Simulated,
            message_id: "SM_MOCK_20240101120000".into(),
            to: "+15550000000".into(),
            body: body.into(),
            timestamp: "2024-01-01T12:00:00.000000".into(),
            mode: BackendMode::Demo,
            note: Some("Demo mode - set TWILIO_* env vars to send real SMS".into()),
        }
    }

    fn failure(tool: &str, integration: Option<Integration>, error: ToolError) -> CallResult {
        CallResult::Failure(ToolFailure {
            tool: tool.into(),
            integration,
            error,
        })
    }

    #[test]
    fn test_sms_sent_report() {
        let report = render(&CallResult::Success(ToolPayload::SmsSent(receipt("Reminder"))));
        assert!(report.starts_with("## SMS Notification Sent ✅\n\n**Mode:** Demo\n"));
        assert!(report.contains("**Message SID:** SM_MOCK_20240101120000"));
        assert!(report.contains("### Message Content:\n> Reminder\n"));
        assert!(report.ends_with("\n*Demo mode - set TWILIO_* env vars to send real SMS*"));
    }

    #[test]
    fn test_sent_messages_report() {
        let empty = render(&CallResult::Success(ToolPayload::SentMessages(vec![])));
        assert_eq!(empty, "## Sent Messages\n\nNo messages have been sent in this session.");

        let long = "a".repeat(60);
        let report = render(&CallResult::Success(ToolPayload::SentMessages(vec![
            receipt("short"),
            receipt(&long),
        ])));
        assert!(report.starts_with("## Sent Messages (2 total)\n\n### Message 1\n"));
        assert!(report.contains("- **Content:** short\n"));
        assert!(report.contains(&format!("- **Content:** {}...\n", "a".repeat(50))));
        assert!(report.contains("- **Status:** simulated"));
    }

    #[test]
    fn test_query_report_limits_rows() {
        let rows: Vec<Vec<Value>> = (0..12).map(|i| vec![json!(i), Value::Null]).collect();
        let result = QueryResult {
            columns: vec!["n".into(), "missing".into()],
            rows,
            row_count: 12,
            mode: BackendMode::Live,
            note: None,
        };
        let report = render(&CallResult::Success(ToolPayload::Query(result)));
        assert!(report.contains("**Rows Returned:** 12"));
        assert!(!report.contains("**Mode:** Demo"));
        assert!(report.contains("| n | missing |\n| --- | --- |\n| 0 | None |"));
        assert!(report.contains("| 9 | None |"));
        assert!(!report.contains("| 10 | None |"));
        assert!(report.contains("*...and 2 more rows*"));
    }

    #[test]
    fn test_empty_demo_query_report() {
        let result = QueryResult {
            columns: vec![],
            rows: vec![],
            row_count: 0,
            mode: BackendMode::Demo,
            note: Some("Query executed (mock mode - no matching data)".into()),
        };
        let report = render(&CallResult::Success(ToolPayload::Query(result)));
        assert!(report.contains("**Rows Returned:** 0\n**Mode:** Demo (mock data)\n"));
        assert!(!report.contains("### Results:"));
        assert!(report.contains("*Query executed (mock mode - no matching data)*"));
    }

    #[test]
    fn test_patient_report_defaults() {
        let record = PatientRecord {
            patient_id: "abc".into(),
            preferred_name: None,
            phone_number: Some("+1555".into()),
            preferred_language: None,
            best_contact_time: None,
            mode: BackendMode::Live,
        };
        let report = render(&CallResult::Success(ToolPayload::Patient(record)));
        assert!(report.contains("**Preferred Name:** N/A"));
        assert!(report.contains("**Phone Number:** +1555"));
        assert!(report.contains("**Preferred Language:** English"));
        assert!(report.contains("**Best Contact Time:** Any time"));
        assert!(!report.contains("demo data"));
    }

    #[test]
    fn test_conversion_report() {
        let conversion = cql::translate("define X: true", SqlDialect::Snowflake);
        let report = render(&CallResult::Success(ToolPayload::SqlConversion(conversion)));
        assert!(report.contains("**Target Dialect:** snowflake"));
        assert!(report.contains("```sql\n-- Spark SQL: Generated from CQL expression"));
        assert!(report.contains("*This SQL is ready for execution on your snowflake platform.*"));
    }

    #[test]
    fn test_cql_validation_reports() {
        let invalid = render(&CallResult::Success(ToolPayload::CqlValidation(CqlValidation::check(""))));
        assert_eq!(
            invalid,
            "## CQL Validation Result: Invalid\n\n### Errors:\n- CQL expression cannot be empty\n"
        );

        let valid = render(&CallResult::Success(ToolPayload::CqlValidation(CqlValidation::check(
            "define X: true",
        ))));
        assert_eq!(
            valid,
            "## CQL Validation Result: Valid\n\n\n### Warnings:\n- Missing library declaration - recommended for production CQL\n\nCQL expression is syntactically valid"
        );
    }

    #[test]
    fn test_not_found_differs_from_integration_error() {
        let not_found = render(&failure(
            "lookup_patient_details",
            Some(Integration::Firemetrics),
            ToolError::NotFound { entity: "Patient", id: "does-not-exist".into() },
        ));
        assert_eq!(not_found, "## Patient Not Found\n\nNo patient found with ID: does-not-exist");

        let integration = render(&failure(
            "lookup_patient_details",
            Some(Integration::Firemetrics),
            IntegrationError::Misconfigured("connection refused".into()).into(),
        ));
        assert!(integration.starts_with("## Lookup Error\n\n"));
        assert!(integration.contains("**Error Kind:** IntegrationError"));
        assert!(integration.contains("Please check:\n1. FIREMETRICS_DB_HOST is reachable"));
        assert_ne!(not_found, integration);
    }

    #[test]
    fn test_sms_failure_hints() {
        let report = render(&failure(
            "send_sms_notification",
            Some(Integration::Twilio),
            IntegrationError::Api { service: "Twilio", status: 401, message: "Authenticate".into() }.into(),
        ));
        assert!(report.starts_with("## SMS Failed ❌"));
        assert!(report.contains("**Operation:** send_sms_notification"));
        assert!(report.contains("**Error:** Twilio API returned 401: Authenticate"));
        assert!(report.contains("1. Phone number format (should be +1XXXXXXXXXX)"));
    }

    #[test]
    fn test_validation_and_unknown_tool_reports() {
        let report = render(&failure(
            "send_sms_notification",
            Some(Integration::Twilio),
            ValidationError::MissingParameter("phone_number".into()).into(),
        ));
        assert!(report.starts_with("## Error\n\n"));
        assert!(report.contains("**Error Kind:** ValidationError"));
        assert!(report.contains("Missing required parameter 'phone_number'"));
        assert!(!report.contains("Please check"));

        let report = render(&failure("no_such_tool", None, ToolError::UnknownTool("no_such_tool".into())));
        assert!(report.starts_with("## Unknown Tool\n\n**Operation:** no_such_tool\n**Error Kind:** UnknownTool"));
    }
}
