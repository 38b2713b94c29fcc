//! Tool catalogues and the call result model
//!
//! Each server owns one [`ToolRegistry`] built from one of the catalogues in
//! [`messaging`], [`transform`] or [`data`].

pub mod data;
pub mod messaging;
pub mod registry;
pub mod transform;
pub mod validation;

pub use registry::{ParamSpec, ParamType, Tool, ToolDescriptor, ToolRegistry};
pub use validation::{InputValidator, ValidatedArguments, ValidationConfig};

use crate::backend::Integration;
use crate::backend::messaging::SmsReceipt;
use crate::backend::patients::PatientRecord;
use crate::backend::warehouse::QueryResult;
use crate::cql::{CqlValidation, SqlConversion};
use crate::error::{FailureKind, ToolError};

/// Structured output of a successful call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    SmsSent(SmsReceipt),
    SentMessages(Vec<SmsReceipt>),
    Query(QueryResult),
    Patient(PatientRecord),
    SqlConversion(SqlConversion),
    CqlValidation(CqlValidation),
}

/// A failed call, tagged with the tool that was asked for
#[derive(Debug)]
pub struct ToolFailure {
    pub tool: String,
    pub integration: Option<Integration>,
    pub error: ToolError,
}

/// Outcome of exactly one tool call
#[derive(Debug)]
pub enum CallResult {
    Success(ToolPayload),
    Failure(ToolFailure),
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }

    pub fn payload(&self) -> Option<&ToolPayload> {
        match self {
            CallResult::Success(payload) => Some(payload),
            CallResult::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CallResult::Success(_) => None,
            CallResult::Failure(failure) => Some(failure.error.kind()),
        }
    }
}
