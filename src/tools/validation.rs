//! Argument validation against a tool's declared input shape

use serde_json::{Map, Value};

use super::registry::ToolDescriptor;
use crate::error::ValidationError;

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Upper bound on any string argument, in characters
    pub max_string_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_string_length: 64 * 1024,
        }
    }
}

/// Arguments that passed validation, with declared defaults filled in.
///
/// Parameters the descriptor does not mention are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArguments {
    values: Map<String, Value>,
}

impl ValidatedArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// String argument by name. Absent or non-string values read as missing.
    pub fn str(&self, name: &str) -> Result<&str, ValidationError> {
        self.values
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::MissingParameter(name.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    config: ValidationConfig,
}

impl InputValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Check `arguments` against `descriptor`, parameter by parameter in
    /// declared order; the first violation is returned. `None` and JSON
    /// `null` are treated as an empty object.
    pub fn validate(
        &self,
        descriptor: &ToolDescriptor,
        arguments: Option<Value>,
    ) -> Result<ValidatedArguments, ValidationError> {
        let mut values = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ValidationError::NotAnObject),
        };

        for spec in &descriptor.params {
            let present = values.get(&spec.name).filter(|v| !v.is_null());

            let Some(value) = present else {
                if spec.required {
                    return Err(match &spec.required_message {
                        Some(message) => ValidationError::Required {
                            name: spec.name.clone(),
                            message: message.clone(),
                        },
                        None => ValidationError::MissingParameter(spec.name.clone()),
                    });
                }
                match &spec.default {
                    Some(default) => {
                        values.insert(spec.name.clone(), default.clone());
                    }
                    None => {
                        values.remove(&spec.name);
                    }
                }
                continue;
            };

            if !spec.param_type.accepts(value) {
                return Err(ValidationError::InvalidType {
                    name: spec.name.clone(),
                    expected: spec.param_type.as_str(),
                });
            }

            if let Some(text) = value.as_str() {
                if spec.non_empty && text.trim().is_empty() {
                    return Err(match &spec.required_message {
                        Some(message) => ValidationError::Required {
                            name: spec.name.clone(),
                            message: message.clone(),
                        },
                        None => ValidationError::EmptyValue {
                            name: spec.name.clone(),
                        },
                    });
                }
                if text.chars().count() > self.config.max_string_length {
                    return Err(ValidationError::TooLong {
                        name: spec.name.clone(),
                        max: self.config.max_string_length,
                    });
                }
            }

            if let Some(allowed) = &spec.allowed_values {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if !allowed.iter().any(|a| *a == rendered) {
                    return Err(ValidationError::InvalidValue {
                        name: spec.name.clone(),
                        value: rendered,
                        allowed: allowed.clone(),
                    });
                }
            }
        }

        Ok(ValidatedArguments { values })
    }
}
