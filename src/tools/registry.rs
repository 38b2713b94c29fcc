//! Tool descriptors and the per-server tool registry

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{ToolPayload, ValidatedArguments};
use crate::backend::Integration;
use crate::error::{RegistryError, ToolError};

/// JSON type of a declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Whether `value` has this JSON type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

/// One entry of a tool's input shape
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub param_type: ParamType,
    pub required: bool,
    /// Reject empty strings even when present
    pub non_empty: bool,
    /// Reported instead of the generic text when the value is missing or empty
    pub required_message: Option<String>,
    pub default: Option<Value>,
    pub allowed_values: Option<Vec<String>>,
}

impl ParamSpec {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type,
            required: true,
            non_empty: false,
            required_message: None,
            default: None,
            allowed_values: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.allowed_values = Some(allowed.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    pub fn required_message(mut self, message: &str) -> Self {
        self.required_message = Some(message.to_string());
        self
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.param_type.as_str()));
        schema.insert("description".into(), json!(self.description));
        if let Some(allowed) = &self.allowed_values {
            schema.insert("enum".into(), json!(allowed));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

/// Name, usage text and input contract of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// JSON Schema for the `inputSchema` field of `tools/list`
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }
}

/// A callable tool bound to its backend
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Integration this tool reaches out to, if any
    fn integration(&self) -> Option<Integration> {
        None
    }

    /// Run the tool. Arguments have already passed validation against
    /// [`Tool::descriptor`].
    async fn invoke(&self, args: ValidatedArguments) -> Result<ToolPayload, ToolError>;
}

/// Immutable, ordered catalogue of a server's tools
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Build a registry, keeping declaration order. Fails on duplicate names.
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            let name = &tool.descriptor().name;
            if !seen.insert(name.clone()) {
                return Err(RegistryError::DuplicateTool(name.clone()));
            }
        }
        Ok(Self { tools })
    }

    pub fn list_tools(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.descriptor().name == name)
            .map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| &t.descriptor().name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::CqlValidation;
    use proptest::prelude::*;

    struct Named(ToolDescriptor);

    #[async_trait]
    impl Tool for Named {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.0
        }

        async fn invoke(&self, _args: ValidatedArguments) -> Result<ToolPayload, ToolError> {
            Ok(ToolPayload::CqlValidation(CqlValidation::check("")))
        }
    }

    fn named(name: &str) -> Box<dyn Tool> {
        Box::new(Named(ToolDescriptor::new(name, "test tool")))
    }

    #[test]
    fn test_input_schema_shape() {
        let descriptor = ToolDescriptor::new("convert", "Convert things")
            .param(ParamSpec::required("cql_logic", ParamType::String, "CQL"))
            .param(
                ParamSpec::optional("target_dialect", ParamType::String, "Dialect")
                    .one_of(&["spark-sql", "snowflake"])
                    .with_default(json!("spark-sql")),
            );

        let schema = descriptor.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["cql_logic"]));
        assert_eq!(schema["properties"]["cql_logic"]["type"], "string");
        assert_eq!(
            schema["properties"]["target_dialect"]["enum"],
            json!(["spark-sql", "snowflake"])
        );
        assert_eq!(schema["properties"]["target_dialect"]["default"], "spark-sql");
        assert!(schema["properties"]["cql_logic"].get("enum").is_none());
    }

    #[test]
    fn test_empty_descriptor_schema() {
        let schema = ToolDescriptor::new("get_sent_messages", "List").input_schema();
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["required"], json!([]));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ToolRegistry::new(vec![named("a"), named("b"), named("a")]);
        assert_eq!(result.err(), Some(RegistryError::DuplicateTool("a".to_string())));
    }

    #[test]
    fn test_lookup() {
        let registry = ToolRegistry::new(vec![named("a"), named("b")]).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert!(registry.get("b").is_some());
        assert!(registry.get("c").is_none());

        let empty = ToolRegistry::new(Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.list_tools().is_empty());
    }

    #[test]
    fn test_integer_accepts_only_whole_numbers() {
        assert!(ParamType::Integer.accepts(&json!(3)));
        assert!(!ParamType::Integer.accepts(&json!(3.5)));
        assert!(ParamType::Number.accepts(&json!(3.5)));
        assert!(!ParamType::String.accepts(&json!(null)));
    }

    proptest! {
        #[test]
        fn prop_list_preserves_declaration_order(names in prop::collection::hash_set("[a-z_]{1,12}", 1..8)) {
            let names: Vec<String> = names.into_iter().collect();
            let registry = ToolRegistry::new(names.iter().map(|n| named(n)).collect()).unwrap();

            let first: Vec<String> = registry.list_tools().iter().map(|d| d.name.clone()).collect();
            let second: Vec<String> = registry.list_tools().iter().map(|d| d.name.clone()).collect();
            prop_assert_eq!(&first, &names);
            prop_assert_eq!(first, second);
        }
    }
}
