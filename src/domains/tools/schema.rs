//! Operation schemas and argument validation.
//!
//! Every operation declares an ordered list of [`ParamSpec`]s. Incoming
//! arguments are checked against that list before a handler ever runs:
//! required parameters must be present, values are coerced to their
//! declared kind, defaults are filled in and unknown keys are rejected.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::handlers::Arguments;

// ============================================================================
// Parameter kinds
// ============================================================================

/// The kind of value a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    StringList,
}

impl ParamKind {
    /// JSON Schema `type` keyword for this kind.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringList => "array",
        }
    }

    /// Coerce a JSON value into this kind.
    ///
    /// Returns `None` when the value cannot be represented.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) => Some(value.clone()),

            (Self::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Some(json!(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| json!(f as i64))
                }
            }
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),

            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| json!(f)),

            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },

            (Self::StringList, Value::Array(items)) => items
                .iter()
                .all(Value::is_string)
                .then(|| value.clone()),

            _ => None,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringList => "list of strings",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Parameter specification
// ============================================================================

/// Declaration of a single operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    /// A parameter the caller must always supply.
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: None,
        }
    }

    /// An optional parameter that falls back to `default` when omitted.
    pub fn optional(name: impl Into<String>, kind: ParamKind, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: Some(default.into()),
            description: None,
        }
    }

    /// An optional parameter without a default; handlers see it as absent.
    pub fn maybe(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            description: None,
        }
    }

    /// Attach a human-readable description shown during discovery.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn json_schema(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".into(), json!(self.kind.json_type()));
        if self.kind == ParamKind::StringList {
            property.insert("items".into(), json!({ "type": "string" }));
        }
        if let Some(description) = &self.description {
            property.insert("description".into(), json!(description));
        }
        if let Some(default) = &self.default {
            property.insert("default".into(), default.clone());
        }
        Value::Object(property)
    }
}

// ============================================================================
// Operation specification
// ============================================================================

/// Public description of an operation: everything except its handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter (declaration order is preserved).
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }

    /// Check the schema itself for mistakes before it is registered.
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("operation name must not be empty".into());
        }
        for (index, param) in self.parameters.iter().enumerate() {
            if param.name.trim().is_empty() {
                return Err(format!("parameter #{index} has an empty name"));
            }
            if self.parameters[..index].iter().any(|p| p.name == param.name) {
                return Err(format!("parameter '{}' is declared twice", param.name));
            }
            if let Some(default) = &param.default {
                if param.required {
                    return Err(format!(
                        "required parameter '{}' cannot have a default",
                        param.name
                    ));
                }
                if param.kind.coerce(default).is_none() {
                    return Err(format!(
                        "default for '{}' is not a valid {}",
                        param.name, param.kind
                    ));
                }
            }
        }
        Ok(())
    }

    /// Render the parameters as a JSON Schema object for discovery.
    pub fn input_schema(&self) -> Map<String, Value> {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(required));
        schema
    }

    /// Validate raw arguments and produce the defaulted argument set.
    pub fn validate(&self, arguments: Value) -> Result<Arguments, ValidationError> {
        let mut supplied = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => return Err(ValidationError::NotAnObject(json_type_name(&other))),
        };

        if let Some(unknown) = supplied
            .keys()
            .find(|key| !self.parameters.iter().any(|p| &p.name == *key))
        {
            return Err(ValidationError::UnknownParameter(unknown.clone()));
        }

        let mut validated = Map::new();
        for param in &self.parameters {
            match supplied.remove(&param.name) {
                Some(Value::Null) | None => {
                    if param.required {
                        return Err(ValidationError::MissingRequired(param.name.clone()));
                    }
                    if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    }
                }
                Some(value) => {
                    let coerced =
                        param
                            .kind
                            .coerce(&value)
                            .ok_or_else(|| ValidationError::WrongKind {
                                name: param.name.clone(),
                                expected: param.kind,
                                found: json_type_name(&value),
                            })?;
                    validated.insert(param.name.clone(), coerced);
                }
            }
        }

        Ok(Arguments::new(validated))
    }
}

// ============================================================================
// Validation errors
// ============================================================================

/// Reasons a set of arguments does not satisfy an operation's schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("arguments must be an object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required parameter '{0}'")]
    MissingRequired(String),

    #[error("parameter '{name}' must be a {expected}, got {found}")]
    WrongKind {
        name: String,
        expected: ParamKind,
        found: &'static str,
    },

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn clone_spec() -> OperationSpec {
        OperationSpec::new("clone_to_path", "Clone a repository")
            .param(ParamSpec::required("repo_url", ParamKind::String))
            .param(ParamSpec::required("save_path", ParamKind::String))
            .param(ParamSpec::maybe("depth", ParamKind::Integer))
            .param(ParamSpec::optional("bare", ParamKind::Boolean, false))
    }

    #[test]
    fn test_validate_applies_defaults() {
        let args = clone_spec()
            .validate(json!({ "repo_url": "https://github.com/a/b.git", "save_path": "/tmp/b" }))
            .unwrap();

        assert_eq!(args.string("repo_url").unwrap(), "https://github.com/a/b.git");
        assert!(!args.bool("bare").unwrap());
        assert_eq!(args.opt_i64("depth").unwrap(), None);
    }

    #[test]
    fn test_validate_null_arguments_as_empty() {
        let spec = OperationSpec::new("list_databases", "List databases");
        assert!(spec.validate(Value::Null).is_ok());
    }

    #[test]
    fn test_validate_missing_required() {
        let err = clone_spec()
            .validate(json!({ "repo_url": "https://github.com/a/b.git" }))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingRequired("save_path".into()));
    }

    #[test]
    fn test_validate_null_for_required() {
        let err = clone_spec()
            .validate(json!({ "repo_url": null, "save_path": "x" }))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingRequired("repo_url".into()));
    }

    #[test]
    fn test_validate_unknown_parameter() {
        let err = clone_spec()
            .validate(json!({ "repo_url": "u", "save_path": "p", "branch": "dev" }))
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownParameter("branch".into()));
    }

    #[test]
    fn test_validate_not_an_object() {
        let err = clone_spec().validate(json!(["a"])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject("array"));
    }

    #[test]
    fn test_validate_wrong_kind() {
        let err = clone_spec()
            .validate(json!({ "repo_url": 42, "save_path": "p" }))
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::WrongKind { ref name, expected: ParamKind::String, found: "integer" } if name == "repo_url"
        ));
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(ParamKind::Integer.coerce(&json!(5)), Some(json!(5)));
        assert_eq!(ParamKind::Integer.coerce(&json!(5.0)), Some(json!(5)));
        assert_eq!(ParamKind::Integer.coerce(&json!(" 12 ")), Some(json!(12)));
        assert_eq!(ParamKind::Integer.coerce(&json!(5.5)), None);
        assert_eq!(ParamKind::Integer.coerce(&json!("five")), None);
        assert_eq!(ParamKind::Integer.coerce(&json!(true)), None);
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(ParamKind::Boolean.coerce(&json!("Yes")), Some(json!(true)));
        assert_eq!(ParamKind::Boolean.coerce(&json!("0")), Some(json!(false)));
        assert_eq!(ParamKind::Boolean.coerce(&json!(1)), Some(json!(true)));
        assert_eq!(ParamKind::Boolean.coerce(&json!(2)), None);
        assert_eq!(ParamKind::Boolean.coerce(&json!("maybe")), None);
    }

    #[test]
    fn test_string_list_coercion() {
        assert!(ParamKind::StringList.coerce(&json!(["a", "b"])).is_some());
        assert!(ParamKind::StringList.coerce(&json!(["a", 1])).is_none());
        assert!(ParamKind::StringList.coerce(&json!("a")).is_none());
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(ParamKind::Number.coerce(&json!("2.5")), Some(json!(2.5)));
        assert_eq!(ParamKind::Number.coerce(&json!("NaN")), None);
    }

    #[test]
    fn test_check_rejects_duplicate_parameter() {
        let spec = OperationSpec::new("x", "")
            .param(ParamSpec::required("path", ParamKind::String))
            .param(ParamSpec::optional("path", ParamKind::String, "."));
        assert!(spec.check().unwrap_err().contains("declared twice"));
    }

    #[test]
    fn test_check_rejects_mismatched_default() {
        let spec =
            OperationSpec::new("x", "").param(ParamSpec::optional("depth", ParamKind::Integer, "deep"));
        assert!(spec.check().is_err());
    }

    #[test]
    fn test_check_rejects_empty_name() {
        assert!(OperationSpec::new("  ", "").check().is_err());
    }

    #[test]
    fn test_input_schema_shape() {
        let schema = clone_spec().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["repo_url", "save_path"]));
        assert_eq!(schema["properties"]["depth"]["type"], "integer");
        assert_eq!(schema["properties"]["bare"]["default"], json!(false));
    }

    #[test]
    fn test_string_list_schema_has_items() {
        let spec = OperationSpec::new("create_group", "")
            .param(ParamSpec::required("participants", ParamKind::StringList));
        let schema = spec.input_schema();
        assert_eq!(schema["properties"]["participants"]["items"]["type"], "string");
    }
}
