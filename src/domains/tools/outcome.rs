//! Result of a registry invocation.

use serde::Serialize;
use serde_json::Value;

use super::error::ErrorKind;

/// Either the handler's value or a classified failure. Never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationResult {
    Success { value: Value },
    Failure { kind: ErrorKind, message: String },
}

impl InvocationResult {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure kind, if this is a failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Render the result as text for a human or an agent.
    pub fn to_text(&self) -> String {
        match self {
            Self::Success {
                value: Value::String(s),
            } => s.clone(),
            Self::Success { value } => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Failure { message, .. } => message.clone(),
        }
    }
}
