//! Handler trait and validated argument access.
//!
//! A handler receives an [`Arguments`] set that has already been checked
//! against its operation's schema, so accessors only fail when a handler
//! asks for a parameter it never declared.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::HandlerError;

/// Outcome of a handler call before the registry wraps it.
pub type HandlerResult = Result<Value, HandlerError>;

// ============================================================================
// Arguments
// ============================================================================

/// Validated, defaulted arguments for a single invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    pub(crate) fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Raw access to a value (absent when an optional parameter was omitted).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn string(&self, name: &str) -> Result<String, HandlerError> {
        self.opt_string(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_string(&self, name: &str) -> Result<Option<String>, HandlerError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(mismatch(name, "string", other)),
        }
    }

    pub fn i64(&self, name: &str) -> Result<i64, HandlerError> {
        self.opt_i64(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>, HandlerError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| mismatch(name, "integer", &Value::Number(n.clone()))),
            Some(other) => Err(mismatch(name, "integer", other)),
        }
    }

    pub fn f64(&self, name: &str) -> Result<f64, HandlerError> {
        match self.values.get(name) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| mismatch(name, "number", &Value::Number(n.clone()))),
            Some(other) => Err(mismatch(name, "number", other)),
            None => Err(missing(name)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, HandlerError> {
        match self.values.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(mismatch(name, "boolean", other)),
            None => Err(missing(name)),
        }
    }

    pub fn string_list(&self, name: &str) -> Result<Vec<String>, HandlerError> {
        match self.values.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| mismatch(name, "list of strings", item))
                })
                .collect(),
            Some(other) => Err(mismatch(name, "list of strings", other)),
            None => Err(missing(name)),
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }
}

fn missing(name: &str) -> HandlerError {
    HandlerError::failed(format!("argument '{name}' was not supplied"))
}

fn mismatch(name: &str, expected: &str, found: &Value) -> HandlerError {
    HandlerError::failed(format!("argument '{name}' is not a {expected}: {found}"))
}

// ============================================================================
// Handler trait
// ============================================================================

/// Executable body of a registered operation.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, arguments: Arguments) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, arguments: Arguments) -> HandlerResult {
        (self)(arguments).await
    }
}

/// Bind shared adapter state to an async method-like function.
///
/// ```ignore
/// registry.register(spec, with_state(adapter.clone(), |fs, args| async move {
///     fs.list_directory(args).await
/// }))?;
/// ```
pub fn with_state<S, F, Fut, T>(state: Arc<S>, f: F) -> impl Handler
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, HandlerError>> + Send + 'static,
    T: Into<Value> + Send + 'static,
{
    move |arguments: Arguments| {
        let fut = f(state.clone(), arguments);
        async move { fut.await.map(Into::into) }
    }
}
