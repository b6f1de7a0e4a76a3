//! Operation Registry - central registration and dispatch for all operations.
//!
//! This module provides:
//! - Registration of operations with a declared parameter schema
//! - Discovery in registration order
//! - Validated invocation inside a failure boundary

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::error::{ErrorKind, RegistryError};
use super::handlers::Handler;
use super::outcome::InvocationResult;
use super::schema::OperationSpec;

// ============================================================================
// Descriptor
// ============================================================================

/// An operation's public spec paired with its handler.
struct Descriptor {
    spec: OperationSpec,
    handler: Box<dyn Handler>,
}

// ============================================================================
// Operation Registry
// ============================================================================

/// Registry of named, schema-checked operations.
///
/// Built once at startup, then shared read-only (usually behind an `Arc`)
/// and invoked concurrently.
#[derive(Default)]
pub struct OperationRegistry {
    operations: Vec<Descriptor>,
    index: HashMap<String, usize>,
}

impl OperationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation.
    ///
    /// Fails with [`RegistryError::DuplicateOperation`] when the name is
    /// taken. The existing registration is left untouched.
    pub fn register<H>(&mut self, spec: OperationSpec, handler: H) -> Result<(), RegistryError>
    where
        H: Handler + 'static,
    {
        if self.index.contains_key(&spec.name) {
            warn!("Rejected duplicate registration of '{}'", spec.name);
            return Err(RegistryError::DuplicateOperation(spec.name));
        }
        spec.check()
            .map_err(|reason| RegistryError::InvalidSchema {
                operation: spec.name.clone(),
                reason,
            })?;

        debug!(
            "Registered operation '{}' ({} parameters)",
            spec.name,
            spec.parameters.len()
        );
        self.index.insert(spec.name.clone(), self.operations.len());
        self.operations.push(Descriptor {
            spec,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// Public part of every operation, in registration order.
    ///
    /// Each call returns a fresh iterator over the same sequence.
    pub fn list_operations(&self) -> impl ExactSizeIterator<Item = &OperationSpec> + '_ {
        self.operations.iter().map(|d| &d.spec)
    }

    /// Look up an operation's public spec by name.
    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.index.get(name).map(|&i| &self.operations[i].spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Validate arguments and run the named operation.
    ///
    /// Never panics: handler errors and handler panics both come back as
    /// [`ErrorKind::HandlerError`] failures.
    #[instrument(skip(self, arguments))]
    pub async fn invoke(&self, name: &str, arguments: Value) -> InvocationResult {
        let Some(descriptor) = self.index.get(name).map(|&i| &self.operations[i]) else {
            warn!("Unknown operation requested: {}", name);
            return InvocationResult::failure(
                ErrorKind::UnknownOperation,
                format!("Unknown operation: {name}"),
            );
        };

        let arguments = match descriptor.spec.validate(arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!("Invalid arguments for '{}': {}", name, e);
                return InvocationResult::failure(ErrorKind::InvalidArguments, e.to_string());
            }
        };

        info!("Invoking operation '{}'", name);
        match AssertUnwindSafe(descriptor.handler.handle(arguments))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => InvocationResult::success(value),
            Ok(Err(e)) => {
                warn!("Operation '{}' failed: {}", name, e);
                InvocationResult::failure(ErrorKind::HandlerError, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Operation '{}' panicked: {}", name, message);
                InvocationResult::failure(
                    ErrorKind::HandlerError,
                    format!("operation '{name}' panicked: {message}"),
                )
            }
        }
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field(
                "operations",
                &self.list_operations().map(|s| &s.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::{Arguments, HandlerError, HandlerResult, ParamKind, ParamSpec};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hello_spec(name: &str) -> OperationSpec {
        OperationSpec::new(name, "Echo a greeting")
            .param(ParamSpec::required("name", ParamKind::String))
    }

    fn echo(a: Arguments) -> impl std::future::Future<Output = HandlerResult> {
        async move { Ok(json!(a.string("name")?)) }
    }

    fn counting(calls: Arc<AtomicUsize>) -> impl Handler {
        move |a: Arguments| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(json!(a.string("name")?))
            }
        }
    }

    #[test]
    fn test_list_operations_in_registration_order() {
        let mut registry = OperationRegistry::new();
        for name in ["b_op", "a_op", "c_op"] {
            registry.register(hello_spec(name), echo).unwrap();
        }

        let first: Vec<_> = registry.list_operations().map(|s| s.name.clone()).collect();
        let second: Vec<_> = registry.list_operations().map(|s| s.name.clone()).collect();
        assert_eq!(first, vec!["b_op", "a_op", "c_op"]);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let registry = OperationRegistry::new();
        let result = registry.invoke("nonexistent", json!({})).await;
        assert_eq!(result.kind(), Some(ErrorKind::UnknownOperation));
    }

    #[tokio::test]
    async fn test_missing_argument_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = OperationRegistry::new();
        registry
            .register(hello_spec("hello_x"), counting(calls.clone()))
            .unwrap();

        let result = registry.invoke("hello_x", json!({})).await;
        assert_eq!(result.kind(), Some(ErrorKind::InvalidArguments));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_kind_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = OperationRegistry::new();
        registry
            .register(hello_spec("hello_x"), counting(calls.clone()))
            .unwrap();

        let result = registry.invoke("hello_x", json!({ "name": ["A"] })).await;
        assert_eq!(result.kind(), Some(ErrorKind::InvalidArguments));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_contained() {
        let mut registry = OperationRegistry::new();
        registry
            .register(OperationSpec::new("fails", "Always fails"), |_a: Arguments| async {
                Err::<Value, _>(HandlerError::external("git push", "rejected"))
            })
            .unwrap();
        registry.register(hello_spec("hello_x"), echo).unwrap();

        let result = registry.invoke("fails", json!({})).await;
        assert_eq!(
            result,
            InvocationResult::failure(ErrorKind::HandlerError, "git push failed: rejected")
        );

        let after = registry.invoke("hello_x", json!({ "name": "A" })).await;
        assert_eq!(after, InvocationResult::success("A"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let mut registry = OperationRegistry::new();
        registry
            .register(OperationSpec::new("explodes", "Panics"), |_a: Arguments| async {
                if true {
                    panic!("disk on fire");
                }
                Ok::<_, HandlerError>(Value::Null)
            })
            .unwrap();
        registry.register(hello_spec("hello_x"), echo).unwrap();

        let result = registry.invoke("explodes", json!({})).await;
        assert_eq!(result.kind(), Some(ErrorKind::HandlerError));
        assert!(result.to_text().contains("disk on fire"));

        let after = registry.invoke("hello_x", json!({ "name": "A" })).await;
        assert!(after.is_success());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_invocations_keep_their_inputs() {
        let mut registry = OperationRegistry::new();
        registry.register(hello_spec("hello_x"), echo).unwrap();
        registry.register(hello_spec("hello_y"), echo).unwrap();
        let registry = Arc::new(registry);

        let mut tasks = Vec::new();
        for i in 0..200 {
            let registry = registry.clone();
            let (op, input) = if i % 2 == 0 { ("hello_x", "A") } else { ("hello_y", "B") };
            tasks.push(tokio::spawn(async move {
                (input, registry.invoke(op, json!({ "name": input })).await)
            }));
        }

        for task in tasks {
            let (input, result) = task.await.unwrap();
            assert_eq!(result, InvocationResult::success(input));
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected_every_time() {
        let mut registry = OperationRegistry::new();
        registry.register(hello_spec("hello_x"), echo).unwrap();

        for _ in 0..3 {
            let err = registry
                .register(hello_spec("hello_x"), |_a: Arguments| async {
                    Ok::<_, HandlerError>(json!("replacement"))
                })
                .unwrap_err();
            assert_eq!(err, RegistryError::DuplicateOperation("hello_x".into()));
        }

        assert_eq!(registry.len(), 1);
        let result = registry.invoke("hello_x", json!({ "name": "A" })).await;
        assert_eq!(result, InvocationResult::success("A"));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let mut registry = OperationRegistry::new();
        let spec = OperationSpec::new("bad", "")
            .param(ParamSpec::required("x", ParamKind::String))
            .param(ParamSpec::required("x", ParamKind::String));
        let err = registry.register(spec, echo).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_defaults_reach_handler() {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                OperationSpec::new("count", "")
                    .param(ParamSpec::optional("count", ParamKind::Integer, 5)),
                |a: Arguments| async move { Ok::<_, HandlerError>(json!(a.i64("count")?)) },
            )
            .unwrap();

        assert_eq!(
            registry.invoke("count", Value::Null).await,
            InvocationResult::success(5)
        );
        assert_eq!(
            registry.invoke("count", json!({ "count": "7" })).await,
            InvocationResult::success(7)
        );
    }

    #[test]
    fn test_get_returns_spec() {
        let mut registry = OperationRegistry::new();
        registry.register(hello_spec("hello_x"), echo).unwrap();
        assert_eq!(registry.get("hello_x").unwrap().parameters.len(), 1);
        assert!(registry.get("hello_y").is_none());
        assert!(registry.contains("hello_x"));
    }
}
