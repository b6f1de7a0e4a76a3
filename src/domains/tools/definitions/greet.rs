//! Greeting tool definition.

use serde_json::Value;
use tracing::info;

use crate::domains::tools::{
    Arguments, HandlerError, OperationRegistry, OperationSpec, ParamKind, ParamSpec, RegistryError,
};

/// Greet tool - the smallest possible operation, handy for smoke tests.
pub struct GreetTool;

impl GreetTool {
    pub const NAME: &'static str = "greet";
    pub const DESCRIPTION: &'static str = "Greet someone by name";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::required("name", ParamKind::String).describe("Who to greet"))
    }

    pub fn execute(name: &str) -> String {
        info!("Greet tool called for '{}'", name);
        format!("Hello, {name}!")
    }

    pub fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
        registry.register(Self::spec(), |a: Arguments| async move {
            Ok::<_, HandlerError>(Value::String(Self::execute(&a.string("name")?)))
        })
    }
}
