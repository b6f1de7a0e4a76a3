//! MCP Server implementation and lifecycle management.
//!
//! The server exposes every operation in the [`OperationRegistry`] as an
//! MCP tool. Tool listings come straight from the operation specs, and
//! tool calls go through [`OperationRegistry::invoke`].
//!
//! Failures are mapped by kind:
//! - `UnknownOperation` / `InvalidArguments` become protocol errors
//!   (`invalid_params`) carrying the kind in `data`
//! - `HandlerError` becomes a tool result with `isError: true` and a
//!   structured `{kind, message}` body

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, model::*, service::RequestContext,
};
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::config::Config;
use crate::domains::tools::{
    ErrorKind, InvocationResult, OperationRegistry, OperationSpec, build_registry,
};

const INSTRUCTIONS: &str = "Tool adapter server. Exposes filesystem, git, PostgreSQL, \
    Google Calendar, Gmail and WhatsApp operations as MCP tools.";

/// The main MCP server handler.
///
/// Cheap to clone; the registry is shared between connections.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Every operation this server exposes.
    registry: Arc<OperationRegistry>,
}

impl McpServer {
    /// Create a server with the adapters enabled in `config`.
    pub fn new(config: Config) -> super::Result<Self> {
        let registry = build_registry(&config)?;
        Ok(Self::with_registry(config, registry))
    }

    /// Create a server around an already built registry.
    pub fn with_registry(config: Config, registry: OperationRegistry) -> Self {
        info!("Serving {} operations", registry.len());
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Get the operation registry.
    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Server instructions sent to clients on initialize.
    pub fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    /// All operations as MCP tool descriptors, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.registry.list_operations().map(to_tool).collect()
    }

    /// Invoke an operation and map the outcome onto an MCP tool result.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        to_call_result(self.registry.invoke(name, arguments).await)
    }
}

fn to_tool(spec: &OperationSpec) -> Tool {
    Tool::new(
        spec.name.clone(),
        spec.description.clone(),
        Arc::new(spec.input_schema()),
    )
}

fn to_call_result(result: InvocationResult) -> Result<CallToolResult, McpError> {
    let text = result.to_text();
    match result {
        InvocationResult::Success { .. } => Ok(CallToolResult::success(vec![Content::text(text)])),
        InvocationResult::Failure {
            kind: kind @ (ErrorKind::UnknownOperation | ErrorKind::InvalidArguments),
            message,
        } => Err(McpError::invalid_params(
            message,
            Some(json!({ "kind": kind.as_str() })),
        )),
        InvocationResult::Failure { kind, message } => {
            let mut call_result = CallToolResult::error(vec![Content::text(text)]);
            call_result.structured_content = Some(json!({
                "kind": kind.as_str(),
                "message": message,
            }));
            Ok(call_result)
        }
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        info!("Listing tools");
        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, request, _context), fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = request.arguments.map(Value::Object).unwrap_or_else(|| json!({}));
        self.call(&request.name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AdapterKind;

    fn greet_server() -> McpServer {
        let mut config = Config::default();
        config.adapters.enabled = vec![AdapterKind::Greet];
        McpServer::new(config).unwrap()
    }

    #[test]
    fn test_tools_listed_from_registry() {
        let tools = greet_server().tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "greet");
        assert_eq!(tools[0].input_schema["required"], json!(["name"]));
    }

    #[tokio::test]
    async fn test_call_success() {
        let result = greet_server().call("greet", json!({ "name": "Ada" })).await.unwrap();
        assert_ne!(result.is_error, Some(true));
        let text = serde_json::to_value(&result.content).unwrap();
        assert_eq!(text[0]["text"], "Hello, Ada!");
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_are_protocol_errors() {
        let server = greet_server();
        let err = server.call("nope", json!({})).await.unwrap_err();
        assert_eq!(err.data, Some(json!({ "kind": "UnknownOperation" })));

        let err = server.call("greet", json!({})).await.unwrap_err();
        assert_eq!(err.data, Some(json!({ "kind": "InvalidArguments" })));
    }

    #[test]
    fn test_handler_error_is_tool_error() {
        let result = to_call_result(InvocationResult::failure(ErrorKind::HandlerError, "boom")).unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            result.structured_content,
            Some(json!({ "kind": "HandlerError", "message": "boom" }))
        );
    }
}
