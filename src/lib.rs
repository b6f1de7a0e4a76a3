//! Tool Adapter MCP Server
//!
//! An MCP server that exposes a registry of named, schema-checked
//! operations as tools. Adapters wrap external systems: the local
//! filesystem, git, PostgreSQL, Google Calendar, Gmail and WhatsApp.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, path security, the MCP server and transports
//! - **domains**: business logic organized by bounded contexts
//!   - **tools**: the operation registry and its adapters
//!
//! # Example
//!
//! ```rust,no_run
//! use tool_adapter_server::{core::Config, core::McpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::new(config)?;
//!     // Start the server...
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
