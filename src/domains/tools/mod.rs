//! Tools domain module.
//!
//! Operations are named, schema-checked async handlers that MCP clients
//! call as tools.
//!
//! ## Architecture
//!
//! - `registry.rs` - `OperationRegistry`: register, list, invoke
//! - `schema.rs` - operation and parameter specs, argument validation
//! - `handlers.rs` - `Handler` trait and typed `Arguments`
//! - `outcome.rs` - `InvocationResult`
//! - `error.rs` - error kinds and error types
//! - `definitions/` - adapters (filesystem, git, postgres, calendar, gmail, whatsapp)
//! - `router.rs` - builds the registry from configuration
//!
//! ## Adding an Operation
//!
//! 1. Add a method to an adapter in `definitions/` (or a new adapter)
//! 2. Register it in the adapter's `register()` with an `OperationSpec`
//! 3. If it is a new adapter, add it to `router.rs` and `AdapterKind`

pub mod definitions;
mod error;
mod handlers;
mod outcome;
mod registry;
pub mod router;
mod schema;

pub use error::{ErrorKind, HandlerError, RegistryError};
pub use handlers::{Arguments, Handler, HandlerResult, with_state};
pub use outcome::InvocationResult;
pub use registry::OperationRegistry;
pub use router::build_registry;
pub use schema::{OperationSpec, ParamKind, ParamSpec, ValidationError};
