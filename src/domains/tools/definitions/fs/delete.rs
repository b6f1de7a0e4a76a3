//! Delete tool definition.
//!
//! A tool that deletes a single file. Directories are refused.

use std::fs;

use tracing::{info, instrument, warn};

use crate::core::config::SecurityConfig;
use crate::core::security::validate_path;
use crate::domains::tools::{HandlerError, OperationSpec, ParamKind, ParamSpec};

/// Delete tool - removes a file.
pub struct FsDeleteTool;

impl FsDeleteTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "delete_file";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Delete a file";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::required("path", ParamKind::String).describe("File to delete"))
    }

    /// Execute the tool logic.
    #[instrument(skip(security))]
    pub fn execute(path: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Delete tool called: '{}'", path);

        let target = validate_path(path, security)?;
        if !target.is_file() {
            warn!("Refusing to delete non-file: {}", path);
            return Err(HandlerError::failed(format!("'{path}' is not a file.")));
        }

        fs::remove_file(&target).map_err(|e| {
            warn!("Failed to delete '{}': {}", path, e);
            match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    HandlerError::failed(format!("Permission denied: Cannot delete '{path}'"))
                }
                std::io::ErrorKind::NotFound => HandlerError::not_found(format!("Path not found: '{path}'")),
                _ => HandlerError::failed(format!("Failed to delete '{path}': {e}")),
            }
        })?;

        info!("Successfully deleted '{}'", path);
        Ok(format!("File '{path}' deleted."))
    }
}

// ============================================================================
// Tests
// ============================================================================
