//! List directory tool definition.
//!
//! A tool that lists the entries of a directory.

use std::fs;

use tracing::{info, instrument, warn};

use crate::core::config::SecurityConfig;
use crate::core::security::validate_path;
use crate::domains::tools::{HandlerError, OperationSpec, ParamKind, ParamSpec};

/// List directory tool - lists files and folders in a given path.
pub struct FsListDirTool;

impl FsListDirTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "list_directory";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "List files and folders in a directory";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION).param(
            ParamSpec::optional("path", ParamKind::String, ".")
                .describe("Directory to list (relative paths resolve against the working directory)"),
        )
    }

    /// Execute the tool logic.
    #[instrument(skip(security))]
    pub fn execute(path: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("List directory tool called for path: {}", path);

        let dir = validate_path(path, security)?;
        if !dir.is_dir() {
            warn!("Path is not a directory: {}", path);
            return Err(HandlerError::failed(format!("'{path}' is not a directory.")));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            match entry {
                Ok(entry) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Err(e) => warn!("Error reading entry: {}", e),
            }
        }
        names.sort();

        info!("Listed {} entries in {}", names.len(), path);

        if names.is_empty() {
            Ok(format!("No files or folders in '{path}'."))
        } else {
            Ok(names.join("\n"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> SecurityConfig {
        SecurityConfig::default()
    }

    #[test]
    fn test_list_dir_execute() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path();

        fs::write(temp_path.join("b.txt"), "content").unwrap();
        fs::write(temp_path.join("a.txt"), "content").unwrap();
        fs::create_dir(temp_path.join("subdir")).unwrap();

        let text = FsListDirTool::execute(temp_path.to_str().unwrap(), &open()).unwrap();
        assert_eq!(text, "a.txt\nb.txt\nsubdir");
    }

    #[test]
    fn test_list_dir_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_str().unwrap();

        let text = FsListDirTool::execute(path, &open()).unwrap();
        assert_eq!(text, format!("No files or folders in '{path}'."));
    }

    #[test]
    fn test_list_dir_nonexistent() {
        let result = FsListDirTool::execute("/nonexistent/path/12345", &open());
        assert!(matches!(result, Err(HandlerError::PathSecurity(_))));
    }

    #[test]
    fn test_list_dir_on_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let err = FsListDirTool::execute(file.to_str().unwrap(), &open()).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }
}
