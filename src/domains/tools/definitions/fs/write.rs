//! Tools that create or modify files and folders.

use std::fs::{self, OpenOptions};
use std::io::Write;

use tracing::{info, instrument};

use crate::core::config::SecurityConfig;
use crate::core::security::validate_new_path;
use crate::domains::tools::{HandlerError, OperationSpec, ParamKind, ParamSpec};

fn path_param(description: &str) -> ParamSpec {
    ParamSpec::required("path", ParamKind::String).describe(description)
}

/// Create file tool - writes a new text file, replacing any existing one.
pub struct FsCreateFileTool;

impl FsCreateFileTool {
    pub const NAME: &'static str = "create_file";
    pub const DESCRIPTION: &'static str = "Create a new text file with content";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(path_param("File to create"))
            .param(ParamSpec::optional("content", ParamKind::String, ""))
    }

    #[instrument(skip(content, security))]
    pub fn execute(path: &str, content: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Create file tool called for path: {}", path);
        let target = validate_new_path(path, security)?;
        fs::write(&target, content)?;
        Ok(format!("File '{path}' created successfully."))
    }
}

/// Append tool - appends text to a file, creating it if needed.
pub struct FsAppendTool;

impl FsAppendTool {
    pub const NAME: &'static str = "append_file";
    pub const DESCRIPTION: &'static str = "Append content to an existing file";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(path_param("File to append to"))
            .param(ParamSpec::required("content", ParamKind::String))
    }

    #[instrument(skip(content, security))]
    pub fn execute(path: &str, content: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Append file tool called for path: {}", path);
        let target = validate_new_path(path, security)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&target)?;
        file.write_all(content.as_bytes())?;
        Ok(format!("Appended to '{path}'."))
    }
}

/// Clear tool - truncates a file to zero length.
pub struct FsClearTool;

impl FsClearTool {
    pub const NAME: &'static str = "clear_file";
    pub const DESCRIPTION: &'static str = "Clear the contents of a file";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION).param(path_param("File to clear"))
    }

    #[instrument(skip(security))]
    pub fn execute(path: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Clear file tool called for path: {}", path);
        let target = validate_new_path(path, security)?;
        if target.is_dir() {
            return Err(HandlerError::failed(format!("'{path}' is not a file.")));
        }
        fs::File::create(&target)?;
        Ok(format!("Cleared content of '{path}'."))
    }
}

/// Create folder tool - creates a directory and any missing parents.
pub struct FsCreateFolderTool;

impl FsCreateFolderTool {
    pub const NAME: &'static str = "create_folder";
    pub const DESCRIPTION: &'static str = "Create a new directory";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION).param(path_param("Directory to create"))
    }

    #[instrument(skip(security))]
    pub fn execute(path: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Create folder tool called for path: {}", path);
        let target = validate_new_path(path, security)?;
        fs::create_dir_all(&target)?;
        Ok(format!("Directory '{path}' created."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rooted(dir: &TempDir) -> SecurityConfig {
        SecurityConfig {
            root_path: Some(dir.path().to_path_buf()),
            allow_symlinks: true,
        }
    }

    #[test]
    fn test_create_append_clear() {
        let temp_dir = TempDir::new().unwrap();
        let security = rooted(&temp_dir);
        let file = temp_dir.path().join("log.txt");
        let path = file.to_str().unwrap();

        FsCreateFileTool::execute(path, "one", &security).unwrap();
        FsAppendTool::execute(path, " two", &security).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "one two");

        let msg = FsClearTool::execute(path, &security).unwrap();
        assert_eq!(msg, format!("Cleared content of '{path}'."));
        assert_eq!(fs::read_to_string(&file).unwrap(), "");
    }

    #[test]
    fn test_create_file_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let security = rooted(&temp_dir);
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "old").unwrap();

        FsCreateFileTool::execute(file.to_str().unwrap(), "new", &security).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "new");
    }

    #[test]
    fn test_create_file_missing_parent_fails() {
        let temp_dir = TempDir::new().unwrap();
        let security = rooted(&temp_dir);
        let file = temp_dir.path().join("missing/a.txt");

        let result = FsCreateFileTool::execute(file.to_str().unwrap(), "x", &security);
        assert!(matches!(result, Err(HandlerError::Io(_))));
    }

    #[test]
    fn test_create_folder_is_recursive_and_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let security = rooted(&temp_dir);
        let dir = temp_dir.path().join("x/y/z");
        let path = dir.to_str().unwrap();

        FsCreateFolderTool::execute(path, &security).unwrap();
        FsCreateFolderTool::execute(path, &security).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_create_outside_root_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let security = rooted(&temp_dir);
        let file = outside.path().join("escape.txt");

        let result = FsCreateFileTool::execute(file.to_str().unwrap(), "x", &security);
        assert!(matches!(result, Err(HandlerError::PathSecurity(_))));
        assert!(!file.exists());
    }
}
