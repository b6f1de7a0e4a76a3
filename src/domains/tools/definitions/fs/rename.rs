//! Rename, copy and move tool definitions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::core::config::SecurityConfig;
use crate::core::security::{validate_new_path, validate_path};
use crate::domains::tools::{HandlerError, OperationSpec, ParamKind, ParamSpec};

/// Destination for copy/move: an existing directory receives the source's file name.
fn resolve_destination(source: &Path, destination: &str, security: &SecurityConfig) -> Result<PathBuf, HandlerError> {
    let target = validate_new_path(destination, security)?;
    if target.is_dir() {
        let name = source
            .file_name()
            .ok_or_else(|| HandlerError::failed(format!("'{}' has no file name", source.display())))?;
        return Ok(validate_new_path(&target.join(name).to_string_lossy(), security)?);
    }
    Ok(target)
}

fn describe_io_error(verb: &str, from: &str, to: &str, e: io::Error) -> HandlerError {
    warn!("Failed to {} '{}' to '{}': {}", verb, from, to, e);
    match e.kind() {
        io::ErrorKind::PermissionDenied => {
            HandlerError::failed(format!("Permission denied: Cannot {verb} '{from}' to '{to}'"))
        }
        io::ErrorKind::NotFound => HandlerError::not_found(format!("Path not found: '{from}'")),
        _ => HandlerError::failed(format!("Failed to {verb} '{from}' to '{to}': {e}")),
    }
}

/// Rename tool - renames a file or folder in place.
pub struct FsRenameTool;

impl FsRenameTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "rename_item";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Rename a file or folder";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::required("old_path", ParamKind::String).describe("Existing path"))
            .param(ParamSpec::required("new_path", ParamKind::String).describe("New path"))
    }

    #[instrument(skip(security))]
    pub fn execute(old_path: &str, new_path: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Rename tool called: '{}' -> '{}'", old_path, new_path);

        let from = validate_path(old_path, security)?;
        let to = validate_new_path(new_path, security)?;
        fs::rename(&from, &to).map_err(|e| describe_io_error("rename", old_path, new_path, e))?;

        Ok(format!("Renamed '{old_path}' to '{new_path}'."))
    }
}

/// Copy tool - copies a file, into a directory when the destination is one.
pub struct FsCopyTool;

impl FsCopyTool {
    pub const NAME: &'static str = "copy_file";
    pub const DESCRIPTION: &'static str = "Copy a file to a new location";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::required("source", ParamKind::String).describe("File to copy"))
            .param(
                ParamSpec::required("destination", ParamKind::String)
                    .describe("Target file, or directory to copy into"),
            )
    }

    #[instrument(skip(security))]
    pub fn execute(source: &str, destination: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Copy tool called: '{}' -> '{}'", source, destination);

        let from = validate_path(source, security)?;
        if !from.is_file() {
            return Err(HandlerError::failed(format!("'{source}' is not a file.")));
        }
        let to = resolve_destination(&from, destination, security)?;
        fs::copy(&from, &to).map_err(|e| describe_io_error("copy", source, destination, e))?;

        Ok(format!("Copied '{source}' to '{destination}'."))
    }
}

/// Move tool - renames, falling back to copy and delete across filesystems.
pub struct FsMoveTool;

impl FsMoveTool {
    pub const NAME: &'static str = "move_file";
    pub const DESCRIPTION: &'static str = "Move a file to a new location";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::required("source", ParamKind::String).describe("Path to move"))
            .param(
                ParamSpec::required("destination", ParamKind::String)
                    .describe("Target path, or directory to move into"),
            )
    }

    #[instrument(skip(security))]
    pub fn execute(source: &str, destination: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Move tool called: '{}' -> '{}'", source, destination);

        let from = validate_path(source, security)?;
        let to = resolve_destination(&from, destination, security)?;

        match fs::rename(&from, &to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices && from.is_file() => {
                fs::copy(&from, &to).map_err(|e| describe_io_error("move", source, destination, e))?;
                fs::remove_file(&from)
                    .map_err(|e| describe_io_error("move", source, destination, e))?;
            }
            Err(e) => return Err(describe_io_error("move", source, destination, e)),
        }

        Ok(format!("Moved '{source}' to '{destination}'."))
    }
}

// ============================================================================
// Tests
// ============================================================================

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

    fn s(p: &Path) -> &str {
        p.to_str().unwrap()
    }

    #[test]
    fn test_rename_file() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("old.txt");
        let new = temp_dir.path().join("new.txt");
        fs::write(&old, "content").unwrap();

        let text = FsRenameTool::execute(s(&old), s(&new), &rooted(&temp_dir)).unwrap();
        assert!(text.starts_with("Renamed"));
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(&new).unwrap(), "content");
    }

    #[test]
    fn test_rename_directory() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("old_dir");
        let new = temp_dir.path().join("new_dir");
        fs::create_dir(&old).unwrap();

        FsRenameTool::execute(s(&old), s(&new), &rooted(&temp_dir)).unwrap();
        assert!(new.is_dir());
    }

    #[test]
    fn test_rename_nonexistent_source() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("missing.txt");
        let new = temp_dir.path().join("new.txt");

        assert!(FsRenameTool::execute(s(&old), s(&new), &rooted(&temp_dir)).is_err());
    }

    #[test]
    fn test_copy_into_directory_keeps_name() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("report.txt");
        let dest_dir = temp_dir.path().join("archive");
        fs::write(&src, "data").unwrap();
        fs::create_dir(&dest_dir).unwrap();

        FsCopyTool::execute(s(&src), s(&dest_dir), &rooted(&temp_dir)).unwrap();
        assert!(src.exists());
        assert_eq!(fs::read_to_string(dest_dir.join("report.txt")).unwrap(), "data");
    }

    #[test]
    fn test_copy_directory_refused() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("dir");
        fs::create_dir(&src).unwrap();
        let dest = temp_dir.path().join("copy");

        let err = FsCopyTool::execute(s(&src), s(&dest), &rooted(&temp_dir)).unwrap_err();
        assert!(err.to_string().contains("is not a file"));
    }

    #[test]
    fn test_move_file_to_different_directory() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("file.txt");
        let dest_dir = temp_dir.path().join("sub");
        fs::write(&src, "x").unwrap();
        fs::create_dir(&dest_dir).unwrap();

        let text = FsMoveTool::execute(s(&src), s(&dest_dir), &rooted(&temp_dir)).unwrap();
        assert!(text.starts_with("Moved"));
        assert!(!src.exists());
        assert!(dest_dir.join("file.txt").exists());
    }

    #[test]
    fn test_move_outside_root_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let src = temp_dir.path().join("file.txt");
        fs::write(&src, "x").unwrap();

        let result = FsMoveTool::execute(s(&src), s(&outside.path().join("file.txt")), &rooted(&temp_dir));
        assert!(matches!(result, Err(HandlerError::PathSecurity(_))));
        assert!(src.exists());
    }
}
