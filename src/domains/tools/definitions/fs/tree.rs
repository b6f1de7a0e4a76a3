//! Tree view tool definition.

use std::fs;
use std::path::Path;

use tracing::{info, instrument};

use crate::core::config::SecurityConfig;
use crate::core::security::validate_path;
use crate::domains::tools::{HandlerError, OperationSpec, ParamKind, ParamSpec};

/// Tree tool - renders a directory as indented `- name` lines.
pub struct FsTreeTool;

impl FsTreeTool {
    pub const NAME: &'static str = "view_tree";
    pub const DESCRIPTION: &'static str = "Display directory structure";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::optional("path", ParamKind::String, "."))
            .param(
                ParamSpec::optional("depth", ParamKind::Integer, 2)
                    .describe("Deepest level to descend into (0 lists only the top level)"),
            )
    }

    #[instrument(skip(security))]
    pub fn execute(path: &str, depth: i64, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Tree tool called for '{}' (depth {})", path, depth);

        if depth < 0 {
            return Err(HandlerError::failed("depth must not be negative"));
        }
        let root = validate_path(path, security)?;
        if !root.is_dir() {
            return Err(HandlerError::failed(format!("'{path}' is not a directory.")));
        }

        let mut lines = Vec::new();
        walk(&root, 0, depth as usize, &mut lines)?;

        if lines.is_empty() {
            Ok(format!("No files in '{path}'"))
        } else {
            Ok(lines.join("\n"))
        }
    }
}

fn walk(dir: &Path, level: usize, max_depth: usize, lines: &mut Vec<String>) -> Result<(), HandlerError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(Result::ok).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        lines.push(format!(
            "{}- {}",
            "  ".repeat(level),
            entry.file_name().to_string_lossy()
        ));
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && level < max_depth {
            walk(&entry.path(), level + 1, max_depth, lines)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("src/deep/deeper")).unwrap();
        fs::write(temp_dir.path().join("README.md"), "").unwrap();
        fs::write(temp_dir.path().join("src/main.rs"), "").unwrap();
        temp_dir
    }

    #[test]
    fn test_tree_respects_depth() {
        let temp_dir = fixture();
        let text = FsTreeTool::execute(
            temp_dir.path().to_str().unwrap(),
            1,
            &SecurityConfig::default(),
        )
        .unwrap();
        assert_eq!(text, "- README.md\n- src\n  - deep\n  - main.rs");
    }

    #[test]
    fn test_tree_default_depth_lists_three_levels() {
        let temp_dir = fixture();
        let text = FsTreeTool::execute(
            temp_dir.path().to_str().unwrap(),
            2,
            &SecurityConfig::default(),
        )
        .unwrap();
        assert!(text.contains("    - deeper"));
    }

    #[test]
    fn test_tree_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_str().unwrap();
        let text = FsTreeTool::execute(path, 2, &SecurityConfig::default()).unwrap();
        assert_eq!(text, format!("No files in '{path}'"));
    }

    #[test]
    fn test_tree_negative_depth() {
        let temp_dir = TempDir::new().unwrap();
        assert!(
            FsTreeTool::execute(temp_dir.path().to_str().unwrap(), -1, &SecurityConfig::default())
                .is_err()
        );
    }
}
