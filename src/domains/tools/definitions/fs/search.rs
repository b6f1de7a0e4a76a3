//! Search tool definition.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::core::config::SecurityConfig;
use crate::core::security::validate_path;
use crate::domains::tools::{HandlerError, OperationSpec, ParamKind, ParamSpec};

/// Search tool - finds a file or folder by exact name below a directory.
pub struct FsSearchTool;

impl FsSearchTool {
    pub const NAME: &'static str = "search_file";
    pub const DESCRIPTION: &'static str = "Search for a file in a directory tree";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::required("name", ParamKind::String).describe("Exact file or folder name"))
            .param(ParamSpec::optional("start_path", ParamKind::String, "."))
    }

    #[instrument(skip(security))]
    pub fn execute(name: &str, start_path: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Search tool called for '{}' from '{}'", name, start_path);

        let start = validate_path(start_path, security)?;
        if !start.is_dir() {
            return Err(HandlerError::failed(format!("'{start_path}' is not a directory.")));
        }

        match find(&start, name) {
            Some(found) => Ok(found.display().to_string()),
            None => Err(HandlerError::not_found(format!(
                "'{name}' not found from '{start_path}'."
            ))),
        }
    }
}

/// Depth-first walk; entries of a directory are checked before descending.
/// Symlinked directories are not followed.
fn find(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping unreadable directory {}: {}", dir.display(), e);
            return None;
        }
    };

    let mut subdirs = Vec::new();
    let mut names: Vec<_> = entries.filter_map(Result::ok).collect();
    names.sort_by_key(|e| e.file_name());

    for entry in names {
        if entry.file_name() == name {
            return Some(entry.path());
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            subdirs.push(entry.path());
        }
    }

    subdirs.iter().find_map(|sub| find(sub, name))
}
