use std::io;
use std::path::{Component, Path, PathBuf};

use crate::core::config::SecurityConfig;

/// Errors that can occur during path validation
#[derive(Debug, thiserror::Error)]
pub enum PathSecurityError {
    #[error("Path '{path}' is outside allowed root directory '{root}'")]
    OutsideRootDirectory { path: PathBuf, root: PathBuf },

    #[error("Symlink '{path}' points outside allowed root directory")]
    SymlinkOutsideRoot { path: PathBuf },

    #[error("Symlinks are not allowed: '{path}'")]
    SymlinkNotAllowed { path: PathBuf },

    #[error("Cannot canonicalize path '{path}': {error}")]
    CannotCanonicalize { path: PathBuf, error: io::Error },

    #[error("Path does not exist: '{path}'")]
    PathNotFound { path: PathBuf },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    #[error("IO error for path '{path}': {error}")]
    IoError { path: PathBuf, error: io::Error },
}

/// Validates that an existing path is within the configured security boundaries.
///
/// This function performs the following checks:
/// 1. Rejects symlinks outright when `allow_symlinks` is off
/// 2. Canonicalizes the input path to resolve `.`, `..`, and symlinks
/// 3. If a root path is configured, ensures the canonical path is within that root
///
/// Returns the canonicalized path.
///
/// ```rust,ignore
/// let safe_path = validate_path("notes/todo.txt", &config.security)?;
/// ```
pub fn validate_path(input_path: &str, security: &SecurityConfig) -> Result<PathBuf, PathSecurityError> {
    let path = Path::new(input_path);

    let is_symlink = path
        .symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if is_symlink && !security.allow_symlinks {
        return Err(PathSecurityError::SymlinkNotAllowed {
            path: path.to_path_buf(),
        });
    }

    let canonical_path = canonicalize_path(path)?;

    let Some(root) = &security.root_path else {
        return Ok(canonical_path);
    };
    let canonical_root = canonical_root(root)?;

    if !is_within_root(&canonical_path, &canonical_root) {
        return Err(if is_symlink {
            PathSecurityError::SymlinkOutsideRoot {
                path: path.to_path_buf(),
            }
        } else {
            PathSecurityError::OutsideRootDirectory {
                path: canonical_path,
                root: canonical_root,
            }
        });
    }

    Ok(canonical_path)
}

/// Validates a path that is about to be created.
///
/// The nearest existing ancestor is canonicalized and checked against the
/// root; the missing tail may only contain plain names (no `.` or `..`).
/// Existing paths go through [`validate_path`].
pub fn validate_new_path(input_path: &str, security: &SecurityConfig) -> Result<PathBuf, PathSecurityError> {
    let path = Path::new(input_path);
    if input_path.trim().is_empty() {
        return Err(PathSecurityError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is empty",
        });
    }
    if path.symlink_metadata().is_ok() {
        return validate_path(input_path, security);
    }

    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        match existing.parent() {
            Some(parent) => {
                let name = existing.file_name().ok_or(PathSecurityError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "path must end in a file or directory name",
                })?;
                tail.push(name.to_os_string());
                existing = parent;
                if existing.as_os_str().is_empty() || existing.symlink_metadata().is_ok() {
                    break;
                }
            }
            None => {
                return Err(PathSecurityError::PathNotFound {
                    path: path.to_path_buf(),
                });
            }
        }
    }

    let missing = path
        .strip_prefix(existing)
        .map_err(|_| PathSecurityError::InvalidPath {
            path: path.to_path_buf(),
            reason: "cannot resolve parent directory",
        })?;
    if missing.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(PathSecurityError::InvalidPath {
            path: path.to_path_buf(),
            reason: "'.' and '..' are not allowed in new path components",
        });
    }

    let anchor = if existing.as_os_str().is_empty() {
        Path::new(".")
    } else {
        existing
    };
    let anchor = anchor
        .to_str()
        .ok_or(PathSecurityError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8",
        })?;
    let canonical_anchor = validate_path(anchor, security)?;

    Ok(tail
        .into_iter()
        .rev()
        .fold(canonical_anchor, |acc, name| acc.join(name)))
}

fn canonical_root(root: &Path) -> Result<PathBuf, PathSecurityError> {
    root.canonicalize().map_err(|e| PathSecurityError::IoError {
        path: root.to_path_buf(),
        error: e,
    })
}

/// Checks if a path is within (or equal to) a root directory
fn is_within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

fn canonicalize_path(path: &Path) -> Result<PathBuf, PathSecurityError> {
    path.canonicalize().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PathSecurityError::PathNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PathSecurityError::CannotCanonicalize {
                path: path.to_path_buf(),
                error: e,
            }
        }
    })
}
