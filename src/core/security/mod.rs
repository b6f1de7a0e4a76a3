// Security module for path validation and access control
//
// Filesystem and git operations resolve every caller-supplied path through
// this module, keeping them inside the configured root directory.

pub mod path_validator;

pub use path_validator::{PathSecurityError, validate_new_path, validate_path};
