//! Read-only file tools: preview contents and metadata.

use std::fs::{self, File};
use std::io::Read;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::core::config::SecurityConfig;
use crate::core::security::validate_path;
use crate::domains::tools::{HandlerError, OperationSpec, ParamKind, ParamSpec};

/// Read file tool - returns the first characters of a UTF-8 text file.
pub struct FsReadTool;

impl FsReadTool {
    pub const NAME: &'static str = "read_file";
    pub const DESCRIPTION: &'static str = "Read the contents of a text file";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION)
            .param(ParamSpec::required("path", ParamKind::String).describe("File to read"))
    }

    #[instrument(skip(security))]
    pub fn execute(path: &str, max_chars: usize, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("Read file tool called for path: {}", path);

        let file = validate_path(path, security)?;
        if !file.is_file() {
            return Err(HandlerError::failed(format!("'{path}' is not a file.")));
        }

        // Bound the read: a UTF-8 char is at most 4 bytes.
        let cap = (max_chars as u64).saturating_mul(4);
        let mut bytes = Vec::new();
        File::open(&file)?.take(cap).read_to_end(&mut bytes)?;
        let hit_cap = bytes.len() as u64 == cap;

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text,
            // The byte cap may split the last character; keep the valid prefix.
            Err(e) if hit_cap && e.error_len().is_none() => {
                std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default()
            }
            Err(_) => {
                return Err(HandlerError::failed(format!(
                    "'{path}' is not a UTF-8 text file."
                )));
            }
        };

        Ok(text.chars().take(max_chars).collect())
    }
}

/// File metadata tool - size, timestamps and kind of a path.
pub struct FsMetadataTool;

impl FsMetadataTool {
    pub const NAME: &'static str = "file_metadata";
    pub const DESCRIPTION: &'static str = "Get metadata for a file";

    pub fn spec() -> OperationSpec {
        OperationSpec::new(Self::NAME, Self::DESCRIPTION).param(
            ParamSpec::required("path", ParamKind::String).describe("File or directory to inspect"),
        )
    }

    #[instrument(skip(security))]
    pub fn execute(path: &str, security: &SecurityConfig) -> Result<String, HandlerError> {
        info!("File metadata tool called for path: {}", path);

        let resolved = validate_path(path, security)?;
        let metadata = fs::metadata(&resolved)?;

        Ok(format!(
            "Path: {}\nSize: {} bytes\nModified: {}\nCreated: {}\nIs Directory: {}",
            path,
            metadata.len(),
            format_time(metadata.modified()),
            format_time(metadata.created()),
            metadata.is_dir()
        ))
    }
}

fn format_time(time: std::io::Result<SystemTime>) -> String {
    match time {
        Ok(time) => DateTime::<Utc>::from(time).to_rfc3339(),
        Err(_) => "unavailable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> SecurityConfig {
        SecurityConfig::default()
    }

    #[test]
    fn test_read_truncates_to_preview() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("long.txt");
        fs::write(&file, "é".repeat(1500)).unwrap();

        let text = FsReadTool::execute(file.to_str().unwrap(), 1000, &open()).unwrap();
        assert_eq!(text.chars().count(), 1000);
    }

    #[test]
    fn test_read_short_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("short.txt");
        fs::write(&file, "hello").unwrap();

        assert_eq!(
            FsReadTool::execute(file.to_str().unwrap(), 1000, &open()).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_read_directory_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = FsReadTool::execute(temp_dir.path().to_str().unwrap(), 1000, &open()).unwrap_err();
        assert!(err.to_string().contains("is not a file"));
    }

    #[test]
    fn test_read_binary_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("blob.bin");
        fs::write(&file, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        assert!(FsReadTool::execute(file.to_str().unwrap(), 1000, &open()).is_err());
    }

    #[test]
    fn test_read_rejects_truncated_char_below_cap() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("cut.txt");
        fs::write(&file, [b'a', b'b', 0xc3]).unwrap();

        let err = FsReadTool::execute(file.to_str().unwrap(), 1000, &open()).unwrap_err();
        assert!(err.to_string().contains("not a UTF-8 text file"));
    }

    #[test]
    fn test_metadata_reports_size_and_kind() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.txt");
        fs::write(&file, "12345").unwrap();

        let text = FsMetadataTool::execute(file.to_str().unwrap(), &open()).unwrap();
        assert!(text.contains("Size: 5 bytes"));
        assert!(text.contains("Is Directory: false"));
    }

    #[test]
    fn test_metadata_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(FsMetadataTool::execute(missing.to_str().unwrap(), &open()).is_err());
    }
}
