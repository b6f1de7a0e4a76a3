//! Local filesystem adapter.
//!
//! Every caller-supplied path goes through the sandbox validator. The
//! filesystem calls themselves are blocking, so each operation runs on
//! tokio's blocking pool.

pub mod delete;
pub mod list_dir;
pub mod read;
pub mod rename;
pub mod search;
pub mod tree;
pub mod write;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::core::config::SecurityConfig;
use crate::domains::tools::{
    Arguments, Handler, HandlerError, OperationRegistry, OperationSpec, ParamKind, ParamSpec,
    RegistryError, with_state,
};

pub use delete::FsDeleteTool;
pub use list_dir::FsListDirTool;
pub use read::{FsMetadataTool, FsReadTool};
pub use rename::{FsCopyTool, FsMoveTool, FsRenameTool};
pub use search::FsSearchTool;
pub use tree::FsTreeTool;
pub use write::{FsAppendTool, FsClearTool, FsCreateFileTool, FsCreateFolderTool};

/// Filesystem adapter state shared by all of its operations.
pub struct FilesystemAdapter {
    pub(crate) security: SecurityConfig,
    pub(crate) preview_chars: usize,
}

impl FilesystemAdapter {
    pub const HELLO: &'static str = "hello_filesystem";

    pub fn new(security: SecurityConfig, preview_chars: usize) -> Self {
        Self {
            security,
            preview_chars,
        }
    }

    /// Register every filesystem operation.
    pub fn register(self: Arc<Self>, registry: &mut OperationRegistry) -> Result<(), RegistryError> {
        registry.register(
            FsListDirTool::spec(),
            self.blocking(|fs, a| FsListDirTool::execute(&a.string("path")?, &fs.security)),
        )?;
        registry.register(
            FsReadTool::spec(),
            self.blocking(|fs, a| FsReadTool::execute(&a.string("path")?, fs.preview_chars, &fs.security)),
        )?;
        registry.register(
            FsMetadataTool::spec(),
            self.blocking(|fs, a| FsMetadataTool::execute(&a.string("path")?, &fs.security)),
        )?;
        registry.register(
            FsCreateFileTool::spec(),
            self.blocking(|fs, a| {
                FsCreateFileTool::execute(&a.string("path")?, &a.string("content")?, &fs.security)
            }),
        )?;
        registry.register(
            FsAppendTool::spec(),
            self.blocking(|fs, a| {
                FsAppendTool::execute(&a.string("path")?, &a.string("content")?, &fs.security)
            }),
        )?;
        registry.register(
            FsClearTool::spec(),
            self.blocking(|fs, a| FsClearTool::execute(&a.string("path")?, &fs.security)),
        )?;
        registry.register(
            FsDeleteTool::spec(),
            self.blocking(|fs, a| FsDeleteTool::execute(&a.string("path")?, &fs.security)),
        )?;
        registry.register(
            FsCreateFolderTool::spec(),
            self.blocking(|fs, a| FsCreateFolderTool::execute(&a.string("path")?, &fs.security)),
        )?;
        registry.register(
            FsRenameTool::spec(),
            self.blocking(|fs, a| {
                FsRenameTool::execute(&a.string("old_path")?, &a.string("new_path")?, &fs.security)
            }),
        )?;
        registry.register(
            FsCopyTool::spec(),
            self.blocking(|fs, a| {
                FsCopyTool::execute(&a.string("source")?, &a.string("destination")?, &fs.security)
            }),
        )?;
        registry.register(
            FsMoveTool::spec(),
            self.blocking(|fs, a| {
                FsMoveTool::execute(&a.string("source")?, &a.string("destination")?, &fs.security)
            }),
        )?;
        registry.register(
            FsSearchTool::spec(),
            self.blocking(|fs, a| {
                FsSearchTool::execute(&a.string("name")?, &a.string("start_path")?, &fs.security)
            }),
        )?;
        registry.register(
            FsTreeTool::spec(),
            self.blocking(|fs, a| FsTreeTool::execute(&a.string("path")?, a.i64("depth")?, &fs.security)),
        )?;
        registry.register(
            OperationSpec::new(Self::HELLO, "Simple test tool for File System")
                .param(ParamSpec::optional("name", ParamKind::String, "World")),
            |a: Arguments| async move {
                Ok::<_, HandlerError>(Value::String(format!(
                    "Hello from the File System Explorer, {}!",
                    a.string("name")?
                )))
            },
        )?;

        debug!("Filesystem adapter registered");
        Ok(())
    }

    /// Wrap a blocking operation so it runs on the blocking pool.
    fn blocking<F>(self: &Arc<Self>, op: F) -> impl Handler + use<F>
    where
        F: Fn(&FilesystemAdapter, &Arguments) -> Result<String, HandlerError> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        with_state(self.clone(), move |fs, arguments| {
            let op = op.clone();
            async move {
                tokio::task::spawn_blocking(move || op(fs.as_ref(), &arguments))
                    .await
                    .map_err(|e| HandlerError::failed(format!("filesystem task failed: {e}")))?
            }
        })
    }
}
