//! Git adapter.
//!
//! Operations drive the `git` command line through the [`GitCli`] trait.
//! Repository paths pass the sandbox validator; file names inside a
//! repository must be plain relative paths.

pub mod branch;
pub mod cli;
pub mod history;
pub mod repo;
pub mod url;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::core::config::SecurityConfig;
use crate::core::security::validate_path;
use crate::domains::tools::{
    HandlerError, OperationRegistry, OperationSpec, ParamKind, ParamSpec, RegistryError, with_state,
};

pub use cli::{GitCli, GitOutput, SystemGit};

/// Git adapter state shared by all of its operations.
pub struct GitAdapter {
    cli: Arc<dyn GitCli>,
    security: SecurityConfig,
    repo_base: PathBuf,
}

impl GitAdapter {
    /// `repo_base` is the scratch directory used by `add_file_to_repo`.
    pub fn new(cli: Arc<dyn GitCli>, security: SecurityConfig, repo_base: PathBuf) -> Self {
        Self {
            cli,
            security,
            repo_base,
        }
    }

    // ========================================================================
    // Helpers shared by the operation modules
    // ========================================================================

    /// Resolve an existing repository directory.
    fn open_repo(&self, path: &str) -> Result<PathBuf, HandlerError> {
        let dir = validate_path(path, &self.security)?;
        if !dir.join(".git").exists() {
            return Err(HandlerError::failed(format!(
                "'{path}' is not a git repository."
            )));
        }
        Ok(dir)
    }

    /// Join a caller-supplied relative name onto a repository directory.
    fn repo_child(repo: &Path, relative: &str) -> Result<PathBuf, HandlerError> {
        let rel = Path::new(relative);
        let plain = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.trim().is_empty() || !plain {
            return Err(HandlerError::failed(format!(
                "'{relative}' must be a relative path inside the repository."
            )));
        }
        Ok(repo.join(rel))
    }

    /// Refuse a caller-supplied ref or name that git would read as an option.
    fn plain_arg<'a>(what: &str, value: &'a str) -> Result<&'a str, HandlerError> {
        if value.trim().is_empty() {
            return Err(HandlerError::failed(format!("{what} must not be empty.")));
        }
        if value.starts_with('-') {
            return Err(HandlerError::failed(format!(
                "Invalid {what} '{value}': it must not start with '-'."
            )));
        }
        Ok(value)
    }

    async fn output(&self, dir: &Path, args: &[&str]) -> Result<GitOutput, HandlerError> {
        self.cli
            .run(dir, args)
            .await
            .map_err(|e| HandlerError::external(command_name(args), e))
    }

    /// Run git and return trimmed stdout, or fail with git's own message.
    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String, HandlerError> {
        let out = self.output(dir, args).await?;
        if out.success {
            Ok(out.stdout.trim_end().to_string())
        } else {
            Err(HandlerError::external(command_name(args), out.error_text()))
        }
    }

    async fn remotes(&self, repo: &Path) -> Result<Vec<String>, HandlerError> {
        Ok(lines(&self.git(repo, &["remote"]).await?))
    }

    async fn local_branches(&self, repo: &Path) -> Result<Vec<String>, HandlerError> {
        let out = self
            .git(repo, &["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .await?;
        Ok(lines(&out))
    }

    async fn current_branch(&self, repo: &Path) -> Result<String, HandlerError> {
        let out = self.output(repo, &["symbolic-ref", "--short", "-q", "HEAD"]).await?;
        let branch = out.stdout.trim();
        if !out.success || branch.is_empty() {
            return Err(HandlerError::failed(
                "Repository is in detached HEAD state and no branch specified.",
            ));
        }
        Ok(branch.to_string())
    }

    /// Use the given branch, or the checked-out one.
    async fn branch_or_current(&self, repo: &Path, branch: Option<String>) -> Result<String, HandlerError> {
        match branch.filter(|b| !b.trim().is_empty()) {
            Some(branch) => Self::plain_arg("branch", &branch).map(str::to_string),
            None => self.current_branch(repo).await,
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register every git operation.
    pub fn register(self: Arc<Self>, registry: &mut OperationRegistry) -> Result<(), RegistryError> {
        let s = || self.clone();

        // Repositories and files
        registry.register(
            op("create_repo_if_not_found", "Initialise a git repository at a path unless one exists")
                .param(string("path")),
            with_state(s(), |g, a| async move { g.create_repo_if_not_found(&a.string("path")?).await }),
        )?;
        registry.register(
            op("clone_to_path", "Clone a remote repository into a new directory")
                .param(string("repo_url"))
                .param(string("save_path"))
                .param(ParamSpec::maybe("depth", ParamKind::Integer).describe("Shallow clone depth")),
            with_state(s(), |g, a| async move {
                g.clone_to_path(&a.string("repo_url")?, &a.string("save_path")?, a.opt_i64("depth")?)
                    .await
            }),
        )?;
        registry.register(
            op("add_file_to_repo", "Copy a local file into a scratch clone, commit it and push it to a remote")
                .param(string("file_path"))
                .param(string("repo_url"))
                .param(ParamSpec::optional("branch", ParamKind::String, "main")),
            with_state(s(), |g, a| async move {
                g.add_file_to_repo(&a.string("file_path")?, &a.string("repo_url")?, &a.string("branch")?)
                    .await
            }),
        )?;
        registry.register(
            op("create_new_file", "Write a file inside a repository, then stage and commit it")
                .param(string("repo_path"))
                .param(string("filename"))
                .param(string("content")),
            with_state(s(), |g, a| async move {
                g.create_new_file(&a.string("repo_path")?, &a.string("filename")?, &a.string("content")?)
                    .await
            }),
        )?;
        registry.register(
            op("rename_file", "Rename a file inside a repository")
                .param(string("repo_path"))
                .param(string("old_name"))
                .param(string("new_name")),
            with_state(s(), |g, a| async move {
                g.rename_file(&a.string("repo_path")?, &a.string("old_name")?, &a.string("new_name")?)
                    .await
            }),
        )?;
        registry.register(
            op("read_repo_file", "Read a text file from a repository")
                .param(string("repo_path"))
                .param(string("file_path")),
            with_state(s(), |g, a| async move {
                g.read_repo_file(&a.string("repo_path")?, &a.string("file_path")?).await
            }),
        )?;

        // Remotes
        registry.register(
            op("check_remote", "List the remotes of a repository").param(string("local_repo_path")),
            with_state(s(), |g, a| async move { g.check_remote(&a.string("local_repo_path")?).await }),
        )?;
        registry.register(
            op("set_remote", "Point the 'origin' remote at a URL")
                .param(string("repo_path"))
                .param(string("github_url")),
            with_state(s(), |g, a| async move {
                g.set_remote(&a.string("repo_path")?, &a.string("github_url")?).await
            }),
        )?;
        registry.register(
            op("get_remote_url", "Show the URL of the 'origin' remote").param(string("repo_path")),
            with_state(s(), |g, a| async move { g.get_remote_url(&a.string("repo_path")?).await }),
        )?;
        registry.register(
            op("push_changes_local", "Push a branch to a remote")
                .param(string("repo_path"))
                .param(ParamSpec::optional("remote_name", ParamKind::String, "origin"))
                .param(ParamSpec::maybe("branch", ParamKind::String).describe("Defaults to the current branch"))
                .param(ParamSpec::optional("set_upstream", ParamKind::Boolean, true)),
            with_state(s(), |g, a| async move {
                g.push_changes_local(
                    &a.string("repo_path")?,
                    &a.string("remote_name")?,
                    a.opt_string("branch")?,
                    a.bool("set_upstream")?,
                )
                .await
            }),
        )?;
        registry.register(
            op("push_to_github", "Push a branch to 'origin' and set upstream tracking")
                .param(string("local_repo_path"))
                .param(ParamSpec::maybe("branch", ParamKind::String).describe("Defaults to the current branch")),
            with_state(s(), |g, a| async move {
                g.push_to_github(&a.string("local_repo_path")?, a.opt_string("branch")?).await
            }),
        )?;
        registry.register(
            op("pull", "Pull a branch from 'origin'")
                .param(string("repo_path"))
                .param(ParamSpec::maybe("branch", ParamKind::String).describe("Defaults to the current branch")),
            with_state(s(), |g, a| async move { g.pull(&a.string("repo_path")?, a.opt_string("branch")?).await }),
        )?;
        registry.register(
            op("fetch_all", "Fetch updates from every remote").param(string("repo_path")),
            with_state(s(), |g, a| async move { g.fetch_all(&a.string("repo_path")?).await }),
        )?;

        // Working tree and commits
        registry.register(
            op("git_status", "Show the working tree status").param(string("repo_path")),
            with_state(s(), |g, a| async move { g.status(&a.string("repo_path")?).await }),
        )?;
        registry.register(
            op("add_all_changes", "Stage every change in the working tree").param(string("repo_path")),
            with_state(s(), |g, a| async move { g.add_all_changes(&a.string("repo_path")?).await }),
        )?;
        registry.register(
            op("commit_changes", "Commit the staged changes")
                .param(string("repo_path"))
                .param(string("message")),
            with_state(s(), |g, a| async move {
                g.commit_changes(&a.string("repo_path")?, &a.string("message")?).await
            }),
        )?;
        registry.register(
            op("diff_file", "Show unstaged changes of one file")
                .param(string("repo_path"))
                .param(string("file_path")),
            with_state(s(), |g, a| async move {
                g.diff_file(&a.string("repo_path")?, &a.string("file_path")?).await
            }),
        )?;

        // Branches
        registry.register(
            op("create_branch", "Create a branch and switch to it")
                .param(string("repo_path"))
                .param(string("branch_name")),
            with_state(s(), |g, a| async move {
                g.create_branch(&a.string("repo_path")?, &a.string("branch_name")?).await
            }),
        )?;
        registry.register(
            op("checkout_branch", "Switch to an existing branch")
                .param(string("repo_path"))
                .param(string("branch_name")),
            with_state(s(), |g, a| async move {
                g.checkout_branch(&a.string("repo_path")?, &a.string("branch_name")?).await
            }),
        )?;
        registry.register(
            op("list_branches", "List local branches").param(string("repo_path")),
            with_state(s(), |g, a| async move { g.list_branches(&a.string("repo_path")?).await }),
        )?;
        registry.register(
            op("list_commits", "List recent commits of a branch")
                .param(string("repo_path"))
                .param(ParamSpec::maybe("branch", ParamKind::String).describe("Defaults to HEAD"))
                .param(ParamSpec::optional("count", ParamKind::Integer, 5)),
            with_state(s(), |g, a| async move {
                g.list_commits(&a.string("repo_path")?, a.opt_string("branch")?, a.i64("count")?)
                    .await
            }),
        )?;
        registry.register(
            op("merge_branch", "Merge one branch into another")
                .param(string("repo_path"))
                .param(string("source_branch"))
                .param(ParamSpec::maybe("target_branch", ParamKind::String).describe("Defaults to the current branch")),
            with_state(s(), |g, a| async move {
                g.merge_branch(
                    &a.string("repo_path")?,
                    &a.string("source_branch")?,
                    a.opt_string("target_branch")?,
                )
                .await
            }),
        )?;
        registry.register(
            op("abort_merge", "Abort an in-progress merge").param(string("repo_path")),
            with_state(s(), |g, a| async move { g.abort_merge(&a.string("repo_path")?).await }),
        )?;
        registry.register(
            op("rebase_branch", "Rebase the current branch onto another")
                .param(string("local_repo_path"))
                .param(string("onto_branch")),
            with_state(s(), |g, a| async move {
                g.rebase_branch(&a.string("local_repo_path")?, &a.string("onto_branch")?).await
            }),
        )?;
        registry.register(
            op("abort_rebase", "Abort an in-progress rebase").param(string("local_repo_path")),
            with_state(s(), |g, a| async move { g.abort_rebase(&a.string("local_repo_path")?).await }),
        )?;

        // History, stashes, config and tags
        registry.register(
            op("revert_commit", "Create a commit that reverts another")
                .param(string("repo_path"))
                .param(string("commit_hash")),
            with_state(s(), |g, a| async move {
                g.revert_commit(&a.string("repo_path")?, &a.string("commit_hash")?).await
            }),
        )?;
        registry.register(
            op("reset_to_commit", "Reset the current branch to a commit")
                .param(string("repo_path"))
                .param(string("commit_hash"))
                .param(ParamSpec::optional("hard", ParamKind::Boolean, false)),
            with_state(s(), |g, a| async move {
                g.reset_to_commit(&a.string("repo_path")?, &a.string("commit_hash")?, a.bool("hard")?)
                    .await
            }),
        )?;
        registry.register(
            op("stash_changes", "Stash uncommitted changes")
                .param(string("repo_path"))
                .param(ParamSpec::optional("include_untracked", ParamKind::Boolean, false)),
            with_state(s(), |g, a| async move {
                g.stash_changes(&a.string("repo_path")?, a.bool("include_untracked")?).await
            }),
        )?;
        registry.register(
            op("apply_stash", "Apply a stash entry")
                .param(string("repo_path"))
                .param(ParamSpec::optional("stash_id", ParamKind::String, "stash@{0}")),
            with_state(s(), |g, a| async move {
                g.apply_stash(&a.string("repo_path")?, &a.string("stash_id")?).await
            }),
        )?;
        registry.register(
            op("list_stashes", "List stash entries").param(string("repo_path")),
            with_state(s(), |g, a| async move { g.list_stashes(&a.string("repo_path")?).await }),
        )?;
        registry.register(
            op("get_config", "Read a repository configuration value")
                .param(string("repo_path"))
                .param(string("config_name")),
            with_state(s(), |g, a| async move {
                g.get_config(&a.string("repo_path")?, &a.string("config_name")?).await
            }),
        )?;
        registry.register(
            op("set_config", "Set a repository configuration value")
                .param(string("repo_path"))
                .param(string("config_name"))
                .param(string("value")),
            with_state(s(), |g, a| async move {
                g.set_config(&a.string("repo_path")?, &a.string("config_name")?, &a.string("value")?)
                    .await
            }),
        )?;
        registry.register(
            op("create_tag", "Create a lightweight or annotated tag")
                .param(string("repo_path"))
                .param(string("tag_name"))
                .param(ParamSpec::maybe("message", ParamKind::String).describe("Creates an annotated tag when set"))
                .param(ParamSpec::optional("commit", ParamKind::String, "HEAD")),
            with_state(s(), |g, a| async move {
                g.create_tag(
                    &a.string("repo_path")?,
                    &a.string("tag_name")?,
                    a.opt_string("message")?,
                    &a.string("commit")?,
                )
                .await
            }),
        )?;
        registry.register(
            op("delete_tag", "Delete a tag")
                .param(string("local_repo_path"))
                .param(string("tag_name")),
            with_state(s(), |g, a| async move {
                g.delete_tag(&a.string("local_repo_path")?, &a.string("tag_name")?).await
            }),
        )?;
        registry.register(
            op("list_tags", "List tags").param(string("local_repo_path")),
            with_state(s(), |g, a| async move { g.list_tags(&a.string("local_repo_path")?).await }),
        )?;

        debug!("Git adapter registered");
        Ok(())
    }
}

fn op(name: &str, description: &str) -> OperationSpec {
    OperationSpec::new(name, description)
}

fn string(name: &str) -> ParamSpec {
    ParamSpec::required(name, ParamKind::String)
}

fn command_name(args: &[&str]) -> String {
    match args.first() {
        Some(sub) => format!("git {sub}"),
        None => "git".to_string(),
    }
}

fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::domains::tools::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_registers_all_operations() {
        let root = TempDir::new().unwrap();
        let mut registry = OperationRegistry::new();
        Arc::new(fake_adapter(FakeGit::default(), &root))
            .register(&mut registry)
            .unwrap();
        assert_eq!(registry.len(), 35);
        assert!(registry.contains("read_repo_file"));
        assert!(registry.contains("abort_rebase"));
    }

    #[test]
    fn test_repo_child_rejects_escape() {
        let repo = Path::new("/tmp/repo");
        assert!(GitAdapter::repo_child(repo, "src/main.rs").is_ok());
        assert!(GitAdapter::repo_child(repo, "../outside").is_err());
        assert!(GitAdapter::repo_child(repo, "/etc/passwd").is_err());
        assert!(GitAdapter::repo_child(repo, "").is_err());
    }

    #[test]
    fn test_open_repo_requires_git_dir() {
        let root = TempDir::new().unwrap();
        let adapter = fake_adapter(FakeGit::default(), &root);
        let err = adapter.open_repo(root.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("is not a git repository"));
    }

    #[tokio::test]
    async fn test_git_failure_names_command() {
        let repo = fake_repo();
        let git = FakeGit::default().respond("status", fail("fatal: bad object\n"));
        let mut registry = OperationRegistry::new();
        Arc::new(fake_adapter(git, &repo)).register(&mut registry).unwrap();

        let result = registry
            .invoke("git_status", json!({ "repo_path": repo.path().to_str().unwrap() }))
            .await;
        assert_eq!(result.kind(), Some(ErrorKind::HandlerError));
        assert_eq!(result.to_text(), "git status failed: fatal: bad object");
    }

    #[tokio::test]
    async fn test_detached_head_requires_branch() {
        let repo = fake_repo();
        let git = FakeGit::default()
            .respond("remote", ok("origin\n"))
            .respond("symbolic-ref", fail(""));
        let adapter = fake_adapter(git, &repo);

        let err = adapter
            .pull(repo.path().to_str().unwrap(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("detached HEAD"));
    }
}
