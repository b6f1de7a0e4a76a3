//! Repository setup, file and remote operations.

use std::path::Path;

use tracing::{info, instrument, warn};

use super::GitAdapter;
use super::url::{is_hosted_remote, local_remote_path};
use crate::core::security::{validate_new_path, validate_path};
use crate::domains::tools::HandlerError;

/// Scratch repository used by `add_file_to_repo`, below the repo base.
const SCRATCH_REPO: &str = "temp_repo";

impl GitAdapter {
    /// Initialise a repository at `dir` unless one is already there.
    /// Returns true when a new repository was created.
    async fn ensure_repo(&self, dir: &Path) -> Result<bool, HandlerError> {
        tokio::fs::create_dir_all(dir).await?;
        if tokio::fs::try_exists(dir.join(".git")).await? {
            return Ok(false);
        }
        self.git(dir, &["init"]).await?;
        Ok(true)
    }

    /// Accept hosted remotes, or local repositories inside the sandbox root.
    fn check_remote_url(&self, url: &str) -> Result<(), HandlerError> {
        if is_hosted_remote(url) {
            return Ok(());
        }
        if let Some(path) = local_remote_path(url) {
            let dir = validate_path(&path.to_string_lossy(), &self.security)?;
            if !dir.is_dir() {
                return Err(HandlerError::failed(format!("'{url}' is not a directory.")));
            }
            return Ok(());
        }
        warn!("Rejected remote URL: {}", url);
        Err(HandlerError::failed(format!(
            "'{url}' is not a supported git URL (GitHub, GitLab or Bitbucket over HTTPS/SSH, or a local repository)."
        )))
    }

    async fn replace_origin(&self, repo: &Path, url: &str) -> Result<(), HandlerError> {
        if self.remotes(repo).await?.iter().any(|r| r == "origin") {
            self.git(repo, &["remote", "remove", "origin"]).await?;
        }
        self.git(repo, &["remote", "add", "origin", url]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_repo_if_not_found(&self, path: &str) -> Result<String, HandlerError> {
        let dir = validate_new_path(path, &self.security)?;
        if self.ensure_repo(&dir).await? {
            info!("Initialised repository at {}", dir.display());
            Ok(format!("Repo initialized at {path}"))
        } else {
            Ok("Repo already present.".to_string())
        }
    }

    #[instrument(skip(self))]
    pub async fn clone_to_path(&self, repo_url: &str, save_path: &str, depth: Option<i64>) -> Result<String, HandlerError> {
        self.check_remote_url(repo_url)?;
        let target = validate_new_path(save_path, &self.security)?;
        if tokio::fs::try_exists(&target).await? {
            return Err(HandlerError::failed(format!("Path '{save_path}' already exists.")));
        }

        let parent = target
            .parent()
            .ok_or_else(|| HandlerError::failed(format!("'{save_path}' has no parent directory.")))?;
        tokio::fs::create_dir_all(parent).await?;

        let target_str = target.to_string_lossy();
        let depth_arg = depth.filter(|d| *d > 0).map(|d| d.to_string());
        let mut args = vec!["clone"];
        if let Some(depth) = &depth_arg {
            args.extend(["--depth", depth.as_str()]);
        }
        args.extend(["--", repo_url, target_str.as_ref()]);

        self.git(parent, &args).await?;
        info!("Cloned {} to {}", repo_url, target.display());
        Ok(format!("Cloned to {save_path}"))
    }

    #[instrument(skip(self))]
    pub async fn add_file_to_repo(&self, file_path: &str, repo_url: &str, branch: &str) -> Result<String, HandlerError> {
        self.check_remote_url(repo_url)?;
        Self::plain_arg("branch", branch)?;
        let source = validate_path(file_path, &self.security)?;
        if !source.is_file() {
            return Err(HandlerError::failed(format!("'{file_path}' is not a file.")));
        }
        let name = source
            .file_name()
            .ok_or_else(|| HandlerError::failed(format!("'{file_path}' has no file name.")))?
            .to_string_lossy()
            .into_owned();

        let repo = self.repo_base.join(SCRATCH_REPO);
        self.ensure_repo(&repo).await?;
        tokio::fs::copy(&source, repo.join(&name)).await?;
        self.replace_origin(&repo, repo_url).await?;

        self.git(&repo, &["add", "--", name.as_str()]).await?;
        self.git(&repo, &["commit", "-m", "Added file"]).await?;
        let refspec = format!("HEAD:{branch}");
        self.git(&repo, &["push", "origin", refspec.as_str()]).await?;

        Ok(format!("Committed and pushed {name} to {branch}."))
    }

    #[instrument(skip(self, content))]
    pub async fn create_new_file(&self, repo_path: &str, filename: &str, content: &str) -> Result<String, HandlerError> {
        let repo = validate_new_path(repo_path, &self.security)?;
        self.ensure_repo(&repo).await?;

        let full_path = Self::repo_child(&repo, filename)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, content).await?;

        self.git(&repo, &["add", "--", filename]).await?;
        self.git(&repo, &["commit", "-m", "Created new file"]).await?;
        Ok(format!("Created and committed '{filename}'."))
    }

    #[instrument(skip(self))]
    pub async fn rename_file(&self, repo_path: &str, old_name: &str, new_name: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        let old_path = Self::repo_child(&repo, old_name)?;
        let new_path = Self::repo_child(&repo, new_name)?;

        if !tokio::fs::try_exists(&old_path).await? {
            return Err(HandlerError::not_found(format!("File '{old_name}' does not exist.")));
        }
        if let Some(parent) = new_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&old_path, &new_path).await?;
        Ok(format!("Renamed '{old_name}' to '{new_name}'."))
    }

    #[instrument(skip(self))]
    pub async fn read_repo_file(&self, repo_path: &str, file_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        let full_path = Self::repo_child(&repo, file_path)?;
        if !full_path.is_file() {
            return Err(HandlerError::not_found(format!("File '{file_path}' does not exist.")));
        }
        let bytes = tokio::fs::read(&full_path).await?;
        String::from_utf8(bytes).map_err(|_| {
            HandlerError::failed(format!(
                "File '{file_path}' appears to be a binary file and cannot be read as text."
            ))
        })
    }

    #[instrument(skip(self))]
    pub async fn check_remote(&self, local_repo_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(local_repo_path)?;
        let listing = self.git(&repo, &["remote", "-v"]).await?;
        let remotes: Vec<String> = listing
            .lines()
            .filter(|l| l.ends_with("(fetch)"))
            .filter_map(|l| {
                let mut parts = l.split_whitespace();
                Some(format!("{}: {}", parts.next()?, parts.next()?))
            })
            .collect();

        if remotes.is_empty() {
            Ok("No remotes found.".to_string())
        } else {
            Ok(format!("Remotes: {}", remotes.join(", ")))
        }
    }

    #[instrument(skip(self))]
    pub async fn set_remote(&self, repo_path: &str, github_url: &str) -> Result<String, HandlerError> {
        self.check_remote_url(github_url)?;
        if !is_hosted_remote(github_url) {
            info!("Setting local remote {}", github_url);
        }
        let repo = self.open_repo(repo_path)?;
        self.replace_origin(&repo, github_url).await?;
        Ok(format!("Remote 'origin' set to {github_url}"))
    }

    #[instrument(skip(self))]
    pub async fn get_remote_url(&self, repo_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        if self.remotes(&repo).await?.is_empty() {
            return Ok("No remote found for this repository.".to_string());
        }
        self.git(&repo, &["remote", "get-url", "origin"]).await
    }
}
