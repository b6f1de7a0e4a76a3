//! Branch, merge and remote synchronisation operations.

use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use super::{GitAdapter, GitOutput, command_name};
use crate::domains::tools::HandlerError;

/// Field and record separators for `git log --format`.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

fn conflict_or_error(args: &[&str], out: &GitOutput) -> HandlerError {
    let text = out.combined();
    if text.contains("CONFLICT") {
        HandlerError::failed(format!(
            "Merge conflict occurred: {text}\nPlease resolve conflicts manually."
        ))
    } else {
        HandlerError::external(command_name(args), out.error_text())
    }
}

impl GitAdapter {
    async fn require_branch(&self, repo: &std::path::Path, branch: &str) -> Result<(), HandlerError> {
        Self::plain_arg("branch", branch)?;
        if self.local_branches(repo).await?.iter().any(|b| b == branch) {
            Ok(())
        } else {
            Err(HandlerError::not_found(format!("Branch '{branch}' does not exist.")))
        }
    }

    #[instrument(skip(self))]
    pub async fn push_changes_local(
        &self,
        repo_path: &str,
        remote_name: &str,
        branch: Option<String>,
        set_upstream: bool,
    ) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        let remotes = self.remotes(&repo).await?;
        if remotes.is_empty() {
            return Err(HandlerError::failed("No remotes configured for this repository."));
        }
        if !remotes.iter().any(|r| r == remote_name) {
            return Err(HandlerError::not_found(format!(
                "Remote '{remote_name}' not found. Available remotes: {}",
                remotes.join(", ")
            )));
        }

        let branch = self.branch_or_current(&repo, branch).await?;
        let refspec = format!("{branch}:{branch}");
        let mut args = vec!["push"];
        if set_upstream {
            args.push("-u");
        }
        args.extend([remote_name, refspec.as_str()]);

        let out = self.output(&repo, &args).await?;
        if !out.success {
            let text = out.error_text();
            warn!("Push to {}/{} failed: {}", remote_name, branch, text);
            if text.contains("non-fast-forward") || text.contains("[rejected]") {
                return Err(HandlerError::failed(format!(
                    "Push rejected: the remote contains work you do not have locally. Pull first. ({text})"
                )));
            }
            if text.contains("Permission denied") || text.contains("Authentication failed") {
                return Err(HandlerError::failed(format!(
                    "Push failed: permission denied. Check your credentials for '{remote_name}'. ({text})"
                )));
            }
            return Err(HandlerError::external("git push", text));
        }

        info!("Pushed {} to {}", branch, remote_name);
        if set_upstream {
            Ok(format!(
                "Changes pushed and upstream tracking set for {remote_name}/{branch}."
            ))
        } else {
            Ok(format!("Changes pushed to {remote_name}/{branch}."))
        }
    }

    #[instrument(skip(self))]
    pub async fn push_to_github(&self, local_repo_path: &str, branch: Option<String>) -> Result<String, HandlerError> {
        let repo = self.open_repo(local_repo_path)?;
        if !self.remotes(&repo).await?.iter().any(|r| r == "origin") {
            return Err(HandlerError::failed(
                "No 'origin' remote configured. Use set_remote first.",
            ));
        }
        let branch = self.branch_or_current(&repo, branch).await?;

        let args = ["push", "-u", "origin", branch.as_str()];
        let out = self.output(&repo, &args).await?;
        if !out.success {
            return Err(HandlerError::external("git push", out.error_text()));
        }
        Ok(format!(
            "Successfully pushed to GitHub: {branch} → origin/{branch}\n{}",
            out.combined()
        ))
    }

    #[instrument(skip(self))]
    pub async fn pull(&self, repo_path: &str, branch: Option<String>) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        if self.remotes(&repo).await?.is_empty() {
            return Err(HandlerError::failed("No remotes configured for this repository."));
        }
        let branch = self.branch_or_current(&repo, branch).await?;

        let args = ["pull", "origin", branch.as_str()];
        let out = self.output(&repo, &args).await?;
        if !out.success {
            return Err(conflict_or_error(&args, &out));
        }
        Ok(format!("Pulled latest changes from {branch}."))
    }

    #[instrument(skip(self))]
    pub async fn fetch_all(&self, repo_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        let remotes = self.remotes(&repo).await?;
        if remotes.is_empty() {
            return Ok("No remotes found for this repository.".to_string());
        }
        self.git(&repo, &["fetch", "--all"]).await?;
        Ok(format!(
            "Successfully fetched updates from all {} remotes.",
            remotes.len()
        ))
    }

    #[instrument(skip(self))]
    pub async fn create_branch(&self, repo_path: &str, branch_name: &str) -> Result<String, HandlerError> {
        Self::plain_arg("branch name", branch_name)?;
        let repo = self.open_repo(repo_path)?;
        if self.local_branches(&repo).await?.iter().any(|b| b == branch_name) {
            return Err(HandlerError::failed(format!(
                "Branch '{branch_name}' already exists."
            )));
        }
        self.git(&repo, &["checkout", "-b", branch_name]).await?;
        Ok(format!("Branch '{branch_name}' created and switched."))
    }

    #[instrument(skip(self))]
    pub async fn checkout_branch(&self, repo_path: &str, branch_name: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        self.require_branch(&repo, branch_name).await?;
        self.git(&repo, &["checkout", branch_name]).await?;
        Ok(format!("Switched to branch '{branch_name}'."))
    }

    #[instrument(skip(self))]
    pub async fn list_branches(&self, repo_path: &str) -> Result<Value, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        Ok(json!(self.local_branches(&repo).await?))
    }

    /// Most recent commits first, as `{hash, message, author, date}` objects.
    #[instrument(skip(self))]
    pub async fn list_commits(
        &self,
        repo_path: &str,
        branch: Option<String>,
        count: i64,
    ) -> Result<Value, HandlerError> {
        if count < 1 {
            return Err(HandlerError::failed("count must be at least 1"));
        }
        let repo = self.open_repo(repo_path)?;
        let rev = match branch.filter(|b| !b.trim().is_empty()) {
            Some(branch) => Self::plain_arg("branch", &branch)?.to_string(),
            None => "HEAD".to_string(),
        };
        let limit = count.to_string();
        let log = self
            .git(
                &repo,
                &[
                    "log",
                    "-n",
                    limit.as_str(),
                    "--format=%H%x1f%an%x1f%cI%x1f%B%x1e",
                    "--end-of-options",
                    rev.as_str(),
                    "--",
                ],
            )
            .await?;

        let commits: Vec<Value> = log
            .split(RECORD_SEP)
            .filter_map(|record| {
                let mut fields = record.trim_start_matches('\n').splitn(4, FIELD_SEP);
                let hash = fields.next()?.trim();
                if hash.is_empty() {
                    return None;
                }
                let author = fields.next()?;
                let date = fields.next()?;
                let message = fields.next().unwrap_or_default().trim();
                Some(json!({
                    "hash": hash,
                    "message": message,
                    "author": author,
                    "date": date,
                }))
            })
            .collect();
        Ok(Value::Array(commits))
    }

    #[instrument(skip(self))]
    pub async fn merge_branch(
        &self,
        repo_path: &str,
        source_branch: &str,
        target_branch: Option<String>,
    ) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        let target = self.branch_or_current(&repo, target_branch).await?;
        self.require_branch(&repo, source_branch).await?;
        self.require_branch(&repo, &target).await?;

        self.git(&repo, &["checkout", target.as_str()]).await?;
        let args = ["merge", source_branch];
        let out = self.output(&repo, &args).await?;
        if !out.success {
            return Err(conflict_or_error(&args, &out));
        }
        Ok(format!(
            "Merged '{source_branch}' into '{target}': {}",
            out.combined()
        ))
    }

    #[instrument(skip(self))]
    pub async fn abort_merge(&self, repo_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        self.git(&repo, &["merge", "--abort"]).await?;
        Ok("Merge aborted successfully.".to_string())
    }

    #[instrument(skip(self))]
    pub async fn rebase_branch(&self, local_repo_path: &str, onto_branch: &str) -> Result<String, HandlerError> {
        Self::plain_arg("branch", onto_branch)?;
        let repo = self.open_repo(local_repo_path)?;
        let current = self.current_branch(&repo).await?;
        self.require_branch(&repo, onto_branch).await?;

        let args = ["rebase", onto_branch];
        let out = self.output(&repo, &args).await?;
        if !out.success {
            return Err(conflict_or_error(&args, &out));
        }
        Ok(format!("Successfully rebased '{current}' onto '{onto_branch}'."))
    }

    #[instrument(skip(self))]
    pub async fn abort_rebase(&self, local_repo_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(local_repo_path)?;
        self.git(&repo, &["rebase", "--abort"]).await?;
        Ok("Rebase aborted successfully.".to_string())
    }
}
