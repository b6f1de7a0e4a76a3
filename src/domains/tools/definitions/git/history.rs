//! Working tree, commit history, stash, config and tag operations.

use serde_json::{Value, json};
use tracing::{info, instrument};

use super::{GitAdapter, lines};
use crate::domains::tools::HandlerError;

impl GitAdapter {
    #[instrument(skip(self))]
    pub async fn status(&self, repo_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        self.git(&repo, &["status"]).await
    }

    #[instrument(skip(self))]
    pub async fn add_all_changes(&self, repo_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        self.git(&repo, &["add", "--all"]).await?;
        Ok("All changes have been staged successfully.".to_string())
    }

    #[instrument(skip(self))]
    pub async fn commit_changes(&self, repo_path: &str, message: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        // Porcelain v1: first column is the index state, ' ' and '?' mean unstaged.
        let porcelain = self.git(&repo, &["status", "--porcelain"]).await?;
        let staged = porcelain
            .lines()
            .any(|l| l.chars().next().is_some_and(|c| c != ' ' && c != '?'));
        if !staged {
            return Ok("No changes to commit.".to_string());
        }
        self.git(&repo, &["commit", "-m", message]).await?;
        info!("Committed in {}", repo.display());
        Ok(format!("Changes have been committed with message: '{message}'"))
    }

    #[instrument(skip(self))]
    pub async fn diff_file(&self, repo_path: &str, file_path: &str) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        Self::repo_child(&repo, file_path)?;
        let diff = self.git(&repo, &["diff", "--", file_path]).await?;
        if diff.is_empty() {
            Ok(format!("No changes in '{file_path}'."))
        } else {
            Ok(diff)
        }
    }

    #[instrument(skip(self))]
    pub async fn revert_commit(&self, repo_path: &str, commit_hash: &str) -> Result<String, HandlerError> {
        Self::plain_arg("commit hash", commit_hash)?;
        let repo = self.open_repo(repo_path)?;
        self.git(&repo, &["revert", "--no-edit", "--end-of-options", commit_hash])
            .await?;
        Ok(format!("Commit {commit_hash} has been reverted."))
    }

    #[instrument(skip(self))]
    pub async fn reset_to_commit(&self, repo_path: &str, commit_hash: &str, hard: bool) -> Result<String, HandlerError> {
        Self::plain_arg("commit hash", commit_hash)?;
        let repo = self.open_repo(repo_path)?;
        let mode = if hard { "--hard" } else { "--mixed" };
        self.git(&repo, &["reset", mode, "--end-of-options", commit_hash, "--"])
            .await?;
        Ok(format!(
            "Repository reset to commit {commit_hash} ({}).",
            mode.trim_start_matches('-')
        ))
    }

    #[instrument(skip(self))]
    pub async fn stash_changes(&self, repo_path: &str, include_untracked: bool) -> Result<String, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        let mut args = vec!["stash", "push"];
        if include_untracked {
            args.push("--include-untracked");
        }
        let out = self.git(&repo, &args).await?;
        if out.contains("No local changes to save") {
            return Ok("No changes to stash.".to_string());
        }
        Ok(format!("Changes stashed successfully: {out}"))
    }

    #[instrument(skip(self))]
    pub async fn apply_stash(&self, repo_path: &str, stash_id: &str) -> Result<String, HandlerError> {
        Self::plain_arg("stash id", stash_id)?;
        let repo = self.open_repo(repo_path)?;
        self.git(&repo, &["stash", "apply", stash_id]).await?;
        Ok(format!("Stash {stash_id} applied successfully."))
    }

    /// `{id, description}` objects, newest first.
    #[instrument(skip(self))]
    pub async fn list_stashes(&self, repo_path: &str) -> Result<Value, HandlerError> {
        let repo = self.open_repo(repo_path)?;
        let listing = self.git(&repo, &["stash", "list"]).await?;
        let stashes: Vec<Value> = lines(&listing)
            .iter()
            .map(|line| match line.split_once(": ") {
                Some((id, description)) => json!({ "id": id, "description": description }),
                None => json!({ "id": line, "description": "" }),
            })
            .collect();

        if stashes.is_empty() {
            Ok(Value::String("No stashes found.".to_string()))
        } else {
            Ok(Value::Array(stashes))
        }
    }

    #[instrument(skip(self))]
    pub async fn get_config(&self, repo_path: &str, config_name: &str) -> Result<String, HandlerError> {
        Self::plain_arg("config name", config_name)?;
        let repo = self.open_repo(repo_path)?;
        let out = self.output(&repo, &["config", "--get", config_name]).await?;
        if !out.success {
            return Err(HandlerError::not_found(format!(
                "Configuration '{config_name}' not found."
            )));
        }
        Ok(format!("{config_name} = {}", out.stdout.trim()))
    }

    #[instrument(skip(self))]
    pub async fn set_config(&self, repo_path: &str, config_name: &str, value: &str) -> Result<String, HandlerError> {
        Self::plain_arg("config name", config_name)?;
        let repo = self.open_repo(repo_path)?;
        self.git(&repo, &["config", config_name, value]).await?;
        Ok(format!("Configuration '{config_name}' set to '{value}'."))
    }

    #[instrument(skip(self))]
    pub async fn create_tag(
        &self,
        repo_path: &str,
        tag_name: &str,
        message: Option<String>,
        commit: &str,
    ) -> Result<String, HandlerError> {
        Self::plain_arg("tag name", tag_name)?;
        Self::plain_arg("commit", commit)?;
        let repo = self.open_repo(repo_path)?;
        match message.filter(|m| !m.is_empty()) {
            Some(message) => {
                self.git(
                    &repo,
                    &["tag", "-a", "-m", message.as_str(), "--end-of-options", tag_name, commit],
                )
                .await?;
            }
            None => {
                self.git(&repo, &["tag", "--end-of-options", tag_name, commit])
                    .await?;
            }
        }
        Ok(format!("Tag '{tag_name}' created successfully."))
    }

    #[instrument(skip(self))]
    pub async fn delete_tag(&self, local_repo_path: &str, tag_name: &str) -> Result<String, HandlerError> {
        Self::plain_arg("tag name", tag_name)?;
        let repo = self.open_repo(local_repo_path)?;
        self.git(&repo, &["tag", "-d", tag_name]).await?;
        Ok(format!("Tag '{tag_name}' deleted."))
    }

    #[instrument(skip(self))]
    pub async fn list_tags(&self, local_repo_path: &str) -> Result<Value, HandlerError> {
        let repo = self.open_repo(local_repo_path)?;
        let listing = self.git(&repo, &["tag", "--list"]).await?;
        Ok(json!(lines(&listing)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    async fn seeded(root: &TempDir) -> (GitAdapter, String) {
        let adapter = system_adapter(root);
        let repo = root.path().join("repo");
        let repo_str = repo.to_str().unwrap().to_string();
        adapter
            .create_new_file(&repo_str, "notes.txt", "one\n")
            .await
            .unwrap();
        (adapter, repo_str)
    }

    #[tokio::test]
    async fn test_stage_and_commit() {
        if !git_available() {
            return;
        }
        let root = TempDir::new().unwrap();
        let (adapter, repo) = seeded(&root).await;

        assert_eq!(
            adapter.commit_changes(&repo, "empty").await.unwrap(),
            "No changes to commit."
        );

        fs::write(root.path().join("repo/notes.txt"), "two\n").unwrap();
        let diff = adapter.diff_file(&repo, "notes.txt").await.unwrap();
        assert!(diff.contains("+two"));

        // Unstaged edits alone are not committed.
        assert_eq!(
            adapter.commit_changes(&repo, "nope").await.unwrap(),
            "No changes to commit."
        );

        adapter.add_all_changes(&repo).await.unwrap();
        assert_eq!(
            adapter.commit_changes(&repo, "second").await.unwrap(),
            "Changes have been committed with message: 'second'"
        );
        assert_eq!(
            adapter.diff_file(&repo, "notes.txt").await.unwrap(),
            "No changes in 'notes.txt'."
        );
    }

    #[tokio::test]
    async fn test_stash_round_trip() {
        if !git_available() {
            return;
        }
        let root = TempDir::new().unwrap();
        let (adapter, repo) = seeded(&root).await;

        assert_eq!(
            adapter.list_stashes(&repo).await.unwrap(),
            json!("No stashes found.")
        );
        assert_eq!(
            adapter.stash_changes(&repo, false).await.unwrap(),
            "No changes to stash."
        );

        fs::write(root.path().join("repo/notes.txt"), "dirty\n").unwrap();
        let stashed = adapter.stash_changes(&repo, false).await.unwrap();
        assert!(stashed.starts_with("Changes stashed successfully"));

        let stashes = adapter.list_stashes(&repo).await.unwrap();
        assert_eq!(stashes[0]["id"], "stash@{0}");

        adapter.apply_stash(&repo, "stash@{0}").await.unwrap();
        assert_eq!(
            fs::read_to_string(root.path().join("repo/notes.txt")).unwrap(),
            "dirty\n"
        );
    }

    #[tokio::test]
    async fn test_config_and_tags() {
        if !git_available() {
            return;
        }
        let root = TempDir::new().unwrap();
        let (adapter, repo) = seeded(&root).await;

        let missing = adapter.get_config(&repo, "custom.key").await.unwrap_err();
        assert!(matches!(missing, HandlerError::NotFound(_)));
        adapter.set_config(&repo, "custom.key", "v1").await.unwrap();
        assert_eq!(
            adapter.get_config(&repo, "custom.key").await.unwrap(),
            "custom.key = v1"
        );

        adapter.create_tag(&repo, "v0.1", None, "HEAD").await.unwrap();
        adapter
            .create_tag(&repo, "v0.2", Some("release".into()), "HEAD")
            .await
            .unwrap();
        assert_eq!(adapter.list_tags(&repo).await.unwrap(), json!(["v0.1", "v0.2"]));

        assert_eq!(
            adapter.delete_tag(&repo, "v0.1").await.unwrap(),
            "Tag 'v0.1' deleted."
        );
        assert_eq!(adapter.list_tags(&repo).await.unwrap(), json!(["v0.2"]));
    }

    #[tokio::test]
    async fn test_revert_and_reset() {
        if !git_available() {
            return;
        }
        let root = TempDir::new().unwrap();
        let (adapter, repo) = seeded(&root).await;
        let first = adapter.list_commits(&repo, None, 1).await.unwrap()[0]["hash"]
            .as_str()
            .unwrap()
            .to_string();

        adapter.create_new_file(&repo, "extra.txt", "x").await.unwrap();
        let second = adapter.list_commits(&repo, None, 1).await.unwrap()[0]["hash"]
            .as_str()
            .unwrap()
            .to_string();

        adapter.revert_commit(&repo, &second).await.unwrap();
        assert!(!root.path().join("repo/extra.txt").exists());

        assert_eq!(
            adapter.reset_to_commit(&repo, &first, true).await.unwrap(),
            format!("Repository reset to commit {first} (hard).")
        );
        assert_eq!(
            adapter.list_commits(&repo, None, 10).await.unwrap().as_array().unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_option_like_values_are_refused() {
        let repo = fake_repo();
        let adapter = fake_adapter(FakeGit::default(), &repo);
        let path = repo.path().to_str().unwrap();

        let refused = |err: HandlerError| {
            assert!(matches!(err, HandlerError::Failed(_)), "{err:?}");
            assert!(err.to_string().contains("must not start with '-'"));
        };
        refused(adapter.reset_to_commit(path, "--hard", false).await.unwrap_err());
        refused(adapter.revert_commit(path, "--quit").await.unwrap_err());
        refused(adapter.apply_stash(path, "--index").await.unwrap_err());
        refused(adapter.get_config(path, "--global").await.unwrap_err());
        refused(adapter.set_config(path, "--file=x", "y").await.unwrap_err());
        refused(adapter.create_tag(path, "--force", None, "HEAD").await.unwrap_err());
        refused(adapter.create_tag(path, "v1", None, "--contains").await.unwrap_err());
        refused(adapter.delete_tag(path, "-l").await.unwrap_err());
    }

    #[tokio::test]
    async fn test_reset_keeps_mode_with_real_git() {
        if !git_available() {
            return;
        }
        let root = TempDir::new().unwrap();
        let (adapter, repo) = seeded(&root).await;
        fs::write(root.path().join("repo/notes.txt"), "edited\n").unwrap();

        assert!(adapter.reset_to_commit(&repo, "--hard", false).await.is_err());
        assert_eq!(
            fs::read_to_string(root.path().join("repo/notes.txt")).unwrap(),
            "edited\n"
        );
        assert_eq!(
            adapter.reset_to_commit(&repo, "HEAD", false).await.unwrap(),
            "Repository reset to commit HEAD (mixed)."
        );
    }

    #[tokio::test]
    async fn test_diff_rejects_paths_outside_repo() {
        let repo = fake_repo();
        let adapter = fake_adapter(FakeGit::default(), &repo);
        let err = adapter
            .diff_file(repo.path().to_str().unwrap(), "../secret")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("relative path inside the repository"));
    }
}
