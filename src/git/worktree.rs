use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::models::Worktree;
use crate::utils::{sanitize_path_component, suggest_worktree_name};

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("Branch '{branch}' is already checked out at: {path}")]
    AlreadyCheckedOut { branch: String, path: String },

    #[error("Branch '{0}' does not exist. Create the branch first or choose an existing branch.")]
    BranchNotFound(String),

    #[error("Worktree directory already exists and is not empty: {0:?}")]
    TargetExists(PathBuf),

    #[error("Path contains non-UTF8 characters: {0:?}")]
    NonUtf8Path(PathBuf),

    #[error("git worktree failed: {0}")]
    Git(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn path_to_str(path: &Path) -> Result<&str, WorktreeError> {
    path.to_str()
        .ok_or_else(|| WorktreeError::NonUtf8Path(path.to_path_buf()))
}

fn is_protected(branch: &str) -> bool {
    branch == "main" || branch == "master"
}

/// One record of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub head: Option<String>,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
}

impl WorktreeEntry {
    fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
            head: None,
            branch: None,
            bare: false,
            detached: false,
        }
    }

    pub fn display_branch(&self) -> String {
        match (&self.branch, &self.head) {
            (Some(branch), _) => branch.clone(),
            (None, Some(head)) if self.detached => {
                format!("detached@{}", &head[..head.len().min(7)])
            }
            _ => "(unknown)".to_string(),
        }
    }
}

pub fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry::new(path));
        } else if let Some(entry) = current.as_mut() {
            if let Some(head) = line.strip_prefix("HEAD ") {
                entry.head = Some(head.to_string());
            } else if let Some(branch) = line.strip_prefix("branch ") {
                let short = branch.strip_prefix("refs/heads/").unwrap_or(branch);
                entry.branch = Some(short.to_string());
            } else if line == "bare" {
                entry.bare = true;
            } else if line == "detached" {
                entry.detached = true;
            }
        }
    }

    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}

/// Creates and removes worktrees of one repository under
/// `<base>/<project dir name>/<worktree name>`.
#[derive(Clone)]
pub struct WorktreeManager {
    repo_path: PathBuf,
    base: PathBuf,
}

impl WorktreeManager {
    pub fn new(repo_path: PathBuf, base: PathBuf) -> Self {
        Self { repo_path, base }
    }

    fn project_dir_name(&self) -> String {
        let name = self
            .repo_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        let sanitized = sanitize_path_component(name);
        if sanitized.is_empty() {
            "unknown".to_string()
        } else {
            sanitized
        }
    }

    pub fn worktree_dir(&self) -> PathBuf {
        self.base.join(self.project_dir_name())
    }

    pub fn worktree_path(&self, name: &str) -> PathBuf {
        let sanitized = sanitize_path_component(name);
        let component = if sanitized.is_empty() {
            "unnamed".to_string()
        } else {
            sanitized
        };
        self.worktree_dir().join(component)
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, WorktreeError> {
        Ok(Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await?)
    }

    pub async fn entries(&self) -> Result<Vec<WorktreeEntry>, WorktreeError> {
        let output = self.run(&["worktree", "list", "--porcelain"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorktreeError::Git(stderr.trim().to_string()));
        }
        Ok(parse_worktree_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Worktrees git knows about, excluding the bare entry.
    pub async fn list(&self) -> Result<Vec<Worktree>, WorktreeError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| !e.bare)
            .map(|e| Worktree::new(e.display_branch(), e.path))
            .collect())
    }

    /// Add a worktree for `branch`. The directory name defaults to one derived
    /// from the branch. With `new_branch` the branch is created from HEAD.
    pub async fn create(
        &self,
        branch: &str,
        name: Option<&str>,
        new_branch: bool,
    ) -> Result<Worktree, WorktreeError> {
        let dir_name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => suggest_worktree_name(branch),
        };
        let wt_path = self.worktree_path(&dir_name);

        if wt_path.exists() && std::fs::read_dir(&wt_path)?.next().is_some() {
            return Err(WorktreeError::TargetExists(wt_path));
        }

        if !is_protected(branch) {
            if let Some(existing) = self
                .entries()
                .await?
                .into_iter()
                .find(|e| e.branch.as_deref() == Some(branch))
            {
                return Err(WorktreeError::AlreadyCheckedOut {
                    branch: branch.to_string(),
                    path: existing.path.display().to_string(),
                });
            }
        }

        tokio::fs::create_dir_all(self.worktree_dir()).await?;
        let wt_path_str = path_to_str(&wt_path)?;

        let mut args = vec!["worktree", "add"];
        if is_protected(branch) {
            args.push("--force");
        }
        if new_branch {
            args.extend(["-b", branch, wt_path_str]);
        } else {
            args.extend([wt_path_str, branch]);
        }

        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!("git worktree add failed for {}: {}", branch, stderr);
            return Err(classify_add_error(branch, &stderr));
        }

        tracing::info!("Created worktree {:?} for branch {}", wt_path, branch);
        Ok(Worktree::new(branch, wt_path))
    }

    pub async fn remove(&self, worktree_path: &Path) -> Result<(), WorktreeError> {
        let wt_path_str = path_to_str(worktree_path)?;
        let output = self
            .run(&["worktree", "remove", wt_path_str, "--force"])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorktreeError::Git(stderr.trim().to_string()));
        }
        Ok(())
    }
}

fn classify_add_error(branch: &str, stderr: &str) -> WorktreeError {
    if stderr.contains("already checked out") || stderr.contains("already used by worktree") {
        WorktreeError::AlreadyCheckedOut {
            branch: branch.to_string(),
            path: "another worktree".to_string(),
        }
    } else if stderr.contains("not a valid branch")
        || stderr.contains("invalid reference")
        || stderr.contains("not a commit")
    {
        WorktreeError::BranchNotFound(branch.to_string())
    } else {
        WorktreeError::Git(stderr.to_string())
    }
}


#[cfg(test)]
mod worktree_tests {
    use super::*;
    use crate::git::test_support::{init_repo, run};
    use crate::utils::worktree_id_for_path;

    fn setup() -> (tempfile::TempDir, PathBuf, WorktreeManager) {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        init_repo(&repo);
        let base = tmp.path().join("base");
        let mgr = WorktreeManager::new(repo.clone(), base);
        (tmp, repo, mgr)
    }

    #[tokio::test]
    async fn create_existing_branch_worktree() {
        let (_tmp, repo, mgr) = setup();
        run(&repo, &["branch", "feature/login"]);

        let wt = mgr.create("feature/login", None, false).await.unwrap();
        assert!(wt.path.ends_with("repo/feature-login"));
        assert!(wt.path.join("README.md").exists());
        assert_eq!(wt.branch, "feature/login");
    }

    #[tokio::test]
    async fn create_new_branch_worktree() {
        let (_tmp, _repo, mgr) = setup();
        let wt = mgr.create("brand-new", Some("scratch"), true).await.unwrap();
        assert!(wt.path.ends_with("repo/scratch"));
        let listed = mgr.list().await.unwrap();
        assert!(listed.iter().any(|w| w.branch == "brand-new"));
    }

    #[tokio::test]
    async fn create_missing_branch_fails() {
        let (_tmp, _repo, mgr) = setup();
        let err = mgr.create("nope", None, false).await.unwrap_err();
        assert!(
            matches!(err, WorktreeError::BranchNotFound(_)),
            "create: missing branch should map to BranchNotFound, got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn create_refuses_branch_checked_out_elsewhere() {
        let (_tmp, repo, mgr) = setup();
        run(&repo, &["branch", "busy"]);
        mgr.create("busy", Some("first"), false).await.unwrap();

        let err = mgr.create("busy", Some("second"), false).await.unwrap_err();
        assert!(matches!(err, WorktreeError::AlreadyCheckedOut { .. }));
    }

    #[tokio::test]
    async fn create_main_uses_force() {
        let (_tmp, _repo, mgr) = setup();
        let wt = mgr.create("main", Some("main-copy"), false).await.unwrap();
        assert!(wt.path.join("README.md").exists());
    }

    #[tokio::test]
    async fn create_refuses_non_empty_target() {
        let (_tmp, repo, mgr) = setup();
        run(&repo, &["branch", "b"]);
        let target = mgr.worktree_path("b");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("junk"), "x").unwrap();

        let err = mgr.create("b", None, false).await.unwrap_err();
        assert!(matches!(err, WorktreeError::TargetExists(_)));
    }

    #[tokio::test]
    async fn listed_id_matches_created_id() {
        let (_tmp, repo, mgr) = setup();
        run(&repo, &["branch", "topic"]);
        let created = mgr.create("topic", None, false).await.unwrap();
        let listed = mgr.list().await.unwrap();
        let found = listed.iter().find(|w| w.branch == "topic").unwrap();
        assert_eq!(
            worktree_id_for_path(&found.path),
            created.id,
            "list: ids should agree with create for the same directory"
        );
    }

    #[tokio::test]
    async fn remove_deletes_worktree() {
        let (_tmp, repo, mgr) = setup();
        run(&repo, &["branch", "gone"]);
        let wt = mgr.create("gone", None, false).await.unwrap();
        std::fs::write(wt.path.join("dirty.txt"), "x").unwrap();

        mgr.remove(&wt.path).await.unwrap();
        assert!(!wt.path.exists());
        let listed = mgr.list().await.unwrap();
        assert!(listed.iter().all(|w| w.branch != "gone"));
    }

    #[tokio::test]
    async fn remove_unknown_path_fails() {
        let (tmp, _repo, mgr) = setup();
        let result = mgr.remove(&tmp.path().join("not-a-worktree")).await;
        assert!(matches!(result, Err(WorktreeError::Git(_))));
    }
}
