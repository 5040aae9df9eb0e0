use anyhow::Result;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use super::worktree::parse_worktree_list;
use super::{git, git_checked};

fn is_protected(branch: &str) -> bool {
    branch == "main" || branch == "master"
}

pub async fn is_git_repository(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    match git(path, &["rev-parse", "--is-inside-work-tree"]).await {
        Ok(output) => output.status.success(),
        Err(e) => {
            tracing::warn!("Failed to probe git repository {:?}: {}", path, e);
            false
        }
    }
}

/// `origin/HEAD` target, else the current branch, else `main`.
pub async fn default_branch(path: &Path) -> String {
    if let Ok(output) = git(path, &["symbolic-ref", "refs/remotes/origin/HEAD"]).await {
        if output.status.success() {
            let raw = String::from_utf8_lossy(&output.stdout);
            let branch = raw.trim().trim_start_matches("refs/remotes/origin/");
            if !branch.is_empty() {
                return branch.to_string();
            }
        }
    }

    if let Ok(output) = git(path, &["branch", "--show-current"]).await {
        if output.status.success() {
            let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !branch.is_empty() {
                return branch;
            }
        }
    }

    "main".to_string()
}

fn branch_order(a: &String, b: &String) -> Ordering {
    match (a.as_str(), b.as_str()) {
        ("main", _) => Ordering::Less,
        (_, "main") => Ordering::Greater,
        ("master", _) => Ordering::Less,
        (_, "master") => Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// Combine local and remote branch listings into the branches a new worktree
/// may use. `checked_out` branches are dropped unless they are main/master.
pub fn merge_branches(local: &str, remote: &str, checked_out: &HashSet<String>) -> Vec<String> {
    let blocked = |b: &str| !is_protected(b) && checked_out.contains(b);
    let mut branches: Vec<String> = Vec::new();

    for line in local.lines() {
        let branch = line.trim();
        if branch.is_empty() || branch == "HEAD" || blocked(branch) {
            continue;
        }
        if !branches.iter().any(|b| b == branch) {
            branches.push(branch.to_string());
        }
    }

    for line in remote.lines() {
        let branch = line.trim();
        if branch.is_empty() || branch.contains("HEAD") {
            continue;
        }
        let clean = branch.strip_prefix("origin/").unwrap_or(branch);
        // a bare remote name is what `origin/HEAD` shortens to
        if clean == "origin" || blocked(clean) {
            continue;
        }
        if !branches.iter().any(|b| b == clean) {
            branches.push(clean.to_string());
        }
    }

    branches.sort_by(branch_order);
    branches
}

pub async fn available_branches(project_path: &Path) -> Result<Vec<String>> {
    let listing = git_checked(project_path, &["worktree", "list", "--porcelain"]).await?;
    let checked_out: HashSet<String> = parse_worktree_list(&listing)
        .into_iter()
        .filter_map(|e| e.branch)
        .collect();

    let local = git_checked(project_path, &["branch", "--format=%(refname:short)"]).await?;
    let remote = match git_checked(project_path, &["branch", "-r", "--format=%(refname:short)"]).await {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!("Failed to list remote branches: {}", e);
            String::new()
        }
    };

    Ok(merge_branches(&local, &remote, &checked_out))
}

pub async fn stage(worktree_path: &Path, file: &str) -> Result<()> {
    git_checked(worktree_path, &["add", "--", file]).await?;
    Ok(())
}

pub async fn unstage(worktree_path: &Path, file: &str) -> Result<()> {
    git_checked(worktree_path, &["reset", "-q", "HEAD", "--", file]).await?;
    Ok(())
}

pub async fn commit(worktree_path: &Path, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("Commit message cannot be empty");
    }
    git_checked(worktree_path, &["commit", "-q", "-m", message]).await?;
    Ok(())
}


#[cfg(test)]
mod repo_tests {
    use super::*;
    use crate::git::test_support::{init_repo, run};

    #[tokio::test]
    async fn is_git_repository_detects_repo() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!is_git_repository(tmp.path()).await);
        init_repo(tmp.path());
        assert!(is_git_repository(tmp.path()).await);
        assert!(!is_git_repository(&tmp.path().join("missing")).await);
    }

    #[tokio::test]
    async fn default_branch_falls_back_to_current() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        run(tmp.path(), &["checkout", "-q", "-b", "develop"]);
        assert_eq!(default_branch(tmp.path()).await, "develop");
    }

    #[tokio::test]
    async fn default_branch_outside_repo_is_main() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(default_branch(tmp.path()).await, "main");
    }

    #[tokio::test]
    async fn available_branches_hides_worktree_branches() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        init_repo(&repo);
        run(&repo, &["branch", "free"]);
        run(&repo, &["branch", "busy"]);
        let wt = tmp.path().join("busy-wt");
        run(&repo, &["worktree", "add", "-q", wt.to_str().unwrap(), "busy"]);

        let branches = available_branches(&repo).await.unwrap();
        assert_eq!(branches, vec!["main", "free"]);
    }

    #[tokio::test]
    async fn stage_unstage_commit_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("new.txt"), "x").unwrap();

        stage(tmp.path(), "new.txt").await.unwrap();
        let st = crate::git::status(tmp.path()).await.unwrap();
        assert_eq!(st.staged.len(), 1);

        unstage(tmp.path(), "new.txt").await.unwrap();
        let st = crate::git::status(tmp.path()).await.unwrap();
        assert!(st.staged.is_empty());
        assert_eq!(st.untracked.len(), 1);

        stage(tmp.path(), "new.txt").await.unwrap();
        commit(tmp.path(), "add new").await.unwrap();
        let st = crate::git::status(tmp.path()).await.unwrap();
        assert!(st.is_clean());
    }

    #[tokio::test]
    async fn commit_rejects_empty_message() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        assert!(commit(tmp.path(), "   ").await.is_err());
    }

    #[tokio::test]
    async fn commit_without_changes_fails() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        assert!(commit(tmp.path(), "nothing").await.is_err());
    }
}
