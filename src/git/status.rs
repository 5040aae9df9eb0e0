use anyhow::Result;
use std::path::Path;

use super::git;
use crate::models::{FileStatus, GitFile, GitStatus};

/// Strip git's C-style quoting and keep the destination of a rename.
fn porcelain_path(raw: &str) -> String {
    let target = raw.rsplit_once(" -> ").map(|(_, to)| to).unwrap_or(raw).trim();
    target
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(target)
        .to_string()
}

/// Split `git status --porcelain=v1` output into (staged, unstaged, untracked).
pub fn parse_porcelain_status(output: &str) -> (Vec<GitFile>, Vec<GitFile>, Vec<GitFile>) {
    let mut staged = Vec::new();
    let mut unstaged = Vec::new();
    let mut untracked = Vec::new();

    for line in output.lines() {
        let mut chars = line.chars();
        let (Some(index), Some(worktree)) = (chars.next(), chars.next()) else {
            continue;
        };
        let Some(rest) = line.get(3..) else {
            continue;
        };
        let path = porcelain_path(rest);
        if path.is_empty() {
            continue;
        }

        if index == '?' && worktree == '?' {
            untracked.push(GitFile::new(path, FileStatus::Untracked));
            continue;
        }
        // ignored entries only show up with --ignored
        if index == '!' {
            continue;
        }
        if index != ' ' && index != '?' {
            staged.push(GitFile::new(path.clone(), FileStatus::from_code(index)));
        }
        if worktree != ' ' && worktree != '?' {
            unstaged.push(GitFile::new(path, FileStatus::from_code(worktree)));
        }
    }

    (staged, unstaged, untracked)
}

/// Parse `rev-list --left-right --count` output (`<ahead>\t<behind>`).
pub fn parse_ahead_behind(output: &str) -> (u32, u32) {
    let mut parts = output.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => (a.parse().unwrap_or(0), b.parse().unwrap_or(0)),
        _ => (0, 0),
    }
}

async fn ahead_behind(worktree_path: &Path, branch: &str) -> (u32, u32) {
    if branch.is_empty() || branch == "unknown" {
        return (0, 0);
    }
    let range = format!("{}...origin/{}", branch, branch);
    match git(worktree_path, &["rev-list", "--left-right", "--count", &range]).await {
        Ok(output) if output.status.success() => {
            parse_ahead_behind(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(_) => (0, 0),
        Err(e) => {
            tracing::debug!("ahead/behind unavailable for {}: {}", branch, e);
            (0, 0)
        }
    }
}

pub async fn status(worktree_path: &Path) -> Result<GitStatus> {
    let branch_output = git(worktree_path, &["branch", "--show-current"]).await?;
    let branch = if branch_output.status.success() {
        let name = String::from_utf8_lossy(&branch_output.stdout).trim().to_string();
        if name.is_empty() {
            "unknown".to_string()
        } else {
            name
        }
    } else {
        "unknown".to_string()
    };

    let status_output = git(worktree_path, &["status", "--porcelain=v1"]).await?;
    if !status_output.status.success() {
        let stderr = String::from_utf8_lossy(&status_output.stderr);
        anyhow::bail!("git status failed in {:?}: {}", worktree_path, stderr.trim());
    }
    let (staged, unstaged, untracked) =
        parse_porcelain_status(&String::from_utf8_lossy(&status_output.stdout));

    let (ahead, behind) = ahead_behind(worktree_path, &branch).await;

    Ok(GitStatus {
        branch,
        ahead,
        behind,
        staged,
        unstaged,
        untracked,
    })
}


#[cfg(test)]
mod status_tests {
    use super::*;
    use crate::git::test_support::{init_repo, run};

    #[tokio::test]
    async fn status_of_fresh_repo_is_clean() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        let st = status(tmp.path()).await.unwrap();
        assert_eq!(st.branch, "main");
        assert_eq!((st.ahead, st.behind), (0, 0));
        assert!(st.is_clean());
    }

    #[tokio::test]
    async fn status_reports_each_category() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("README.md"), "changed\n").unwrap();
        std::fs::write(tmp.path().join("staged.txt"), "s").unwrap();
        run(tmp.path(), &["add", "staged.txt"]);
        std::fs::write(tmp.path().join("loose.txt"), "l").unwrap();

        let st = status(tmp.path()).await.unwrap();
        assert_eq!(st.staged, vec![GitFile::new("staged.txt", FileStatus::Added)]);
        assert_eq!(st.unstaged, vec![GitFile::new("README.md", FileStatus::Modified)]);
        assert_eq!(st.untracked, vec![GitFile::new("loose.txt", FileStatus::Untracked)]);
    }

    #[tokio::test]
    async fn status_counts_commits_ahead_of_origin() {
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        std::fs::create_dir(&origin).unwrap();
        init_repo(&origin);

        let clone = tmp.path().join("clone");
        run(tmp.path(), &["clone", "-q", origin.to_str().unwrap(), clone.to_str().unwrap()]);
        run(&clone, &["config", "user.email", "test@example.com"]);
        run(&clone, &["config", "user.name", "Test"]);
        run(&clone, &["commit", "-q", "--allow-empty", "-m", "local"]);

        let st = status(&clone).await.unwrap();
        assert_eq!((st.ahead, st.behind), (1, 0));
    }

    #[tokio::test]
    async fn status_fails_outside_repo() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(status(tmp.path()).await.is_err());
    }
}
