mod file_tree;
mod open;
mod repo;
mod status;
mod workspace;
mod worktree;

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

pub use file_tree::{build_file_tree, flatten_tree, TreeNode};
pub use open::{open_in, OpenApp};
pub use repo::{available_branches, commit, default_branch, is_git_repository, stage, unstage};
pub use status::status;
pub use workspace::parse_workspace_file;
pub use worktree::WorktreeManager;

pub(crate) async fn git(dir: &Path, args: &[&str]) -> Result<Output> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .with_context(|| format!("Failed to run git {}", args.join(" ")))
}

/// Run git and fail with its stderr on a non-zero exit.
pub(crate) async fn git_checked(dir: &Path, args: &[&str]) -> Result<String> {
    let output = git(dir, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    pub fn run(dir: &Path, args: &[&str]) {
        let output = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// A repository on `main` with one commit and a local identity.
    pub fn init_repo(dir: &Path) {
        run(dir, &["init", "-q"]);
        run(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run(dir, &["config", "user.email", "test@example.com"]);
        run(dir, &["config", "user.name", "Test"]);
        run(dir, &["config", "commit.gpgsign", "false"]);
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        run(dir, &["add", "README.md"]);
        run(dir, &["commit", "-q", "-m", "init"]);
    }
}
