use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::commands::common::{self, Context};
use crate::git::{self, build_file_tree, flatten_tree, TreeNode};
use crate::models::{GitFile, GitStatus};

/// Which worktree a git command runs in.
#[derive(ClapArgs)]
pub struct TargetArgs {
    /// Project id or name
    #[arg(short, long)]
    pub project: Option<String>,

    /// Worktree id, directory name or branch (default: current directory)
    #[arg(short, long)]
    pub worktree: Option<String>,

    /// Custom config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl TargetArgs {
    pub async fn resolve(self) -> Result<PathBuf> {
        if self.project.is_none() && self.worktree.is_none() {
            return common::resolve_target(&Default::default(), None, None);
        }
        let ctx = Context::load(self.config).await?;
        common::resolve_target(
            &ctx.state,
            self.project.as_deref(),
            self.worktree.as_deref(),
        )
    }
}

#[derive(ClapArgs)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print files as a flat list instead of a tree
    #[arg(long)]
    pub flat: bool,
}

#[derive(ClapArgs)]
pub struct StageArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Files to stage or unstage (default: everything)
    pub files: Vec<String>,
}

#[derive(ClapArgs)]
pub struct CommitArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Commit message
    #[arg(short, long)]
    pub message: String,
}

pub async fn status(args: StatusArgs) -> Result<()> {
    let path = args.target.resolve().await?;
    let status = git::status(&path).await?;
    print!("{}", format_status(&status, args.flat));
    Ok(())
}

pub async fn stage(args: StageArgs) -> Result<()> {
    let path = args.target.resolve().await?;
    for file in files_or_all(&args.files) {
        git::stage(&path, file).await?;
    }
    println!("Staged {}", describe(&args.files));
    Ok(())
}

pub async fn unstage(args: StageArgs) -> Result<()> {
    let path = args.target.resolve().await?;
    for file in files_or_all(&args.files) {
        git::unstage(&path, file).await?;
    }
    println!("Unstaged {}", describe(&args.files));
    Ok(())
}

pub async fn commit(args: CommitArgs) -> Result<()> {
    if args.message.trim().is_empty() {
        bail!("Commit message cannot be empty");
    }
    let path = args.target.resolve().await?;
    git::commit(&path, &args.message).await?;
    println!("Committed");
    Ok(())
}

fn files_or_all(files: &[String]) -> Vec<&str> {
    if files.is_empty() {
        vec!["."]
    } else {
        files.iter().map(String::as_str).collect()
    }
}

fn describe(files: &[String]) -> String {
    match files.len() {
        0 => "all changes".to_string(),
        1 => files[0].clone(),
        n => format!("{} files", n),
    }
}

fn format_section(title: &str, files: &[GitFile], flat: bool, out: &mut String) {
    if files.is_empty() {
        return;
    }
    out.push_str(&format!("{} ({}):\n", title, files.len()));
    if flat {
        for file in files {
            out.push_str(&format!("  {} {}\n", file.status.symbol(), file.path));
        }
        return;
    }
    let tree = build_file_tree(files);
    for (depth, node) in flatten_tree(&tree) {
        let indent = "  ".repeat(depth + 1);
        match node {
            TreeNode::Folder {
                name, file_count, ..
            } => out.push_str(&format!("{}{}/ ({})\n", indent, name, file_count)),
            TreeNode::File { name, file, .. } => {
                out.push_str(&format!("{}{} {}\n", indent, file.status.symbol(), name))
            }
        }
    }
}

pub fn format_status(status: &GitStatus, flat: bool) -> String {
    let mut out = format!("On branch {}", status.branch);
    if status.ahead > 0 || status.behind > 0 {
        out.push_str(&format!(" (ahead {}, behind {})", status.ahead, status.behind));
    }
    out.push('\n');

    if status.is_clean() {
        out.push_str("Working tree clean\n");
        return out;
    }
    format_section("Staged", &status.staged, flat, &mut out);
    format_section("Changes", &status.unstaged, flat, &mut out);
    format_section("Untracked", &status.untracked, flat, &mut out);
    out
}
