use anyhow::{bail, Context as _, Result};
use clap::{Args as ClapArgs, Subcommand};
use std::path::PathBuf;

use crate::commands::common::{self, pad, Context};
use crate::git::{self, WorktreeManager};
use crate::models::{Project, ProjectKind};

#[derive(ClapArgs)]
pub struct Args {
    #[command(subcommand)]
    pub command: WorktreeCommand,

    /// Project id or name (default: project of the current directory)
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum WorktreeCommand {
    /// Check out a branch into a new worktree
    Create {
        branch: String,

        /// Directory name (default: derived from the branch)
        #[arg(short, long)]
        name: Option<String>,

        /// Create the branch from HEAD
        #[arg(short = 'b', long)]
        new_branch: bool,
    },

    /// List the project's worktrees
    List,

    /// Remove a worktree directory and forget it
    Remove {
        /// Worktree id, directory name or branch
        worktree: String,
    },

    /// Branches that can be checked out into a new worktree
    Branches,

    /// Reload worktrees from git (all projects when none is given)
    Sync,
}

fn manager_for(project: &Project, ctx: &Context) -> Result<WorktreeManager> {
    if project.kind == ProjectKind::Workspace {
        bail!("Project {} is a workspace; worktrees need a repository", project.name);
    }
    Ok(WorktreeManager::new(
        project.path.clone(),
        ctx.config.worktree_base.clone(),
    ))
}

pub async fn execute(args: Args) -> Result<()> {
    let mut ctx = Context::load(args.config).await?;
    let key = args.project.as_deref();

    match args.command {
        WorktreeCommand::Create {
            branch,
            name,
            new_branch,
        } => {
            let project = project_of(&ctx, key)?;
            let manager = manager_for(&project, &ctx)?;
            let worktree = manager.create(&branch, name.as_deref(), new_branch).await?;
            println!("Created worktree for {}", worktree.branch);
            println!("  Path: {}", worktree.path.display());
            ctx.state.add_worktree(&project.id, worktree)?;
            ctx.save().await?;
        }
        WorktreeCommand::List => {
            let project = project_of(&ctx, key)?;
            if project.worktrees.is_empty() {
                println!("No worktrees in {}", project.name);
                return Ok(());
            }
            let width = project
                .worktrees
                .iter()
                .map(|w| w.display_name().len())
                .max()
                .unwrap_or(0);
            for (i, worktree) in project.worktrees.iter().enumerate() {
                println!(
                    "{:>2}  {}  {}  {}",
                    i + 1,
                    pad(&worktree.display_name(), width),
                    worktree.branch,
                    worktree.path.display()
                );
            }
        }
        WorktreeCommand::Remove { worktree } => {
            let project = project_of(&ctx, key)?;
            let target = project
                .resolve_worktree(&worktree)
                .with_context(|| format!("Worktree '{}' not found in {}", worktree, project.name))?
                .clone();
            if target.path == project.path {
                bail!("Refusing to remove the main checkout of {}", project.name);
            }
            manager_for(&project, &ctx)?.remove(&target.path).await?;
            ctx.state.remove_worktree(&project.id, &target.id)?;
            ctx.save().await?;
            println!("Removed worktree {}", target.path.display());
        }
        WorktreeCommand::Branches => {
            let project = project_of(&ctx, key)?;
            for branch in git::available_branches(&project.path).await? {
                println!("{}", branch);
            }
        }
        WorktreeCommand::Sync => return sync(&mut ctx, key).await,
    }
    Ok(())
}

fn project_of(ctx: &Context, key: Option<&str>) -> Result<Project> {
    Ok(common::resolve_project(&ctx.state, key)?.clone())
}

async fn sync(ctx: &mut Context, key: Option<&str>) -> Result<()> {
    let targets: Vec<Project> = match key {
        Some(_) => vec![common::resolve_project(&ctx.state, key)?.clone()],
        None => ctx
            .state
            .projects
            .iter()
            .filter(|p| p.kind == ProjectKind::Repository)
            .cloned()
            .collect(),
    };

    let base = ctx.config.worktree_base.clone();
    let listings = futures::future::join_all(targets.iter().map(|project| {
        let manager = WorktreeManager::new(project.path.clone(), base.clone());
        async move { manager.list().await }
    }))
    .await;

    for (project, listing) in targets.iter().zip(listings) {
        match listing {
            Ok(worktrees) => {
                let (added, removed) = ctx.state.sync_worktrees(&project.id, worktrees)?;
                println!("{}: +{} -{}", project.name, added, removed);
            }
            Err(e) => {
                tracing::warn!("Failed to list worktrees of {}: {}", project.name, e);
                println!("{}: {}", project.name, e);
            }
        }
    }
    ctx.save().await
}
