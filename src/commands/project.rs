use anyhow::{Context as _, Result};
use clap::{Args as ClapArgs, Subcommand};
use std::path::PathBuf;

use crate::commands::common::{self, pad, Context};
use crate::git::{self, WorktreeManager};
use crate::models::{DefaultTerminalUpdate, Project, ProjectKind};
use crate::store::ProjectError;

#[derive(ClapArgs)]
pub struct Args {
    #[command(subcommand)]
    pub command: ProjectCommand,

    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Add a git repository or a .code-workspace file
    Add {
        /// Repository directory or workspace file (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Display name (default: directory or file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List added projects
    List,

    /// Remove a project (files on disk are left alone)
    Remove {
        /// Project id or name
        project: String,
    },

    /// Manage the terminals opened automatically for a project's worktrees
    Terminals {
        /// Project id or name (default: project of the current directory)
        #[arg(short, long)]
        project: Option<String>,

        #[command(subcommand)]
        command: Option<TerminalsCommand>,
    },
}

#[derive(Subcommand)]
pub enum TerminalsCommand {
    /// Show the templates in effect
    List,
    /// Append a new empty template
    Add,
    /// Remove a template
    Remove { id: String },
    /// Change a template
    Set {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Command run when the terminal opens ("" for a plain shell)
        #[arg(long)]
        command: Option<String>,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Go back to the global defaults
    Reset,
}

pub async fn execute(args: Args) -> Result<()> {
    let mut ctx = Context::load(args.config).await?;

    match args.command {
        ProjectCommand::Add { path, name } => add(&mut ctx, path, name).await,
        ProjectCommand::List => {
            list(&ctx);
            Ok(())
        }
        ProjectCommand::Remove { project } => {
            let removed = ctx.state.remove(&project)?;
            ctx.save().await?;
            println!("Removed project {} ({})", removed.name, removed.path.display());
            Ok(())
        }
        ProjectCommand::Terminals { project, command } => {
            terminals(&mut ctx, project, command.unwrap_or(TerminalsCommand::List)).await
        }
    }
}

fn detect_kind(path: &std::path::Path) -> ProjectKind {
    if path.is_file() {
        ProjectKind::Workspace
    } else {
        ProjectKind::Repository
    }
}

async fn add(ctx: &mut Context, path: PathBuf, name: Option<String>) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve project path: {}", path.display()))?;
    let kind = detect_kind(&path);

    let name = name.unwrap_or_else(|| {
        path.file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string())
    });
    let id = uuid::Uuid::new_v4().to_string();
    let mut project = Project::new(id, name, path.clone(), kind);

    match kind {
        ProjectKind::Repository => {
            if !git::is_git_repository(&path).await {
                return Err(ProjectError::NotGitRepository(path.display().to_string()).into());
            }
            project.default_branch = Some(git::default_branch(&path).await);
            let manager = WorktreeManager::new(path.clone(), ctx.config.worktree_base.clone());
            match manager.list().await {
                Ok(worktrees) => project.worktrees = worktrees,
                Err(e) => tracing::warn!("Failed to list worktrees of {:?}: {}", path, e),
            }
        }
        ProjectKind::Workspace => {
            project.workspace_repos = git::parse_workspace_file(&path).await?;
        }
    }

    let added = ctx.state.add(project)?;
    println!("Added {} project: {}", added.kind, added.name);
    println!("  Path: {}", added.path.display());
    if !added.worktrees.is_empty() {
        println!("  Worktrees: {}", added.worktrees.len());
    }
    if !added.workspace_repos.is_empty() {
        println!("  Folders: {}", added.workspace_repos.len());
    }
    ctx.save().await
}

fn list(ctx: &Context) {
    if ctx.state.projects.is_empty() {
        println!("No projects added");
        return;
    }

    let width = ctx
        .state
        .projects
        .iter()
        .map(|p| unicode_width::UnicodeWidthStr::width(p.name.as_str()))
        .max()
        .unwrap_or(0);

    for project in &ctx.state.projects {
        let marker = if ctx.state.selected_project_id.as_deref() == Some(project.id.as_str()) {
            "*"
        } else {
            " "
        };
        let detail = match project.kind {
            ProjectKind::Repository => format!("{} worktree(s)", project.worktrees.len()),
            ProjectKind::Workspace => format!("{} folder(s)", project.workspace_repos.len()),
        };
        println!(
            "{} {}  {}  {}",
            marker,
            pad(&project.name, width),
            project.path.display(),
            detail
        );
    }
}

async fn terminals(
    ctx: &mut Context,
    project: Option<String>,
    command: TerminalsCommand,
) -> Result<()> {
    let project_id = common::resolve_project(&ctx.state, project.as_deref())?
        .id
        .clone();
    let fallback = ctx.config.default_terminals.clone();

    match command {
        TerminalsCommand::List => {
            let own = ctx
                .state
                .find(&project_id)
                .map(|p| p.default_terminals.is_some())
                .unwrap_or(false);
            if !own {
                println!("(using global defaults)");
            }
            for t in ctx.state.terminal_templates(&project_id, &fallback) {
                let state = if t.enabled { "on " } else { "off" };
                let command = if t.command.trim().is_empty() {
                    "<shell>"
                } else {
                    t.command.as_str()
                };
                println!("{}  {}  {}  {}", state, t.id, t.name, command);
            }
            return Ok(());
        }
        TerminalsCommand::Add => {
            let template = ctx.state.add_template(&project_id, &fallback)?;
            println!("Added template {} ({})", template.name, template.id);
        }
        TerminalsCommand::Remove { id } => {
            ctx.state.remove_template(&project_id, &id, &fallback)?;
            println!("Removed template {}", id);
        }
        TerminalsCommand::Set {
            id,
            name,
            command,
            enable,
            disable,
        } => {
            let enabled = match (enable, disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let update = DefaultTerminalUpdate {
                name,
                command,
                enabled,
            };
            ctx.state
                .update_template(&project_id, &id, update, &fallback)?;
            println!("Updated template {}", id);
        }
        TerminalsCommand::Reset => {
            ctx.state.reset_templates(&project_id)?;
            println!("Templates reset to the global defaults");
        }
    }
    ctx.save().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_kind_from_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_kind(dir.path()), ProjectKind::Repository);

        let file = dir.path().join("team.code-workspace");
        std::fs::write(&file, "{}").unwrap();
        assert_eq!(detect_kind(&file), ProjectKind::Workspace);
    }
}
