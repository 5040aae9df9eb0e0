use anyhow::{bail, Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

use crate::config::{ensure_dir, Config};
use crate::models::{Project, Worktree};
use crate::store::{ProjectState, ProjectStore};

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// stderr logging for one-shot commands.
pub fn init_cli_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Daily rolling log file for the deck, which owns the terminal.
/// The guard must live until the deck exits.
pub fn init_file_logging(log_dir: &Path) -> Result<WorkerGuard> {
    ensure_dir(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, "wtdeck.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter("wtdeck=info"));

    let _ = tracing_subscriber::registry().with(layer).try_init();
    Ok(guard)
}

/// Loaded configuration plus the persisted project list.
pub struct Context {
    pub config: Config,
    pub store: ProjectStore,
    pub state: ProjectState,
}

impl Context {
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(config_path)?;
        let store = ProjectStore::new(config.projects_file());
        let state = store
            .load()
            .await
            .with_context(|| format!("Failed to load projects from {:?}", store.path()))?;
        Ok(Self {
            config,
            store,
            state,
        })
    }

    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.state).await
    }
}

fn current_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.canonicalize().unwrap_or(cwd))
}

/// Resolve a project by id or name, or by the current directory when no key
/// is given.
pub fn resolve_project<'a>(state: &'a ProjectState, key: Option<&str>) -> Result<&'a Project> {
    if let Some(key) = key {
        return state
            .find(key)
            .with_context(|| format!("Project not found: {}", key));
    }

    let cwd = current_dir()?;
    if let Some(project) = state.find_by_path(&cwd) {
        return Ok(project);
    }
    match state.projects.len() {
        0 => bail!("No projects added. Run 'wtdeck project add <path>' first."),
        1 => Ok(&state.projects[0]),
        _ => {
            eprintln!("Multiple projects added. Please specify one with --project:");
            for project in &state.projects {
                eprintln!("  {} - {}", project.name, project.path.display());
            }
            bail!("Multiple projects added, please specify a project")
        }
    }
}

/// Directory a git command should run in.
///
/// Resolution order:
/// 1. `--worktree` inside the given (or current) project
/// 2. `--project` alone means the project directory
/// 3. otherwise the current directory
pub fn resolve_target(
    state: &ProjectState,
    project: Option<&str>,
    worktree: Option<&str>,
) -> Result<PathBuf> {
    match (project, worktree) {
        (p, Some(wt)) => {
            let project = resolve_project(state, p)?;
            let worktree: &Worktree = project.resolve_worktree(wt).with_context(|| {
                format!("Worktree '{}' not found in project {}", wt, project.name)
            })?;
            Ok(worktree.path.clone())
        }
        (Some(p), None) => Ok(resolve_project(state, Some(p))?.path.clone()),
        (None, None) => current_dir(),
    }
}

/// Left-align `text` to `width` terminal columns.
pub fn pad(text: &str, width: usize) -> String {
    let shown = UnicodeWidthStr::width(text);
    format!("{}{}", text, " ".repeat(width.saturating_sub(shown)))
}
