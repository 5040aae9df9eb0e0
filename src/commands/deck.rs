use anyhow::{Context as _, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::commands::common::{self, Context};
use crate::deck::DeckApp;
use crate::terminal::TerminalManager;

#[derive(ClapArgs, Default)]
pub struct Args {
    /// Project to select on start (id or name)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: Args) -> Result<()> {
    let ctx = Context::load(args.config).await?;
    let _guard = common::init_file_logging(&ctx.config.log_dir())
        .context("Failed to set up logging")?;
    tracing::info!("Starting deck with {} project(s)", ctx.state.projects.len());

    let Context {
        config,
        store,
        mut state,
    } = ctx;

    if let Some(key) = args.project.as_deref() {
        let id = common::resolve_project(&state, Some(key))?.id.clone();
        if state.selected_project_id.as_deref() != Some(id.as_str()) {
            state.select_project(Some(&id));
        }
    }

    let terminals = TerminalManager::new(&config.settings);
    let mut app = DeckApp::new(config, store, state, terminals);
    let result = app.run().await;
    if let Err(e) = &result {
        tracing::error!("Deck exited with error: {:#}", e);
    }
    result
}
