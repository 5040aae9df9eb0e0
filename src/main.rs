use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod deck;
mod git;
mod keymap;
mod models;
mod navigation;
mod store;
mod terminal;
mod utils;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Deck(Default::default()));
    if !matches!(command, Commands::Deck(_)) {
        commands::common::init_cli_logging();
    }

    match command {
        Commands::Deck(args) => commands::deck::execute(args).await,
        Commands::Project(args) => commands::project::execute(args).await,
        Commands::Worktree(args) => commands::worktree::execute(args).await,
        Commands::Status(args) => commands::git::status(args).await,
        Commands::Stage(args) => commands::git::stage(args).await,
        Commands::Unstage(args) => commands::git::unstage(args).await,
        Commands::Commit(args) => commands::git::commit(args).await,
        Commands::Open(args) => commands::open::execute(args).await,
        Commands::Shortcuts(args) => commands::shortcuts::execute(args).await,
        Commands::Config(args) => commands::config::execute(args).await,
    }
}
