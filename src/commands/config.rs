use anyhow::{bail, Context as _, Result};
use clap::{Args as ClapArgs, Subcommand};
use std::path::PathBuf;

use crate::commands::project::TerminalsCommand;
use crate::config::Config;
use crate::models::DefaultTerminalUpdate;

#[derive(ClapArgs)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,

    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as YAML
    Show,

    /// Print the config file location
    Path,

    /// Write settings, templates and shortcuts as JSON (stdout when no file)
    Export { file: Option<PathBuf> },

    /// Load settings, templates and shortcuts from an exported JSON file
    Import { file: PathBuf },

    /// Restore every setting to its default
    Reset,

    /// Manage the global default terminal templates
    Terminals {
        #[command(subcommand)]
        command: Option<TerminalsCommand>,
    },
}

pub async fn execute(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.clone())?;

    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => {
            print!("{}", serde_yaml::to_string(&config)?);
            return Ok(());
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                args.config
                    .unwrap_or_else(Config::default_config_path)
                    .display()
            );
            println!("data: {}", config.data_dir.display());
            println!("worktrees: {}", config.worktree_base.display());
            return Ok(());
        }
        ConfigCommand::Export { file } => {
            let json = config.export_json()?;
            match file {
                Some(file) => {
                    tokio::fs::write(&file, json)
                        .await
                        .with_context(|| format!("Failed to write {:?}", file))?;
                    println!("Exported settings to {}", file.display());
                }
                None => println!("{}", json),
            }
            return Ok(());
        }
        ConfigCommand::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {:?}", file))?;
            config.import_json(&json)?;
            println!("Imported settings from {}", file.display());
        }
        ConfigCommand::Reset => {
            config.reset();
            println!("Configuration reset to defaults");
        }
        ConfigCommand::Terminals { command } => {
            if !default_terminals(&mut config, command.unwrap_or(TerminalsCommand::List))? {
                return Ok(());
            }
        }
    }

    let path = config.save(args.config)?;
    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

/// Returns whether the config changed.
fn default_terminals(config: &mut Config, command: TerminalsCommand) -> Result<bool> {
    match command {
        TerminalsCommand::List => {
            for t in &config.default_terminals {
                let state = if t.enabled { "on " } else { "off" };
                let command = if t.command.trim().is_empty() {
                    "<shell>"
                } else {
                    t.command.as_str()
                };
                println!("{}  {}  {}  {}", state, t.id, t.name, command);
            }
            return Ok(false);
        }
        TerminalsCommand::Add => {
            let template = config.add_default_terminal();
            println!("Added template {} ({})", template.name, template.id);
        }
        TerminalsCommand::Remove { id } => {
            if !config.remove_default_terminal(&id) {
                bail!("Terminal template not found: {}", id);
            }
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
            if !config.update_default_terminal(&id, update) {
                bail!("Terminal template not found: {}", id);
            }
            println!("Updated template {}", id);
        }
        TerminalsCommand::Reset => {
            config.reset_default_terminals();
            println!("Templates reset to the built-in defaults");
        }
    }
    Ok(true)
}
