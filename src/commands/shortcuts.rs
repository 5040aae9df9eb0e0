use anyhow::Result;
use clap::{Args as ClapArgs, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::keymap::{KeyChord, ShortcutSet};

#[derive(ClapArgs)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ShortcutsCommand>,

    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ShortcutsCommand {
    /// Show every shortcut and its key chord
    List,

    /// Bind a shortcut to a new chord, e.g. `wtdeck shortcuts set quit Ctrl+X`
    Set { id: String, chord: String },

    /// Restore the default bindings
    Reset,

    /// Turn shortcut handling on
    Enable,

    /// Turn shortcut handling off (keys go straight to the terminal)
    Disable,
}

pub async fn execute(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.clone())?;

    match args.command.unwrap_or(ShortcutsCommand::List) {
        ShortcutsCommand::List => {
            print!("{}", format_shortcuts(&config.shortcuts));
            return Ok(());
        }
        ShortcutsCommand::Set { id, chord } => {
            let chord: KeyChord = chord.parse()?;
            config.shortcuts.update(&id, chord)?;
            println!("{} -> {}", id, chord);
        }
        ShortcutsCommand::Reset => {
            config.shortcuts.reset();
            println!("Shortcuts reset to defaults");
        }
        ShortcutsCommand::Enable => {
            config.shortcuts.set_enabled(true);
            println!("Shortcuts enabled");
        }
        ShortcutsCommand::Disable => {
            config.shortcuts.set_enabled(false);
            println!("Shortcuts disabled");
        }
    }

    let path = config.save(args.config)?;
    tracing::info!("Saved shortcuts to {:?}", path);
    Ok(())
}

pub fn format_shortcuts(set: &ShortcutSet) -> String {
    let mut out = String::new();
    if !set.enabled {
        out.push_str("(shortcuts disabled)\n");
    }
    let id_width = set.shortcuts.iter().map(|s| s.id.len()).max().unwrap_or(0);
    let chord_width = set
        .shortcuts
        .iter()
        .map(|s| s.chord.to_string().len())
        .max()
        .unwrap_or(0);
    for shortcut in &set.shortcuts {
        out.push_str(&format!(
            "{:<iw$}  {:<cw$}  {}\n",
            shortcut.id,
            shortcut.chord.to_string(),
            shortcut.description,
            iw = id_width,
            cw = chord_width
        ));
    }
    out
}
