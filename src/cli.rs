use clap::{Parser, Subcommand};

use crate::commands::{config, deck, git, open, project, shortcuts, worktree};

#[derive(Parser)]
#[command(name = "wtdeck")]
#[command(about = "Worktree Deck - git worktrees and their terminals, one keypress apart")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the terminal UI (default)
    Deck(deck::Args),

    /// Add, list and remove projects
    Project(project::Args),

    /// Create, list and remove worktrees of a project
    Worktree(worktree::Args),

    /// Show git status of a worktree
    Status(git::StatusArgs),

    /// Stage files in a worktree
    Stage(git::StageArgs),

    /// Unstage files in a worktree
    Unstage(git::StageArgs),

    /// Commit staged changes in a worktree
    Commit(git::CommitArgs),

    /// Open a worktree in an editor or the file manager
    Open(open::Args),

    /// Show and change keyboard shortcuts
    Shortcuts(shortcuts::Args),

    /// Show, export and import configuration
    Config(config::Args),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::try_parse_from(["wtdeck"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn worktree_create_flags() {
        let cli =
            Cli::try_parse_from(["wtdeck", "worktree", "create", "feat/x", "-b", "-p", "app"]).unwrap();
        match cli.command {
            Some(Commands::Worktree(args)) => {
                assert_eq!(args.project.as_deref(), Some("app"));
                assert!(matches!(
                    args.command,
                    worktree::WorktreeCommand::Create { new_branch: true, .. }
                ));
            }
            _ => panic!("expected worktree command"),
        }
    }
}
