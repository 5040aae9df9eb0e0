mod git;
mod project;
mod terminal;

pub use git::{FileStatus, GitFile, GitStatus};
pub use project::{
    DefaultTerminal, DefaultTerminalUpdate, Project, ProjectId, ProjectKind, WorkspaceRepo,
    Worktree, WorktreeId,
};
pub use terminal::{BackendId, SessionId, TerminalSession};
