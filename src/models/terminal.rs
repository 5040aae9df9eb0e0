use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::project::WorktreeId;

pub type SessionId = String;
pub type BackendId = String;

/// A named terminal hosted by a worktree. Session-only, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerminalSession {
    pub id: SessionId,
    pub name: String,
    pub worktree_id: WorktreeId,
    pub working_directory: PathBuf,
    pub last_active_at: DateTime<Utc>,
    pub is_active: bool,
    /// Set while a pty is running for this session.
    pub backend_id: Option<BackendId>,
    pub auto_command: Option<String>,
    #[serde(default)]
    pub exited: bool,
}

impl TerminalSession {
    pub fn new(
        id: SessionId,
        worktree_id: WorktreeId,
        name: String,
        working_directory: PathBuf,
        auto_command: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            worktree_id,
            working_directory,
            last_active_at: Utc::now(),
            is_active: false,
            backend_id: None,
            auto_command,
            exited: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.backend_id.is_some() && !self.exited
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}
