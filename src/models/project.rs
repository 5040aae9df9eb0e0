use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::worktree_id_for_path;

pub type ProjectId = String;
pub type WorktreeId = String;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    #[default]
    Repository,
    Workspace,
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Repository => "repository",
            ProjectKind::Workspace => "workspace",
        }
    }
}

impl std::fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Template used to pre-populate terminals when a worktree is first opened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultTerminal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl DefaultTerminal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            command: command.into(),
            enabled: true,
        }
    }

    /// The command to auto-run, if any.
    pub fn auto_command(&self) -> Option<String> {
        let trimmed = self.command.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn builtin_defaults() -> Vec<DefaultTerminal> {
        vec![DefaultTerminal::new("default-1", "Claude code", "claude")]
    }

    /// A fresh `Terminal N` template with an empty command, to append to `existing`.
    pub fn next_for(existing: &[DefaultTerminal]) -> Self {
        let mut seq = Utc::now().timestamp_millis();
        while existing.iter().any(|t| t.id == format!("default-{}", seq)) {
            seq += 1;
        }
        DefaultTerminal::new(
            format!("default-{}", seq),
            format!("Terminal {}", existing.len() + 1),
            "",
        )
    }
}

/// Partial update for a default terminal template.
#[derive(Debug, Clone, Default)]
pub struct DefaultTerminalUpdate {
    pub name: Option<String>,
    pub command: Option<String>,
    pub enabled: Option<bool>,
}

impl DefaultTerminalUpdate {
    pub fn apply(self, terminal: &mut DefaultTerminal) {
        if let Some(name) = self.name {
            terminal.name = name;
        }
        if let Some(command) = self.command {
            terminal.command = command;
        }
        if let Some(enabled) = self.enabled {
            terminal.enabled = enabled;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Worktree {
    pub id: WorktreeId,
    pub branch: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Worktree {
    pub fn new(branch: impl Into<String>, path: PathBuf) -> Self {
        Self {
            id: worktree_id_for_path(&path),
            branch: branch.into(),
            path,
            created_at: Utc::now(),
        }
    }

    /// Last path component, used as display name.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.branch.clone())
    }
}

/// A folder entry of a multi-root workspace file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceRepo {
    pub name: String,
    pub path: PathBuf,
    pub default_branch: String,
    pub is_git_repo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub kind: ProjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub worktrees: Vec<Worktree>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Project-specific templates; `None` falls back to the global defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_terminals: Option<Vec<DefaultTerminal>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspace_repos: Vec<WorkspaceRepo>,
}

impl Project {
    pub fn new(id: ProjectId, name: String, path: PathBuf, kind: ProjectKind) -> Self {
        Self {
            id,
            name,
            path,
            kind,
            default_branch: None,
            worktrees: Vec::new(),
            created_at: Utc::now(),
            last_opened_at: None,
            default_terminals: None,
            workspace_repos: Vec::new(),
        }
    }

    pub fn find_worktree(&self, worktree_id: &str) -> Option<&Worktree> {
        self.worktrees.iter().find(|w| w.id == worktree_id)
    }

    /// Find a worktree by id, display name or branch.
    pub fn resolve_worktree(&self, key: &str) -> Option<&Worktree> {
        self.find_worktree(key)
            .or_else(|| self.worktrees.iter().find(|w| w.display_name() == key))
            .or_else(|| self.worktrees.iter().find(|w| w.branch == key))
    }

    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.name.eq_ignore_ascii_case(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_terminal_auto_command_trims() {
        let t = DefaultTerminal::new("a", "Dev", "  npm run dev \n");
        assert_eq!(t.auto_command(), Some("npm run dev".to_string()));
    }

    #[test]
    fn default_terminal_empty_command_is_none() {
        let t = DefaultTerminal::new("a", "Shell", "   ");
        assert_eq!(t.auto_command(), None);
    }

    #[test]
    fn default_terminal_update_applies_only_set_fields() {
        let mut t = DefaultTerminal::new("a", "Shell", "ls");
        DefaultTerminalUpdate {
            enabled: Some(false),
            ..Default::default()
        }
        .apply(&mut t);
        assert_eq!(t.name, "Shell");
        assert_eq!(t.command, "ls");
        assert!(!t.enabled);
    }

    #[test]
    fn default_terminal_next_for_numbers_and_unique_id() {
        let existing = DefaultTerminal::builtin_defaults();
        let next = DefaultTerminal::next_for(&existing);
        assert_eq!(next.name, "Terminal 2");
        assert!(next.command.is_empty());
        assert!(next.enabled);
        assert!(existing.iter().all(|t| t.id != next.id));
    }

    #[test]
    fn worktree_id_is_stable_for_same_path() {
        let a = Worktree::new("main", PathBuf::from("/nonexistent/wt/a"));
        let b = Worktree::new("other", PathBuf::from("/nonexistent/wt/a"));
        assert_eq!(a.id, b.id, "Worktree::new: id should depend only on the path");
    }

    #[test]
    fn worktree_display_name_is_last_component() {
        let wt = Worktree::new("feature/x", PathBuf::from("/base/proj/feature-x"));
        assert_eq!(wt.display_name(), "feature-x");
    }

    #[test]
    fn project_resolve_worktree_by_branch_or_name() {
        let mut project = Project::new(
            "p1".to_string(),
            "demo".to_string(),
            PathBuf::from("/repo"),
            ProjectKind::Repository,
        );
        project
            .worktrees
            .push(Worktree::new("feature/login", PathBuf::from("/base/demo/login")));

        assert!(project.resolve_worktree("login").is_some());
        assert!(project.resolve_worktree("feature/login").is_some());
        assert!(project.resolve_worktree("nope").is_none());
    }

    #[test]
    fn project_matches_name_case_insensitively() {
        let project = Project::new(
            "p1".to_string(),
            "Demo".to_string(),
            PathBuf::from("/repo"),
            ProjectKind::Repository,
        );
        assert!(project.matches("demo"));
        assert!(project.matches("p1"));
        assert!(!project.matches("other"));
    }

    #[test]
    fn project_kind_serializes_snake_case() {
        let yaml = serde_yaml::to_string(&ProjectKind::Workspace).unwrap();
        assert_eq!(yaml.trim(), "workspace");
    }
}
