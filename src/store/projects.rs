use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{
    DefaultTerminal, DefaultTerminalUpdate, Project, ProjectId, ProjectKind, Worktree, WorktreeId,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project path does not exist: {0}")]
    PathNotFound(String),

    #[error("Selected folder is not a Git repository: {0}")]
    NotGitRepository(String),

    #[error("Selected file is not a valid workspace file: {0}")]
    InvalidWorkspaceFile(String),

    #[error("Project already added: {0}")]
    DuplicatePath(String),

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Worktree not found: {0}")]
    WorktreeNotFound(String),

    #[error("Terminal template not found: {0}")]
    TemplateNotFound(String),
}

/// Check that `path` can back a project of the given kind.
pub fn validate_project_path(path: &Path, kind: ProjectKind) -> Result<(), ProjectError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(ProjectError::PathNotFound(display));
    }
    match kind {
        ProjectKind::Repository => {
            if !path.join(".git").exists() {
                return Err(ProjectError::NotGitRepository(display));
            }
        }
        ProjectKind::Workspace => {
            let valid = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "code-workspace" || e == "json")
                .unwrap_or(false);
            if !valid || !path.is_file() {
                return Err(ProjectError::InvalidWorkspaceFile(display));
            }
        }
    }
    Ok(())
}

/// Project list plus selection. Pure state; persistence lives in `ProjectStore`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub selected_project_id: Option<ProjectId>,
    #[serde(default)]
    pub selected_worktree_id: Option<WorktreeId>,
}

impl ProjectState {
    pub fn add(&mut self, project: Project) -> Result<&Project, ProjectError> {
        validate_project_path(&project.path, project.kind)?;
        if self.projects.iter().any(|p| p.path == project.path) {
            return Err(ProjectError::DuplicatePath(project.path.display().to_string()));
        }
        self.projects.push(project);
        let idx = self.projects.len() - 1;
        Ok(&self.projects[idx])
    }

    pub fn remove(&mut self, key: &str) -> Result<Project, ProjectError> {
        let idx = self
            .projects
            .iter()
            .position(|p| p.matches(key))
            .ok_or_else(|| ProjectError::NotFound(key.to_string()))?;
        let removed = self.projects.remove(idx);
        if self.selected_project_id.as_deref() == Some(removed.id.as_str()) {
            self.selected_project_id = None;
            self.selected_worktree_id = None;
        }
        Ok(removed)
    }

    /// Lookup by id, then by case-insensitive name.
    pub fn find(&self, key: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == key)
            .or_else(|| self.projects.iter().find(|p| p.name.eq_ignore_ascii_case(key)))
    }

    /// The project whose root or worktree most closely contains `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<&Project> {
        self.projects
            .iter()
            .filter_map(|p| {
                std::iter::once(&p.path)
                    .chain(p.worktrees.iter().map(|w| &w.path))
                    .filter(|root| path.starts_with(root))
                    .map(|root| root.components().count())
                    .max()
                    .map(|depth| (depth, p))
            })
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, p)| p)
    }

    fn project_mut(&mut self, project_id: &str) -> Result<&mut Project, ProjectError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| ProjectError::NotFound(project_id.to_string()))
    }

    /// Clears the worktree selection and stamps `last_opened_at`.
    pub fn select_project(&mut self, project_id: Option<&str>) {
        self.selected_project_id = project_id.map(str::to_string);
        self.selected_worktree_id = None;
        if let Some(id) = project_id {
            if let Some(project) = self.projects.iter_mut().find(|p| p.id == id) {
                project.last_opened_at = Some(Utc::now());
            }
        }
    }

    pub fn select_worktree(&mut self, worktree_id: Option<&str>) {
        self.selected_worktree_id = worktree_id.map(str::to_string);
    }

    pub fn selected_project(&self) -> Option<&Project> {
        let id = self.selected_project_id.as_deref()?;
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn selected_worktree(&self) -> Option<&Worktree> {
        let worktree_id = self.selected_worktree_id.as_deref()?;
        self.selected_project()?.find_worktree(worktree_id)
    }

    pub fn add_worktree(&mut self, project_id: &str, worktree: Worktree) -> Result<(), ProjectError> {
        let project = self.project_mut(project_id)?;
        if let Some(existing) = project.worktrees.iter_mut().find(|w| w.id == worktree.id) {
            existing.branch = worktree.branch;
        } else {
            project.worktrees.push(worktree);
        }
        Ok(())
    }

    pub fn remove_worktree(
        &mut self,
        project_id: &str,
        worktree_id: &str,
    ) -> Result<Worktree, ProjectError> {
        let project = self.project_mut(project_id)?;
        let idx = project
            .worktrees
            .iter()
            .position(|w| w.id == worktree_id)
            .ok_or_else(|| ProjectError::WorktreeNotFound(worktree_id.to_string()))?;
        let removed = project.worktrees.remove(idx);
        if self.selected_worktree_id.as_deref() == Some(worktree_id) {
            self.selected_worktree_id = None;
        }
        Ok(removed)
    }

    /// Replace a project's worktrees with what git reports, keeping creation
    /// times of worktrees already known.
    pub fn sync_worktrees(
        &mut self,
        project_id: &str,
        discovered: Vec<Worktree>,
    ) -> Result<(usize, usize), ProjectError> {
        let project = self.project_mut(project_id)?;
        let before: Vec<WorktreeId> = project.worktrees.iter().map(|w| w.id.clone()).collect();

        let merged: Vec<Worktree> = discovered
            .into_iter()
            .map(|mut wt| {
                if let Some(known) = project.worktrees.iter().find(|k| k.id == wt.id) {
                    wt.created_at = known.created_at;
                }
                wt
            })
            .collect();

        let added = merged.iter().filter(|w| !before.contains(&w.id)).count();
        let removed = before
            .iter()
            .filter(|id| !merged.iter().any(|w| &w.id == *id))
            .count();
        project.worktrees = merged;

        let selection_gone = match self.selected_worktree_id.as_deref() {
            Some(sel) => self
                .projects
                .iter()
                .all(|p| p.find_worktree(sel).is_none()),
            None => false,
        };
        if selection_gone {
            self.selected_worktree_id = None;
        }

        Ok((added, removed))
    }

    /// Project templates, or `fallback` when the project has none of its own.
    pub fn terminal_templates(
        &self,
        project_id: &str,
        fallback: &[DefaultTerminal],
    ) -> Vec<DefaultTerminal> {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .and_then(|p| p.default_terminals.clone())
            .unwrap_or_else(|| fallback.to_vec())
    }

    fn templates_mut<'a>(
        project: &'a mut Project,
        fallback: &[DefaultTerminal],
    ) -> &'a mut Vec<DefaultTerminal> {
        project
            .default_terminals
            .get_or_insert_with(|| fallback.to_vec())
    }

    pub fn add_template(
        &mut self,
        project_id: &str,
        fallback: &[DefaultTerminal],
    ) -> Result<DefaultTerminal, ProjectError> {
        let project = self.project_mut(project_id)?;
        let templates = Self::templates_mut(project, fallback);
        let template = DefaultTerminal::next_for(templates);
        templates.push(template.clone());
        Ok(template)
    }

    pub fn remove_template(
        &mut self,
        project_id: &str,
        template_id: &str,
        fallback: &[DefaultTerminal],
    ) -> Result<(), ProjectError> {
        let project = self.project_mut(project_id)?;
        let templates = Self::templates_mut(project, fallback);
        let before = templates.len();
        templates.retain(|t| t.id != template_id);
        if templates.len() == before {
            return Err(ProjectError::TemplateNotFound(template_id.to_string()));
        }
        Ok(())
    }

    pub fn update_template(
        &mut self,
        project_id: &str,
        template_id: &str,
        update: DefaultTerminalUpdate,
        fallback: &[DefaultTerminal],
    ) -> Result<(), ProjectError> {
        let project = self.project_mut(project_id)?;
        let templates = Self::templates_mut(project, fallback);
        let template = templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or_else(|| ProjectError::TemplateNotFound(template_id.to_string()))?;
        update.apply(template);
        Ok(())
    }

    /// Drop project-specific templates so the global defaults apply again.
    pub fn reset_templates(&mut self, project_id: &str) -> Result<(), ProjectError> {
        self.project_mut(project_id)?.default_terminals = None;
        Ok(())
    }
}
