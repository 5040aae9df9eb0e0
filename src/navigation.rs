//! Cyclic movement across worktrees and projects.
//!
//! Every function returns the worktree that became selected, if any, so the
//! caller can focus its active terminal.

use crate::models::WorktreeId;
use crate::store::ProjectState;

fn step(current: Option<usize>, len: usize, forward: bool) -> usize {
    match current {
        None if forward => 0,
        None => len - 1,
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
    }
}

fn cycle_worktree(state: &mut ProjectState, forward: bool) -> Option<WorktreeId> {
    let project = state.selected_project()?;
    if project.worktrees.is_empty() {
        return None;
    }

    let current = state
        .selected_worktree_id
        .as_deref()
        .and_then(|id| project.worktrees.iter().position(|w| w.id == id));
    let idx = step(current, project.worktrees.len(), forward);
    let project_id = project.id.clone();
    let target = project.worktrees[idx].id.clone();

    state.select_project(Some(&project_id));
    state.select_worktree(Some(&target));
    Some(target)
}

fn cycle_project(state: &mut ProjectState, forward: bool) -> Option<WorktreeId> {
    if state.projects.is_empty() {
        return None;
    }

    let current = state
        .selected_project_id
        .as_deref()
        .and_then(|id| state.projects.iter().position(|p| p.id == id));
    let idx = step(current, state.projects.len(), forward);
    let project = &state.projects[idx];
    let project_id = project.id.clone();
    let first = project.worktrees.first().map(|w| w.id.clone());

    state.select_project(Some(&project_id));
    state.select_worktree(first.as_deref());
    first
}

pub fn next_worktree(state: &mut ProjectState) -> Option<WorktreeId> {
    cycle_worktree(state, true)
}

pub fn previous_worktree(state: &mut ProjectState) -> Option<WorktreeId> {
    cycle_worktree(state, false)
}

pub fn next_project(state: &mut ProjectState) -> Option<WorktreeId> {
    cycle_project(state, true)
}

pub fn previous_project(state: &mut ProjectState) -> Option<WorktreeId> {
    cycle_project(state, false)
}

/// Select the `number`-th (1-based) worktree of the selected project.
pub fn worktree_by_number(state: &mut ProjectState, number: usize) -> Option<WorktreeId> {
    let project = state.selected_project()?;
    if number == 0 || number > project.worktrees.len() {
        return None;
    }
    let project_id = project.id.clone();
    let target = project.worktrees[number - 1].id.clone();

    state.select_project(Some(&project_id));
    state.select_worktree(Some(&target));
    Some(target)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::models::{Project, ProjectKind, Worktree};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn state_with(count: usize) -> ProjectState {
        let mut p = Project::new(
            "p".to_string(),
            "p".to_string(),
            PathBuf::from("/nonexistent/p"),
            ProjectKind::Repository,
        );
        p.worktrees = (0..count)
            .map(|i| Worktree::new(format!("b{}", i), PathBuf::from(format!("/nonexistent/p/{}", i))))
            .collect();
        let mut state = ProjectState {
            projects: vec![p],
            ..Default::default()
        };
        state.select_project(Some("p"));
        state
    }

    proptest! {
        #[test]
        fn next_then_previous_returns_to_start(count in 1usize..8, moves in 1usize..20) {
            let mut state = state_with(count);
            let start = next_worktree(&mut state);
            for _ in 0..moves {
                next_worktree(&mut state);
            }
            for _ in 0..moves {
                previous_worktree(&mut state);
            }
            prop_assert_eq!(state.selected_worktree_id, start);
        }

        #[test]
        fn full_cycle_visits_every_worktree(count in 1usize..8) {
            let mut state = state_with(count);
            let mut seen = std::collections::HashSet::new();
            for _ in 0..count {
                seen.insert(next_worktree(&mut state));
            }
            prop_assert_eq!(seen.len(), count);
        }
    }
}
