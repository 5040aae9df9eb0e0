use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::models::{ProjectId, WorktreeId};
use crate::store::ProjectState;
use crate::utils::truncate_str;

const NAME_MAX_CHARS: usize = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarRow {
    Project {
        id: ProjectId,
        name: String,
        selected: bool,
    },
    Worktree {
        id: WorktreeId,
        number: usize,
        name: String,
        branch: String,
        selected: bool,
        terminals: usize,
    },
}

impl SidebarRow {
    fn is_selected(&self) -> bool {
        match self {
            SidebarRow::Project { selected, .. } | SidebarRow::Worktree { selected, .. } => {
                *selected
            }
        }
    }
}

/// Projects with their worktrees listed underneath. Only the selected
/// project is expanded.
pub fn sidebar_rows(
    state: &ProjectState,
    terminal_count: impl Fn(&str) -> usize,
) -> Vec<SidebarRow> {
    let mut rows = Vec::new();
    for project in &state.projects {
        let project_selected = state.selected_project_id.as_deref() == Some(project.id.as_str());
        rows.push(SidebarRow::Project {
            id: project.id.clone(),
            name: project.name.clone(),
            selected: project_selected && state.selected_worktree_id.is_none(),
        });
        if !project_selected {
            continue;
        }
        for (i, worktree) in project.worktrees.iter().enumerate() {
            rows.push(SidebarRow::Worktree {
                id: worktree.id.clone(),
                number: i + 1,
                name: worktree.display_name(),
                branch: worktree.branch.clone(),
                selected: state.selected_worktree_id.as_deref() == Some(worktree.id.as_str()),
                terminals: terminal_count(&worktree.id),
            });
        }
    }
    rows
}

pub struct Sidebar {
    state: ListState,
    focused: bool,
}

impl Sidebar {
    pub fn new() -> Self {
        Self {
            state: ListState::default(),
            focused: true,
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, rows: &[SidebarRow]) {
        let items: Vec<ListItem> = rows.iter().map(Self::row_item).collect();
        self.state.select(rows.iter().position(SidebarRow::is_selected));

        let border_color = if self.focused {
            Color::Cyan
        } else {
            Color::DarkGray
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color))
                    .title(" Projects "),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            );

        frame.render_stateful_widget(list, area, &mut self.state);
    }

    fn row_item(row: &SidebarRow) -> ListItem<'static> {
        match row {
            SidebarRow::Project { name, .. } => ListItem::new(Line::from(Span::styled(
                truncate_str(name, NAME_MAX_CHARS),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))),
            SidebarRow::Worktree {
                number,
                name,
                branch,
                terminals,
                ..
            } => {
                let mut spans = vec![
                    Span::styled(format!(" {} ", number), Style::default().fg(Color::DarkGray)),
                    Span::raw(truncate_str(name, NAME_MAX_CHARS)),
                ];
                if branch != name {
                    spans.push(Span::styled(
                        format!(" ({})", truncate_str(branch, NAME_MAX_CHARS)),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                if *terminals > 0 {
                    spans.push(Span::styled(
                        format!(" [{}]", terminals),
                        Style::default().fg(Color::Green),
                    ));
                }
                ListItem::new(Line::from(spans))
            }
        }
    }
}

impl Default for Sidebar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Project, ProjectKind, Worktree};
    use std::path::PathBuf;

    fn state() -> ProjectState {
        let mut a = Project::new("p1".into(), "alpha".into(), PathBuf::from("/a"), ProjectKind::Repository);
        a.worktrees = vec![
            Worktree::new("main", PathBuf::from("/a")),
            Worktree::new("feature/x", PathBuf::from("/wt/feature-x")),
        ];
        let b = Project::new("p2".into(), "beta".into(), PathBuf::from("/b"), ProjectKind::Repository);
        ProjectState {
            projects: vec![a, b],
            ..Default::default()
        }
    }

    #[test]
    fn only_selected_project_is_expanded() {
        let mut s = state();
        assert_eq!(sidebar_rows(&s, |_| 0).len(), 2);

        s.select_project(Some("p1"));
        let rows = sidebar_rows(&s, |_| 0);
        assert_eq!(rows.len(), 4, "sidebar_rows: should list worktrees of the selected project");
        assert!(matches!(rows[1], SidebarRow::Worktree { number: 1, .. }));
        assert!(matches!(rows[3], SidebarRow::Project { .. }));
    }

    #[test]
    fn selection_marks_worktree_or_project() {
        let mut s = state();
        s.select_project(Some("p1"));
        let rows = sidebar_rows(&s, |_| 0);
        assert!(rows[0].is_selected());

        let wt = s.projects[0].worktrees[1].id.clone();
        s.select_worktree(Some(&wt));
        let rows = sidebar_rows(&s, |_| 2);
        assert!(!rows[0].is_selected());
        match &rows[2] {
            SidebarRow::Worktree {
                selected,
                terminals,
                name,
                ..
            } => {
                assert!(*selected);
                assert_eq!(*terminals, 2);
                assert_eq!(name, "feature-x");
            }
            other => panic!("expected worktree row, got {:?}", other),
        }
    }

    #[test]
    fn render_does_not_panic_on_small_area() {
        use ratatui::backend::TestBackend;
        use ratatui::Terminal;

        let mut s = state();
        s.select_project(Some("p1"));
        let rows = sidebar_rows(&s, |_| 1);
        let mut sidebar = Sidebar::new();
        let mut terminal = Terminal::new(TestBackend::new(12, 4)).unwrap();
        terminal
            .draw(|frame| sidebar.render(frame, frame.area(), &rows))
            .unwrap();
    }
}
