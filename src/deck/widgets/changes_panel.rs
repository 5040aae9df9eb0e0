use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::git::{build_file_tree, flatten_tree, TreeNode};
use crate::models::{FileStatus, GitFile, GitStatus};

fn status_color(status: FileStatus) -> Color {
    match status {
        FileStatus::Added | FileStatus::Untracked => Color::Green,
        FileStatus::Deleted => Color::Red,
        FileStatus::Modified | FileStatus::Renamed | FileStatus::Copied => Color::Yellow,
        FileStatus::Unmerged => Color::Magenta,
        FileStatus::Unknown => Color::Gray,
    }
}

/// Git status of the selected worktree, grouped into a file tree per section.
pub struct ChangesPanel {
    visible: bool,
    status: Option<GitStatus>,
    error: Option<String>,
}

impl ChangesPanel {
    pub fn new(visible: bool) -> Self {
        Self {
            visible,
            status: None,
            error: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn status(&self) -> Option<&GitStatus> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, status: GitStatus) {
        self.status = Some(status);
        self.error = None;
    }

    pub fn set_error(&mut self, error: String) {
        self.status = None;
        self.error = Some(error);
    }

    pub fn clear(&mut self) {
        self.status = None;
        self.error = None;
    }

    fn section_lines(title: &str, files: &[GitFile], lines: &mut Vec<Line<'static>>) {
        if files.is_empty() {
            return;
        }
        lines.push(Line::from(Span::styled(
            format!("{} ({})", title, files.len()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        let tree = build_file_tree(files);
        for (depth, node) in flatten_tree(&tree) {
            let indent = "  ".repeat(depth + 1);
            let line = match node {
                TreeNode::Folder {
                    name, file_count, ..
                } => Line::from(vec![
                    Span::raw(indent),
                    Span::styled(format!("{}/", name), Style::default().fg(Color::Blue)),
                    Span::styled(format!(" {}", file_count), Style::default().fg(Color::DarkGray)),
                ]),
                TreeNode::File { name, file, .. } => Line::from(vec![
                    Span::raw(indent),
                    Span::styled(
                        format!("{} ", file.status.symbol()),
                        Style::default().fg(status_color(file.status)),
                    ),
                    Span::raw(name.clone()),
                ]),
            };
            lines.push(line);
        }
    }

    fn build_lines(&self) -> Vec<Line<'static>> {
        if let Some(error) = &self.error {
            return vec![Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            ))];
        }
        let Some(status) = &self.status else {
            return vec![Line::from(Span::styled(
                "Loading...",
                Style::default().fg(Color::DarkGray),
            ))];
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(status.branch.clone(), Style::default().fg(Color::Yellow)),
            Span::styled(
                format!("  ↑{} ↓{}", status.ahead, status.behind),
                Style::default().fg(Color::DarkGray),
            ),
        ])];

        if status.is_clean() {
            lines.push(Line::from(Span::styled(
                "Working tree clean",
                Style::default().fg(Color::Green),
            )));
            return lines;
        }

        Self::section_lines("Staged", &status.staged, &mut lines);
        Self::section_lines("Changes", &status.unstaged, &mut lines);
        Self::section_lines("Untracked", &status.untracked, &mut lines);
        lines
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let title = match &self.status {
            Some(s) if !s.is_clean() => format!(" Changes ({}) ", s.total_changes()),
            _ => " Changes ".to_string(),
        };
        let paragraph = Paragraph::new(self.build_lines()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(title),
        );
        frame.render_widget(paragraph, area);
    }
}
