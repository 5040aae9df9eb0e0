use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::models::SessionId;

/// What the entered line is used for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    CreateWorktree,
    RenameTerminal(SessionId),
    Commit,
}

impl PromptKind {
    fn title(&self) -> &'static str {
        match self {
            PromptKind::CreateWorktree => " New worktree (branch name) ",
            PromptKind::RenameTerminal(_) => " Rename terminal ",
            PromptKind::Commit => " Commit message ",
        }
    }
}

/// Single-line text input shown over the deck.
pub struct Prompt {
    kind: PromptKind,
    content: String,
    // cursor counts chars, not bytes
    cursor: usize,
}

impl Prompt {
    pub fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            content: String::new(),
            cursor: 0,
        }
    }

    pub fn with_content(kind: PromptKind, content: &str) -> Self {
        Self {
            kind,
            content: content.to_string(),
            cursor: content.chars().count(),
        }
    }

    pub fn kind(&self) -> &PromptKind {
        &self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let idx = self.byte_index(self.cursor);
        self.content.insert(idx, c);
        self.cursor += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index(self.cursor);
            self.content.remove(idx);
        }
    }

    pub fn delete_forward(&mut self) {
        if self.cursor < self.content.chars().count() {
            let idx = self.byte_index(self.cursor);
            self.content.remove(idx);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.content.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn move_cursor_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.content.chars().count();
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Clear, area);

        let split = self.byte_index(self.cursor);
        let (before, after) = self.content.split_at(split);
        let line = Line::from(vec![
            Span::styled(before.to_string(), Style::default().fg(Color::White)),
            Span::styled(
                "│",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(after.to_string(), Style::default().fg(Color::White)),
        ]);

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(self.kind.title()),
        );
        frame.render_widget(paragraph, area);
    }
}
