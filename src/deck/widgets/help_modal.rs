use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::keymap::ShortcutSet;

pub struct HelpModal {
    visible: bool,
}

impl HelpModal {
    pub fn new() -> Self {
        Self { visible: false }
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, shortcuts: &ShortcutSet) {
        if !self.visible {
            return;
        }

        frame.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(Span::styled(
                " Help ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));

        let paragraph = Paragraph::new(Self::build_help_lines(shortcuts)).block(block);
        frame.render_widget(paragraph, area);
    }

    fn build_help_lines(shortcuts: &ShortcutSet) -> Vec<Line<'static>> {
        let mut lines = vec![
            Self::section_title("Keyboard Shortcuts"),
            Line::from(""),
        ];

        if !shortcuts.enabled {
            lines.push(Line::from(Span::styled(
                "  Shortcuts are disabled (wtdeck shortcuts enable)",
                Style::default().fg(Color::Red),
            )));
        }

        for shortcut in &shortcuts.shortcuts {
            lines.push(Self::key_line(
                shortcut.chord.to_string(),
                shortcut.description.clone(),
            ));
        }

        lines.extend([
            Line::from(""),
            Self::section_title("Sidebar"),
            Self::key_line("Up / Down".to_string(), "Previous / next worktree".to_string()),
            Self::key_line("Enter".to_string(), "Focus terminal".to_string()),
            Self::key_line("n".to_string(), "Create worktree".to_string()),
            Self::key_line("r".to_string(), "Rename terminal".to_string()),
            Self::key_line("c".to_string(), "Commit staged changes".to_string()),
            Self::key_line("a".to_string(), "Stage all changes".to_string()),
            Self::key_line("1-9".to_string(), "Select terminal tab".to_string()),
            Self::key_line("PgUp / PgDn".to_string(), "Scroll terminal output".to_string()),
            Line::from(""),
            Line::from(Span::styled(
                "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━",
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(vec![
                Span::styled("Esc", Style::default().fg(Color::Yellow)),
                Span::raw(": Close this help"),
            ]),
        ]);
        lines
    }

    fn section_title(title: &'static str) -> Line<'static> {
        Line::from(Span::styled(
            format!("━━━ {} ━━━", title),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
    }

    fn key_line(key: String, description: String) -> Line<'static> {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{:20}", key), Style::default().fg(Color::Yellow)),
            Span::raw(description),
        ])
    }
}

impl Default for HelpModal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{Key, KeyChord};

    fn help_text(shortcuts: &ShortcutSet) -> String {
        HelpModal::build_help_lines(shortcuts)
            .iter()
            .flat_map(|line| line.spans.iter().map(|s| s.content.to_string()))
            .collect()
    }

    #[test]
    fn modal_starts_hidden() {
        assert!(!HelpModal::new().is_visible());
    }

    #[test]
    fn show_and_hide() {
        let mut modal = HelpModal::new();
        modal.show();
        assert!(modal.is_visible());
        modal.hide();
        assert!(!modal.is_visible());
    }

    #[test]
    fn help_text_lists_configured_chords() {
        let shortcuts = ShortcutSet::default();
        let text = help_text(&shortcuts);
        assert!(
            text.contains("Ctrl+Right"),
            "build_help_lines: should list the next-worktree chord"
        );
        assert!(text.contains("F1"));
    }

    #[test]
    fn help_text_follows_rebinding() {
        let mut shortcuts = ShortcutSet::default();
        shortcuts
            .update("show-help", KeyChord::new(Key::F(2)))
            .unwrap();
        let text = help_text(&shortcuts);
        assert!(
            text.contains("F2"),
            "build_help_lines: should show the rebound chord"
        );
    }

    #[test]
    fn help_text_flags_disabled_set() {
        let mut shortcuts = ShortcutSet::default();
        shortcuts.set_enabled(false);
        assert!(help_text(&shortcuts).contains("disabled"));
    }
}
