use std::io::{self, Stdout};

use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use super::app::{DeckApp, SessionTab};
use crate::keymap::FocusArea;

const SIDEBAR_WIDTH: u16 = 34;
const CHANGES_WIDTH: u16 = 40;

pub struct UI;

impl UI {
    pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend)
    }

    pub fn restore_terminal() -> io::Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), DisableBracketedPaste, LeaveAlternateScreen)?;
        Ok(())
    }

    pub fn render(frame: &mut Frame, app: &mut DeckApp) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(3),
            ])
            .split(frame.area());

        Self::render_header(frame, chunks[0], app);
        Self::render_body(frame, chunks[1], app);
        Self::render_footer(frame, chunks[2], app);

        if app.help_modal().is_visible() {
            let modal_area = Self::centered_area(frame.area(), 60, 80);
            app.help_modal()
                .render(frame, modal_area, &app.config().shortcuts);
        }

        if let Some(prompt) = app.prompt() {
            let area = Self::centered_area(frame.area(), 60, 20);
            prompt.render(frame, area);
        }
    }

    fn render_body(frame: &mut Frame, area: Rect, app: &mut DeckApp) {
        let mut constraints = vec![Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)];
        if app.changes_panel().is_visible() {
            constraints.push(Constraint::Length(CHANGES_WIDTH));
        }
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        let rows = app.sidebar_rows();
        app.sidebar().render(frame, columns[0], &rows);

        let tabs = app.session_tabs();
        let terminal_area = if tabs.is_empty() {
            columns[1]
        } else {
            let split = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Min(3)])
                .split(columns[1]);
            Self::render_tabs(frame, split[0], &tabs);
            split[1]
        };
        app.terminal_view().render(frame, terminal_area);

        if app.changes_panel().is_visible() {
            app.changes_panel().render(frame, columns[2]);
        }
    }

    fn render_tabs(frame: &mut Frame, area: Rect, tabs: &[SessionTab]) {
        let mut spans = Vec::with_capacity(tabs.len() * 2);
        for (i, tab) in tabs.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
            }
            let style = if tab.active {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else if tab.exited {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::Gray)
            };
            let marker = if tab.exited { " ✗" } else { "" };
            spans.push(Span::styled(format!(" {}{} ", tab.name, marker), style));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn centered_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(area);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }

    fn render_header(frame: &mut Frame, area: Rect, app: &DeckApp) {
        let mut title = vec![Span::styled(
            " WTDECK ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )];

        let projects = app.projects();
        match projects.selected_project() {
            Some(project) => {
                title.push(Span::raw("| "));
                title.push(Span::styled(
                    format!("{} ", project.name),
                    Style::default().fg(Color::Yellow),
                ));
                if let Some(worktree) = projects.selected_worktree() {
                    title.push(Span::raw("| "));
                    title.push(Span::styled(
                        format!("{} ", worktree.branch),
                        Style::default().fg(Color::Green),
                    ));
                    if area.width >= 100 {
                        title.push(Span::styled(
                            worktree.path.display().to_string(),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
            }
            None if projects.projects.is_empty() => {
                title.push(Span::styled(
                    "| No projects (wtdeck project add <path>)",
                    Style::default().fg(Color::DarkGray),
                ));
            }
            None => {}
        }

        let running = app.terminal_count();
        if running > 0 {
            title.push(Span::styled(
                format!(" | {} terminal(s)", running),
                Style::default().fg(Color::Gray),
            ));
        }

        let header = Paragraph::new(Line::from(title)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

        frame.render_widget(header, area);
    }

    fn chord_for(app: &DeckApp, id: &str) -> Option<String> {
        let shortcuts = &app.config().shortcuts;
        if !shortcuts.enabled {
            return None;
        }
        shortcuts.get(id).map(|s| s.chord.to_string())
    }

    fn render_footer(frame: &mut Frame, area: Rect, app: &DeckApp) {
        let message = app.message().unwrap_or("");
        let message = if message.is_empty() {
            String::new()
        } else {
            format!("{} | ", message)
        };
        let message_style = if message.contains("Error") || message.contains("empty") {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };

        let mut help_text = vec![Span::styled(message, message_style)];
        let mut hint = |key: String, label: &str| {
            help_text.push(Span::styled(key, Style::default().fg(Color::Yellow)));
            help_text.push(Span::raw(format!(": {} ", label)));
        };

        if app.focus() == FocusArea::Sidebar {
            hint("n".to_string(), "Worktree");
            hint("c".to_string(), "Commit");
        }
        for (id, label) in [
            ("new-terminal", "New terminal"),
            ("toggle-focus", "Focus"),
            ("show-help", "Help"),
            ("quit", "Quit"),
        ] {
            if let Some(chord) = Self::chord_for(app, id) {
                hint(chord, label);
            }
        }

        let footer = Paragraph::new(Line::from(help_text)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

        frame.render_widget(footer, area);
    }
}
