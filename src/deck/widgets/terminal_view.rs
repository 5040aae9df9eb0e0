use ansi_to_tui::IntoText;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;
use xxhash_rust::xxh3::xxh3_64;

use crate::models::SessionId;

const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeState {
    Normal,
    Escape,
    Csi,
    Osc,
    OscEscape,
}

/// Turns a pty byte stream into plain lines with SGR colour codes kept.
/// Cursor movement is not emulated: `\r` rewrites the current line and
/// other control sequences are dropped.
#[derive(Debug)]
pub struct LineAccumulator {
    text: String,
    max_bytes: usize,
    pending: Vec<u8>,
    pending_cr: bool,
    state: EscapeState,
    sequence: String,
}

impl LineAccumulator {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            text: String::new(),
            max_bytes,
            pending: Vec::new(),
            pending_cr: false,
            state: EscapeState::Normal,
            sequence: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.pending.clear();
        self.pending_cr = false;
        self.state = EscapeState::Normal;
        self.sequence.clear();
    }

    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        let bytes = std::mem::take(&mut self.pending);

        let (decoded, rest) = match std::str::from_utf8(&bytes) {
            Ok(s) => (s.to_string(), Vec::new()),
            // an incomplete trailing sequence waits for the next chunk
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                (
                    String::from_utf8_lossy(&bytes[..valid]).into_owned(),
                    bytes[valid..].to_vec(),
                )
            }
            Err(_) => (String::from_utf8_lossy(&bytes).into_owned(), Vec::new()),
        };
        self.pending = rest;

        for c in decoded.chars() {
            self.feed(c);
        }
        self.trim_front();
    }

    fn line_start(&self) -> usize {
        self.text.rfind('\n').map(|i| i + 1).unwrap_or(0)
    }

    /// Display column of the cursor, ignoring SGR sequences.
    fn visible_column(&self) -> usize {
        let mut column = 0;
        let mut in_sequence = false;
        for c in self.text[self.line_start()..].chars() {
            match c {
                '\x1b' => in_sequence = true,
                c if in_sequence => in_sequence = !('@'..='~').contains(&c) || c == '[',
                c => column += c.width().unwrap_or(0),
            }
        }
        column
    }

    fn apply_pending_cr(&mut self) {
        if self.pending_cr {
            let start = self.line_start();
            self.text.truncate(start);
            self.pending_cr = false;
        }
    }

    fn feed(&mut self, c: char) {
        match self.state {
            EscapeState::Normal => match c {
                '\x1b' => {
                    self.state = EscapeState::Escape;
                    self.sequence.clear();
                    self.sequence.push(c);
                }
                '\r' => self.pending_cr = true,
                '\n' => {
                    self.pending_cr = false;
                    self.text.push('\n');
                }
                '\x08' => {
                    if !self.text.ends_with('\n') {
                        self.text.pop();
                    }
                }
                '\t' => {
                    self.apply_pending_cr();
                    let pad = TAB_WIDTH - self.visible_column() % TAB_WIDTH;
                    self.text.extend(std::iter::repeat(' ').take(pad));
                }
                c if c.is_control() => {}
                c => {
                    self.apply_pending_cr();
                    self.text.push(c);
                }
            },
            EscapeState::Escape => match c {
                '[' => {
                    self.sequence.push(c);
                    self.state = EscapeState::Csi;
                }
                ']' => self.state = EscapeState::Osc,
                _ => self.state = EscapeState::Normal,
            },
            EscapeState::Csi => {
                self.sequence.push(c);
                if ('@'..='~').contains(&c) {
                    if c == 'm' {
                        self.apply_pending_cr();
                        let seq = std::mem::take(&mut self.sequence);
                        self.text.push_str(&seq);
                    }
                    self.state = EscapeState::Normal;
                }
            }
            EscapeState::Osc => match c {
                '\x07' => self.state = EscapeState::Normal,
                '\x1b' => self.state = EscapeState::OscEscape,
                _ => {}
            },
            EscapeState::OscEscape => {
                self.state = if c == '\\' {
                    EscapeState::Normal
                } else {
                    EscapeState::Osc
                };
            }
        }
    }

    fn trim_front(&mut self) {
        if self.text.len() <= self.max_bytes {
            return;
        }
        let excess = self.text.len() - self.max_bytes;
        let cut = self
            .text
            .char_indices()
            .find(|(i, c)| *i >= excess && *c == '\n')
            .map(|(i, _)| i + 1)
            .unwrap_or(self.text.len());
        self.text.drain(..cut);
    }
}

/// Split lines into rows of at most `width` columns, keeping span styles.
/// A character wider than `width` still gets a row of its own.
pub fn wrap_rows(text: &Text<'static>, width: usize) -> Vec<Line<'static>> {
    let mut rows = Vec::with_capacity(text.lines.len());
    for line in &text.lines {
        let mut row: Vec<Span<'static>> = Vec::new();
        let mut row_width = 0;
        for span in &line.spans {
            let mut chunk = String::new();
            for c in span.content.chars() {
                let w = c.width().unwrap_or(0);
                if row_width > 0 && row_width + w > width {
                    if !chunk.is_empty() {
                        row.push(Span::styled(std::mem::take(&mut chunk), span.style));
                    }
                    rows.push(Line::from(std::mem::take(&mut row)).style(line.style));
                    row_width = 0;
                }
                chunk.push(c);
                row_width += w;
            }
            if !chunk.is_empty() {
                row.push(Span::styled(chunk, span.style));
            }
        }
        rows.push(Line::from(row).style(line.style));
    }
    rows
}

pub struct TerminalView {
    session_id: Option<SessionId>,
    title: String,
    exited: bool,
    lines: LineAccumulator,
    content: Text<'static>,
    rows: Vec<Line<'static>>,
    rows_width: Option<usize>,
    // rows from the top of `rows`; usize::MAX pins to the bottom
    scroll_offset: usize,
    focused: bool,
    auto_scroll: bool,
    last_render_size: (u16, u16),
    content_hash: u64,
}

impl TerminalView {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            session_id: None,
            title: String::new(),
            exited: false,
            lines: LineAccumulator::new(max_bytes),
            content: Text::default(),
            rows: Vec::new(),
            rows_width: None,
            scroll_offset: 0,
            focused: false,
            auto_scroll: true,
            last_render_size: (0, 0),
            content_hash: 0,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn set_exited(&mut self, exited: bool) {
        self.exited = exited;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.content = Text::default();
        self.rows.clear();
        self.rows_width = None;
        self.scroll_offset = 0;
        self.auto_scroll = true;
        self.content_hash = 0;
        self.exited = false;
    }

    /// Switch to another session. Output is cleared when the session changes.
    pub fn set_session(&mut self, session_id: Option<&str>, title: &str) {
        if self.session_id.as_deref() != session_id {
            self.clear();
        }
        self.session_id = session_id.map(str::to_string);
        self.title = title.to_string();
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        self.lines.push(data);
    }

    /// Re-parse the accumulated output if it changed. Returns whether it did.
    pub fn refresh(&mut self) -> bool {
        let raw = self.lines.text();
        let hash = xxh3_64(raw.as_bytes());
        if hash == self.content_hash {
            return false;
        }
        self.content_hash = hash;
        self.content = Self::parse_ansi(raw);
        self.rows_width = None;
        true
    }

    pub fn last_render_size(&self) -> (u16, u16) {
        self.last_render_size
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines as usize);
        self.auto_scroll = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines as usize);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = usize::MAX;
        self.auto_scroll = true;
    }

    fn rewrap(&mut self, width: usize) {
        if self.rows_width == Some(width) {
            return;
        }
        self.rows = wrap_rows(&self.content, width.max(1));
        self.rows_width = Some(width);
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let border_color = if self.focused {
            Color::Cyan
        } else {
            Color::DarkGray
        };

        let inner_width = area.width.saturating_sub(2);
        let inner_height = area.height.saturating_sub(2);
        self.last_render_size = (inner_width, inner_height);

        self.rewrap(inner_width as usize);
        let visible_height = inner_height as usize;
        let visual_line_count = self.rows.len();

        let max_scroll = visual_line_count.saturating_sub(visible_height);
        if self.auto_scroll {
            self.scroll_offset = max_scroll;
        } else {
            self.scroll_offset = self.scroll_offset.min(max_scroll);
        }
        if self.scroll_offset >= max_scroll {
            self.auto_scroll = true;
        }

        let title = if self.session_id.is_none() {
            " No terminal (Alt+T to open one) ".to_string()
        } else {
            let exited = if self.exited { " [exited]" } else { "" };
            let scroll = if self.auto_scroll {
                String::new()
            } else {
                format!(" [{}/{}]", self.scroll_offset + 1, visual_line_count)
            };
            format!(" {}{}{} ", self.title, exited, scroll)
        };

        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(border_color)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color));

        // only the visible window is handed to ratatui
        let end = (self.scroll_offset + visible_height).min(visual_line_count);
        let window = self.rows[self.scroll_offset.min(end)..end].to_vec();
        let paragraph = Paragraph::new(Text::from(window)).block(block);

        frame.render_widget(paragraph, area);
    }

    /// Falls back to plain text when the escape codes do not parse.
    pub fn parse_ansi(raw: &str) -> Text<'static> {
        raw.into_text()
            .unwrap_or_else(|_| Text::raw(raw.to_string()))
    }
}
