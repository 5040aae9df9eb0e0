use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShortcutError {
    #[error("Invalid key chord: {0}")]
    InvalidChord(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Shortcut not found: {0}")]
    NotFound(String),

    #[error("{chord} is already bound to '{existing}'")]
    Conflict { chord: String, existing: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
    Tab,
    Backspace,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

impl Key {
    fn parse(token: &str) -> Option<Key> {
        let lower = token.to_ascii_lowercase();
        let key = match lower.as_str() {
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Esc,
            "tab" => Key::Tab,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "space" => Key::Char(' '),
            _ => {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => {
                        let n = lower.strip_prefix('f')?.parse::<u8>().ok()?;
                        if (1..=24).contains(&n) {
                            Key::F(n)
                        } else {
                            return None;
                        }
                    }
                }
            }
        };
        Some(key)
    }

    fn from_code(code: KeyCode) -> Option<Key> {
        let key = match code {
            KeyCode::Char(c) => Key::Char(c.to_ascii_lowercase()),
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Esc,
            KeyCode::Tab => Key::Tab,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::F(n) => Key::F(n),
            _ => return None,
        };
        Some(key)
    }

    fn is_letter(&self) -> bool {
        matches!(self, Key::Char(c) if c.is_alphabetic())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(' ') => write!(f, "Space"),
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            Key::Up => write!(f, "Up"),
            Key::Down => write!(f, "Down"),
            Key::Left => write!(f, "Left"),
            Key::Right => write!(f, "Right"),
            Key::Enter => write!(f, "Enter"),
            Key::Esc => write!(f, "Esc"),
            Key::Tab => write!(f, "Tab"),
            Key::Backspace => write!(f, "Backspace"),
            Key::Delete => write!(f, "Delete"),
            Key::Home => write!(f, "Home"),
            Key::End => write!(f, "End"),
            Key::PageUp => write!(f, "PageUp"),
            Key::PageDown => write!(f, "PageDown"),
            Key::F(n) => write!(f, "F{}", n),
        }
    }
}

/// A key plus the exact set of modifiers that must be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyChord {
    pub key: Key,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn from_event(event: &KeyEvent) -> Option<Self> {
        let key = Key::from_code(event.code)?;
        let m = event.modifiers;
        Some(Self {
            key,
            ctrl: m.contains(KeyModifiers::CONTROL),
            alt: m.contains(KeyModifiers::ALT),
            shift: m.contains(KeyModifiers::SHIFT),
            meta: m.contains(KeyModifiers::SUPER) || m.contains(KeyModifiers::META),
        })
    }

    /// Key and every modifier flag must agree. Shift is only compared for
    /// letters and named keys; terminals already fold it into symbols.
    pub fn matches(&self, pressed: &KeyChord) -> bool {
        if self.key != pressed.key {
            return false;
        }
        let shift_relevant = !matches!(self.key, Key::Char(_)) || self.key.is_letter();
        self.ctrl == pressed.ctrl
            && self.alt == pressed.alt
            && self.meta == pressed.meta
            && (!shift_relevant || self.shift == pressed.shift)
    }
}

impl FromStr for KeyChord {
    type Err = ShortcutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ShortcutError::InvalidChord(s.to_string()));
        }

        // "Alt++" binds the plus key itself
        let (mods, key_token) = if trimmed == "+" {
            ("", "+")
        } else if let Some(prefix) = trimmed.strip_suffix("++") {
            (prefix, "+")
        } else {
            match trimmed.rsplit_once('+') {
                Some((prefix, key)) => (prefix, key),
                None => ("", trimmed),
            }
        };

        let key = Key::parse(key_token.trim())
            .ok_or_else(|| ShortcutError::InvalidChord(s.to_string()))?;
        let mut chord = KeyChord::new(key);

        for m in mods.split('+').map(str::trim).filter(|m| !m.is_empty()) {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "alt" | "option" => chord.alt = true,
                "shift" => chord.shift = true,
                "meta" | "cmd" | "super" => chord.meta = true,
                _ => return Err(ShortcutError::InvalidChord(s.to_string())),
            }
        }

        Ok(chord)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        if self.meta {
            write!(f, "Meta+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl TryFrom<String> for KeyChord {
    type Error = ShortcutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyChord> for String {
    fn from(chord: KeyChord) -> Self {
        chord.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    NextWorktree,
    PreviousWorktree,
    NextProject,
    PreviousProject,
    WorktreeByNumber(u8),
    ShowHelp,
    NewTerminal,
    CloseTerminal,
    NextTerminal,
    PreviousTerminal,
    ToggleChanges,
    ToggleFocus,
    Quit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NextWorktree => write!(f, "next-worktree"),
            Action::PreviousWorktree => write!(f, "previous-worktree"),
            Action::NextProject => write!(f, "next-project"),
            Action::PreviousProject => write!(f, "previous-project"),
            Action::WorktreeByNumber(n) => write!(f, "worktree-by-number:{}", n),
            Action::ShowHelp => write!(f, "show-help"),
            Action::NewTerminal => write!(f, "new-terminal"),
            Action::CloseTerminal => write!(f, "close-terminal"),
            Action::NextTerminal => write!(f, "next-terminal"),
            Action::PreviousTerminal => write!(f, "previous-terminal"),
            Action::ToggleChanges => write!(f, "toggle-changes"),
            Action::ToggleFocus => write!(f, "toggle-focus"),
            Action::Quit => write!(f, "quit"),
        }
    }
}

impl FromStr for Action {
    type Err = ShortcutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "next-worktree" => Action::NextWorktree,
            "previous-worktree" => Action::PreviousWorktree,
            "next-project" => Action::NextProject,
            "previous-project" => Action::PreviousProject,
            "show-help" => Action::ShowHelp,
            "new-terminal" => Action::NewTerminal,
            "close-terminal" => Action::CloseTerminal,
            "next-terminal" => Action::NextTerminal,
            "previous-terminal" => Action::PreviousTerminal,
            "toggle-changes" => Action::ToggleChanges,
            "toggle-focus" => Action::ToggleFocus,
            "quit" => Action::Quit,
            other => {
                let n = other
                    .strip_prefix("worktree-by-number:")
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|n| (1..=9).contains(n))
                    .ok_or_else(|| ShortcutError::UnknownAction(s.to_string()))?;
                Action::WorktreeByNumber(n)
            }
        };
        Ok(action)
    }
}

impl TryFrom<String> for Action {
    type Error = ShortcutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub id: String,
    pub chord: KeyChord,
    pub description: String,
    pub action: Action,
}

impl Shortcut {
    fn new(id: &str, chord: KeyChord, description: &str, action: Action) -> Self {
        Self {
            id: id.to_string(),
            chord,
            description: description.to_string(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutSet {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_shortcuts")]
    pub shortcuts: Vec<Shortcut>,
}

fn default_enabled() -> bool {
    true
}

pub fn default_shortcuts() -> Vec<Shortcut> {
    let mut shortcuts = vec![
        Shortcut::new(
            "next-worktree",
            KeyChord::new(Key::Right).ctrl(),
            "Next worktree",
            Action::NextWorktree,
        ),
        Shortcut::new(
            "previous-worktree",
            KeyChord::new(Key::Left).ctrl(),
            "Previous worktree",
            Action::PreviousWorktree,
        ),
        Shortcut::new(
            "next-project",
            KeyChord::new(Key::Down).ctrl(),
            "Next project",
            Action::NextProject,
        ),
        Shortcut::new(
            "previous-project",
            KeyChord::new(Key::Up).ctrl(),
            "Previous project",
            Action::PreviousProject,
        ),
    ];

    for n in 1..=9u8 {
        let digit = char::from(b'0' + n);
        shortcuts.push(Shortcut {
            id: format!("worktree-{}", n),
            chord: KeyChord::new(Key::Char(digit)).alt(),
            description: format!("Go to worktree {}", n),
            action: Action::WorktreeByNumber(n),
        });
    }

    shortcuts.extend([
        Shortcut::new("show-help", KeyChord::new(Key::F(1)), "Show shortcuts", Action::ShowHelp),
        Shortcut::new(
            "new-terminal",
            KeyChord::new(Key::Char('t')).alt(),
            "New terminal",
            Action::NewTerminal,
        ),
        Shortcut::new(
            "close-terminal",
            KeyChord::new(Key::Char('w')).alt(),
            "Close terminal",
            Action::CloseTerminal,
        ),
        Shortcut::new(
            "next-terminal",
            KeyChord::new(Key::Char(']')).alt(),
            "Next terminal",
            Action::NextTerminal,
        ),
        Shortcut::new(
            "previous-terminal",
            KeyChord::new(Key::Char('[')).alt(),
            "Previous terminal",
            Action::PreviousTerminal,
        ),
        Shortcut::new(
            "toggle-changes",
            KeyChord::new(Key::Char('g')).alt(),
            "Toggle changes panel",
            Action::ToggleChanges,
        ),
        Shortcut::new(
            "toggle-focus",
            KeyChord::new(Key::Enter).alt(),
            "Toggle sidebar / terminal focus",
            Action::ToggleFocus,
        ),
        Shortcut::new("quit", KeyChord::new(Key::Char('q')).ctrl(), "Quit", Action::Quit),
    ]);

    shortcuts
}

impl Default for ShortcutSet {
    fn default() -> Self {
        Self {
            enabled: true,
            shortcuts: default_shortcuts(),
        }
    }
}

impl ShortcutSet {
    pub fn get(&self, id: &str) -> Option<&Shortcut> {
        self.shortcuts.iter().find(|s| s.id == id)
    }

    /// Look up the shortcut for a pressed chord. A disabled set resolves nothing.
    pub fn resolve(&self, pressed: &KeyChord) -> Option<&Shortcut> {
        if !self.enabled {
            return None;
        }
        self.shortcuts.iter().find(|s| s.chord.matches(pressed))
    }

    pub fn update(&mut self, id: &str, chord: KeyChord) -> Result<(), ShortcutError> {
        if let Some(existing) = self
            .shortcuts
            .iter()
            .find(|s| s.id != id && (s.chord.matches(&chord) || chord.matches(&s.chord)))
        {
            return Err(ShortcutError::Conflict {
                chord: chord.to_string(),
                existing: existing.id.clone(),
            });
        }

        let shortcut = self
            .shortcuts
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ShortcutError::NotFound(id.to_string()))?;
        shortcut.chord = chord;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn reset(&mut self) {
        *self = ShortcutSet::default();
    }
}
