use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::shortcut::{Action, KeyChord, ShortcutSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusArea {
    Sidebar,
    Terminal,
}

impl FocusArea {
    pub fn toggle(self) -> Self {
        match self {
            FocusArea::Sidebar => FocusArea::Terminal,
            FocusArea::Terminal => FocusArea::Sidebar,
        }
    }
}

/// UI state that decides how a key press is routed.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext {
    pub focus: FocusArea,
    pub prompt_open: bool,
    pub help_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A shortcut matched.
    Action(Action),
    CloseHelp,
    /// Bytes to write to the focused pty.
    Forward(Vec<u8>),
    /// The key belongs to an open prompt.
    Prompt,
    /// Left for the focused pane's own key handling.
    Unhandled,
    Ignored,
}

pub struct ShortcutDispatcher<'a> {
    shortcuts: &'a ShortcutSet,
}

impl<'a> ShortcutDispatcher<'a> {
    pub fn new(shortcuts: &'a ShortcutSet) -> Self {
        Self { shortcuts }
    }

    pub fn dispatch(&self, key: &KeyEvent, ctx: DispatchContext) -> Dispatch {
        if ctx.prompt_open {
            return Dispatch::Prompt;
        }

        if ctx.help_visible && key.code == KeyCode::Esc {
            return Dispatch::CloseHelp;
        }

        if let Some(shortcut) = KeyChord::from_event(key).and_then(|c| self.shortcuts.resolve(&c)) {
            tracing::debug!("Shortcut matched: {} ({})", shortcut.id, shortcut.chord);
            return Dispatch::Action(shortcut.action);
        }

        if ctx.help_visible {
            return Dispatch::Ignored;
        }

        match ctx.focus {
            FocusArea::Terminal => match key_to_bytes(key) {
                Some(bytes) => Dispatch::Forward(bytes),
                None => Dispatch::Ignored,
            },
            FocusArea::Sidebar => Dispatch::Unhandled,
        }
    }
}

/// Encode a key press the way an xterm-compatible terminal would send it.
pub fn key_to_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    let mut bytes = match key.code {
        KeyCode::Char(c) if ctrl => {
            let lower = c.to_ascii_lowercase();
            match lower {
                'a'..='z' => vec![(lower as u8) - b'a' + 1],
                '@' | ' ' => vec![0],
                '[' => vec![0x1b],
                '\\' => vec![0x1c],
                ']' => vec![0x1d],
                '^' => vec![0x1e],
                '_' => vec![0x1f],
                _ => return None,
            }
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => cursor_key(b'A', key.modifiers),
        KeyCode::Down => cursor_key(b'B', key.modifiers),
        KeyCode::Right => cursor_key(b'C', key.modifiers),
        KeyCode::Left => cursor_key(b'D', key.modifiers),
        KeyCode::Home => cursor_key(b'H', key.modifiers),
        KeyCode::End => cursor_key(b'F', key.modifiers),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::F(n) => function_key(n)?,
        _ => return None,
    };

    // Alt prefixes ESC, except for sequences that already carry modifiers
    if alt && matches!(key.code, KeyCode::Char(_) | KeyCode::Enter | KeyCode::Backspace) {
        bytes.insert(0, 0x1b);
    }

    Some(bytes)
}

fn cursor_key(final_byte: u8, modifiers: KeyModifiers) -> Vec<u8> {
    let mut param = 1u8;
    if modifiers.contains(KeyModifiers::SHIFT) {
        param += 1;
    }
    if modifiers.contains(KeyModifiers::ALT) {
        param += 2;
    }
    if modifiers.contains(KeyModifiers::CONTROL) {
        param += 4;
    }

    if param == 1 {
        vec![0x1b, b'[', final_byte]
    } else {
        format!("\x1b[1;{}{}", param, final_byte as char).into_bytes()
    }
}

fn function_key(n: u8) -> Option<Vec<u8>> {
    let seq: &[u8] = match n {
        1 => b"\x1bOP",
        2 => b"\x1bOQ",
        3 => b"\x1bOR",
        4 => b"\x1bOS",
        5 => b"\x1b[15~",
        6 => b"\x1b[17~",
        7 => b"\x1b[18~",
        8 => b"\x1b[19~",
        9 => b"\x1b[20~",
        10 => b"\x1b[21~",
        11 => b"\x1b[23~",
        12 => b"\x1b[24~",
        _ => return None,
    };
    Some(seq.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(focus: FocusArea) -> DispatchContext {
        DispatchContext {
            focus,
            prompt_open: false,
            help_visible: false,
        }
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn shortcut_is_intercepted_in_terminal() {
        let set = ShortcutSet::default();
        let dispatcher = ShortcutDispatcher::new(&set);
        assert_eq!(
            dispatcher.dispatch(&key(KeyCode::Right, KeyModifiers::CONTROL), ctx(FocusArea::Terminal)),
            Dispatch::Action(Action::NextWorktree)
        );
    }

    #[test]
    fn plain_key_is_forwarded_in_terminal() {
        let set = ShortcutSet::default();
        let dispatcher = ShortcutDispatcher::new(&set);
        assert_eq!(
            dispatcher.dispatch(&key(KeyCode::Char('l'), KeyModifiers::NONE), ctx(FocusArea::Terminal)),
            Dispatch::Forward(b"l".to_vec())
        );
    }

    #[test]
    fn plain_key_is_unhandled_in_sidebar() {
        let set = ShortcutSet::default();
        let dispatcher = ShortcutDispatcher::new(&set);
        assert_eq!(
            dispatcher.dispatch(&key(KeyCode::Down, KeyModifiers::NONE), ctx(FocusArea::Sidebar)),
            Dispatch::Unhandled
        );
    }

    #[test]
    fn prompt_blocks_shortcuts() {
        let set = ShortcutSet::default();
        let dispatcher = ShortcutDispatcher::new(&set);
        let context = DispatchContext {
            prompt_open: true,
            ..ctx(FocusArea::Terminal)
        };
        assert_eq!(
            dispatcher.dispatch(&key(KeyCode::Char('q'), KeyModifiers::CONTROL), context),
            Dispatch::Prompt,
            "dispatch: an open prompt should swallow shortcuts"
        );
    }

    #[test]
    fn escape_closes_help() {
        let set = ShortcutSet::default();
        let dispatcher = ShortcutDispatcher::new(&set);
        let context = DispatchContext {
            help_visible: true,
            ..ctx(FocusArea::Terminal)
        };
        assert_eq!(
            dispatcher.dispatch(&key(KeyCode::Esc, KeyModifiers::NONE), context),
            Dispatch::CloseHelp
        );
        assert_eq!(
            dispatcher.dispatch(&key(KeyCode::Char('x'), KeyModifiers::NONE), context),
            Dispatch::Ignored,
            "dispatch: help overlay should not forward keys to the pty"
        );
    }

    #[test]
    fn disabled_set_forwards_everything() {
        let mut set = ShortcutSet::default();
        set.set_enabled(false);
        let dispatcher = ShortcutDispatcher::new(&set);
        assert_eq!(
            dispatcher.dispatch(&key(KeyCode::Char('q'), KeyModifiers::CONTROL), ctx(FocusArea::Terminal)),
            Dispatch::Forward(vec![0x11])
        );
    }

    #[test]
    fn key_to_bytes_control_characters() {
        assert_eq!(
            key_to_bytes(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(vec![0x03])
        );
        assert_eq!(key_to_bytes(&key(KeyCode::Enter, KeyModifiers::NONE)), Some(vec![b'\r']));
        assert_eq!(key_to_bytes(&key(KeyCode::Backspace, KeyModifiers::NONE)), Some(vec![0x7f]));
    }

    #[test]
    fn key_to_bytes_alt_prefixes_escape() {
        assert_eq!(
            key_to_bytes(&key(KeyCode::Char('b'), KeyModifiers::ALT)),
            Some(vec![0x1b, b'b'])
        );
    }

    #[test]
    fn key_to_bytes_arrows_with_modifiers() {
        assert_eq!(
            key_to_bytes(&key(KeyCode::Up, KeyModifiers::NONE)),
            Some(b"\x1b[A".to_vec())
        );
        assert_eq!(
            key_to_bytes(&key(KeyCode::Right, KeyModifiers::CONTROL)),
            Some(b"\x1b[1;5C".to_vec())
        );
    }

    #[test]
    fn key_to_bytes_utf8() {
        assert_eq!(
            key_to_bytes(&key(KeyCode::Char('é'), KeyModifiers::NONE)),
            Some("é".as_bytes().to_vec())
        );
    }

    #[test]
    fn focus_toggle() {
        assert_eq!(FocusArea::Sidebar.toggle(), FocusArea::Terminal);
        assert_eq!(FocusArea::Terminal.toggle(), FocusArea::Sidebar);
    }
}
