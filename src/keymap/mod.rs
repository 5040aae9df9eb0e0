mod dispatch;
mod shortcut;

pub use dispatch::{Dispatch, DispatchContext, FocusArea, ShortcutDispatcher};
pub use shortcut::{Action, Key, KeyChord, ShortcutSet};
