mod changes_panel;
mod help_modal;
mod prompt;
mod sidebar;
mod terminal_view;

pub use changes_panel::ChangesPanel;
pub use help_modal::HelpModal;
pub use prompt::{Prompt, PromptKind};
pub use sidebar::{sidebar_rows, Sidebar, SidebarRow};
pub use terminal_view::TerminalView;
