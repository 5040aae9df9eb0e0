mod app;
mod ui;
pub mod widgets;

pub use app::DeckApp;
