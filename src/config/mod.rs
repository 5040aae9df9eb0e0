mod loader;

pub use loader::{ensure_dir, AppSettings, Config};
