mod environment;
mod manager;
mod output;
mod pty;
mod registry;

pub use environment::EnvironmentInfo;
pub use manager::TerminalManager;
pub use output::TerminalExit;
pub use registry::{RegistryError, SessionRegistry};
