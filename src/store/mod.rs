mod file;
mod projects;

pub use file::ProjectStore;
pub use projects::{ProjectError, ProjectState};
