pub mod common;
pub mod config;
pub mod deck;
pub mod git;
pub mod open;
pub mod project;
pub mod shortcuts;
pub mod worktree;
