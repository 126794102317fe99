//! Side-effecting operations: model calls, processes and the filesystem.

pub mod artifacts;
pub mod checks;
pub mod config;
pub mod llm;
pub mod process;
pub mod prompt;
pub mod report;
pub mod sandbox;
pub mod transcript;
