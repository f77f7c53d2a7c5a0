//! CLI layer: argument parsing and command execution

pub mod backup;
pub mod commands;
pub mod display;
pub mod replant;

pub use commands::CliArgs;
