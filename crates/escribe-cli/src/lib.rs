// Library interface for escribe-cli
// This allows integration tests to access internal modules

// commands.rs is also declared in main.rs, so point at the same source file
// to avoid "file loaded multiple times" errors.

#[path = "commands.rs"]
pub mod commands;

pub use commands::{handle_command, CommandResult};
