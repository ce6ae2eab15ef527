//! CLI commands module.

mod config;
mod shell;
mod user;
mod util;

pub use config::ConfigCommand;
pub use shell::ShellCommand;
pub use user::{
    DeleteCommand, EnrollCommand, ListCommand, LoginCommand, RegisterCommand, StatusCommand,
    VerifyCommand,
};

// Re-export utils for use in commands
pub(crate) use util::*;
