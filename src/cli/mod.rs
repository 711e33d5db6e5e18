//! CLI module for the release manager.
//!
//! This module provides the command-line interface for exporting,
//! importing and transferring releases.

mod commands;
mod output;

pub use self::commands::{BackendArgs, Cli, Commands, DeployArgs, OutputFormat, StateCommands};
pub use self::output::OutputFormatter;
