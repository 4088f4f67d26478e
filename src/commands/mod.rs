//! CLI command implementations
//!
//! This module contains implementations of various commands
//! supported by the CLI application using the Command pattern.

pub mod command_traits;
pub mod inventory_command;
pub mod tile_command;

pub use command_traits::{Command, CommandFactory};
pub use inventory_command::InventoryCommand;
pub use tile_command::TileCommand;

use clap::ArgMatches;

use crate::errors::TilerResult;
use crate::utils::logger::Logger;

/// Factory for creating command instances based on CLI arguments
///
/// This factory examines the command-line arguments and creates
/// the appropriate command instance for execution.
pub struct OrthotilerCommandFactory;

impl OrthotilerCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        OrthotilerCommandFactory
    }
}

impl Default for OrthotilerCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CommandFactory<'a> for OrthotilerCommandFactory {
    fn create_command(&self, args: &ArgMatches, run_log: &'a Logger) -> TilerResult<Box<dyn Command + 'a>> {
        if args.get_one::<String>("inventory").is_some() {
            Ok(Box::new(InventoryCommand::new(args)?))
        } else {
            // Default to the tiling command
            Ok(Box::new(TileCommand::new(args, run_log)?))
        }
    }
}
