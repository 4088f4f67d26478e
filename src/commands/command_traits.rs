//! The seam between argument parsing and the work a subcommand does

use crate::errors::TilerResult;
use crate::utils::logger::Logger;

/// A parsed subcommand, ready to run
pub trait Command {
    /// `Ok` only when the whole run succeeded
    fn execute(&self) -> TilerResult<()>;
}

/// Turns clap matches into a [`Command`]
pub trait CommandFactory<'a> {
    /// Build the command for the chosen subcommand
    ///
    /// Commands that build tiles append their report to `run_log`.
    fn create_command(&self, args: &clap::ArgMatches, run_log: &'a Logger) -> TilerResult<Box<dyn Command + 'a>>;
}
