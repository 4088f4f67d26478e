//! Output folder inventory command

use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::commands::command_traits::Command;
use crate::errors::{TilerError, TilerResult};
use crate::tiling::Inventory;

/// Command that counts the tiles of an output folder
pub struct InventoryCommand {
    folder: PathBuf,
}

impl InventoryCommand {
    pub fn new(args: &ArgMatches) -> TilerResult<Self> {
        let folder = args
            .get_one::<String>("inventory")
            .ok_or_else(|| TilerError::GenericError("Missing inventory folder".to_string()))?;
        Ok(InventoryCommand { folder: PathBuf::from(folder) })
    }
}

impl Command for InventoryCommand {
    fn execute(&self) -> TilerResult<()> {
        info!("Scanning {}", self.folder.display());
        let inventory = Inventory::scan(&self.folder)?;
        print!("{}", inventory);
        Ok(())
    }
}
