//! Collection CLI commands.

use clap::Subcommand;
use tilechanges::ChangesetService;

use crate::error::CliError;

/// Collection subcommands.
#[derive(Debug, Subcommand)]
pub enum CollectionCommands {
    /// List collections with recorded checkpoints
    List,

    /// Remove a collection and all of its checkpoints
    Remove {
        /// Collection id
        collection: String,
    },
}

/// Run a collection subcommand.
pub fn run(service: &ChangesetService, command: CollectionCommands) -> Result<(), CliError> {
    match command {
        CollectionCommands::List => {
            let collections = service.collections();
            if collections.is_empty() {
                println!("No collections");
            }
            for collection in collections {
                println!("{}", collection);
            }
            Ok(())
        }
        CollectionCommands::Remove { collection } => {
            if service.remove_collection(&collection)? {
                println!("Removed {}", collection);
            } else {
                println!("{} was not registered", collection);
            }
            Ok(())
        }
    }
}
