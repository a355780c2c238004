pub mod server;

pub use server::{LoggingConfig, ServerCommand};

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the model gateway server
    Server(ServerCommand),
}
