//! CLI command definitions
//!
//! Defines the clap commands for the smoke CLI.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize configured clients and report which ones connect
    Check {
        /// Only check these clients (repeatable); default is every client
        #[arg(long = "client", short = 'c')]
        clients: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured clients
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
