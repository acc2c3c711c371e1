//! Smoke-testing CLI
//!
//! Reads client definitions from a TOML config file and checks that every
//! configured service client can be initialized.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use smoke::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "smoke", about = "Service-client smoke checks")]
#[command(version, long_about = None)]
struct Cli {
    /// Config file (default: $SMOKE_HARNESS_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging for this crate
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write logs to a file (default location if no path is given)
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_file = cli.log_file.map(|path| {
        if path.as_os_str().is_empty() {
            logging::default_log_file().unwrap_or(path)
        } else {
            path
        }
    });
    let _guard = logging::init_cli(cli.verbose, log_file.as_deref());

    let result = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
