//! CLI command handling
//!
//! Runs commands against the configured clients and formats output.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use futures_util::future::join_all;
use serde::Serialize;

use crate::client::{ClientRegistry, ServiceClient};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};

/// Outcome of initializing one client
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub kind: String,
    pub ok: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Load configuration from `path` or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Check { clients, json } => {
            let registry = config.registry();
            let names = if clients.is_empty() {
                config.client_names().into_iter().map(str::to_string).collect()
            } else {
                clients
            };
            if names.is_empty() {
                return Err(Error::Config(
                    "no clients configured; add [clients.<name>] tables to the config file"
                        .to_string(),
                ));
            }

            let results = check(&registry, &names).await;
            // Teardown failures are logged by the registry
            registry.teardown().await;

            print_check(&results, json)?;

            let failed = results.iter().filter(|r| !r.ok).count();
            if failed > 0 {
                return Err(Error::Internal(format!(
                    "{failed} of {} clients failed to initialize",
                    results.len()
                )));
            }
            Ok(())
        }

        Commands::List { json } => {
            if json {
                let entries: Vec<_> = config
                    .client_names()
                    .into_iter()
                    .filter_map(|name| config.get_client(name).map(|d| (name, d)))
                    .map(|(name, definition)| {
                        serde_json::json!({
                            "name": name,
                            "kind": definition.kind,
                            "keys": definition.config.keys().collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if config.clients.is_empty() {
                println!("No clients configured.");
            } else {
                for name in config.client_names() {
                    if let Some(definition) = config.get_client(name) {
                        println!("  {:20} {}", name, definition.kind);
                    }
                }
            }
            Ok(())
        }
    }
}

/// Initialize the named clients concurrently
pub async fn check(registry: &ClientRegistry, names: &[String]) -> Vec<CheckResult> {
    join_all(names.iter().map(|name| check_one(registry, name))).await
}

async fn check_one(registry: &ClientRegistry, name: &str) -> CheckResult {
    let started = Instant::now();
    let mut kind = registry.definition(name).map(|d| d.kind.to_string());
    let outcome: Result<Arc<dyn ServiceClient>> = match registry.get(name).await {
        Ok(client) => {
            kind = Some(client.kind().to_string());
            client.init().await.map(|()| client)
        }
        Err(e) => Err(e),
    };
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let kind = kind.unwrap_or_else(|| "unknown".to_string());

    let error = match outcome {
        Ok(_) => {
            tracing::info!(client = name, elapsed_ms, "initialized");
            None
        }
        Err(e) => {
            tracing::debug!(client = name, error = %e, "check failed");
            Some(e.to_string())
        }
    };

    CheckResult {
        name: name.to_string(),
        kind,
        ok: error.is_none(),
        elapsed_ms,
        error,
    }
}

fn print_check(results: &[CheckResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for result in results {
        let elapsed = format!("{:?}", Duration::from_millis(result.elapsed_ms));
        if result.ok {
            println!(
                "{} {:20} {:10} {}",
                "✓".green(),
                result.name,
                result.kind,
                elapsed.dimmed()
            );
        } else {
            println!("{} {:20} {:10} {}", "✗".red(), result.name, result.kind, elapsed.dimmed());
            if let Some(error) = &result.error {
                println!("    {}", error.red());
            }
        }
    }

    let passed = results.iter().filter(|r| r.ok).count();
    let summary = format!("{passed}/{} clients initialized", results.len());
    if passed == results.len() {
        println!("\n{}", summary.green().bold());
    } else {
        println!("\n{}", summary.red().bold());
    }
    Ok(())
}
