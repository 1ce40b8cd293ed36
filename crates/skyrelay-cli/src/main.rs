//! `skyrelay`: offline management of the relay store and configuration.

use anyhow::Context;
use clap::{Parser, Subcommand};
use skyrelay_bridge::{BridgeConfig, FileRelayStore, RelayRegistry};
use skyrelay_core::Relay;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyrelay", about = "Skyrelay: IRC <-> Skype relay bridge")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "skyrelay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage relays between local channels and remote chats
    Relay {
        #[command(subcommand)]
        action: RelayAction,
    },
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum RelayAction {
    /// List configured relays
    List {
        /// Print the relays as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Link a local channel to a remote chat
    Add {
        network: String,
        channel: String,
        /// Remote chat id, e.g. 19:abc@thread.skype
        room: String,
    },
    /// Remove a relay
    Remove {
        network: String,
        channel: String,
        room: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load the config and report credentials and store location
    Check,
}

/// Reads the config file, falling back to defaults when it does not exist,
/// and applies environment overrides.
fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    let mut config = if path.exists() {
        BridgeConfig::from_file(path)?
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults");
        BridgeConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}

fn open_registry(config: &BridgeConfig) -> RelayRegistry {
    RelayRegistry::new(Arc::new(FileRelayStore::new(config.relays_path())))
}

fn relay_lines(registry: &RelayRegistry, json: bool) -> anyhow::Result<Vec<String>> {
    let relays = registry.list()?;
    if json {
        return Ok(vec![serde_json::to_string_pretty(relays.as_slice())?]);
    }
    if relays.is_empty() {
        return Ok(vec!["There are currently no configured relays.".to_string()]);
    }
    Ok(relays.iter().map(ToString::to_string).collect())
}

fn config_report(config: &BridgeConfig) -> Vec<String> {
    let credentials = if config.credentials().pair().is_some() {
        "present"
    } else {
        "missing"
    };
    vec![
        format!("Credentials: {credentials}"),
        format!("Relay store: {}", config.relays_path().display()),
        format!("Retry backoff: {}s", config.retry_backoff_secs),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config '{}'", cli.config.display()))?;

    match cli.command {
        Commands::Relay { action } => {
            let registry = open_registry(&config);
            match action {
                RelayAction::List { json } => {
                    for line in relay_lines(&registry, json)? {
                        println!("{line}");
                    }
                }
                RelayAction::Add {
                    network,
                    channel,
                    room,
                } => {
                    let relay = Relay::new(network, channel, room);
                    registry.add(relay.clone())?;
                    info!(relay = %relay, "Relay stored");
                    println!("The operation succeeded.");
                }
                RelayAction::Remove {
                    network,
                    channel,
                    room,
                } => {
                    registry.remove(&Relay::new(network, channel, room))?;
                    println!("The operation succeeded.");
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Check => {
                for line in config_report(&config) {
                    println!("{line}");
                }
            }
        },
    }

    Ok(())
}
