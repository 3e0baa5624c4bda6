//! chatrelay - rate-shaped streaming chat relay
//!
//! Relays chat completions from a rotating pool of OpenAI-compatible
//! providers to browsers as a steadily paced event stream.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay::config::{Config, KeySource};
use chatrelay::proxy::{run_server, Pacing};

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Rate-shaped streaming chat relay with provider key rotation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show the provider pool and where each key comes from
    Providers {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

fn log_key_sources(key_sources: &[(String, KeySource)]) {
    for (name, source) in key_sources {
        match source {
            KeySource::None => tracing::warn!(provider = %name, "No API key available"),
            _ => tracing::info!(provider = %name, source = %source, "API key loaded"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatrelay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = %config, "Loading configuration");
            let (mut config, key_sources) = Config::load_or_default(&config)?;
            log_key_sources(&key_sources);

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config: path } => {
            let (config, key_sources) = Config::from_file_with_env(&path)?;
            let keyed = key_sources
                .iter()
                .filter(|(_, source)| *source != KeySource::None)
                .count();
            let pacing = Pacing::from(&config.pacing);

            println!("Configuration OK: {}", path);
            println!("  listen:    {}", config.server.listen);
            println!(
                "  providers: {} ({} with keys)",
                config.providers.len(),
                keyed
            );
            println!(
                "  pacing:    {} chars every {} ms",
                pacing.slice_chars(),
                pacing.interval().as_millis()
            );
            println!(
                "  storage:   {}",
                config
                    .storage
                    .as_ref()
                    .map(|s| s.base_url.as_str())
                    .unwrap_or("in-memory")
            );
            Ok(())
        }

        Commands::Providers { config } => {
            let (config, key_sources) = Config::load_or_default(&config)?;

            println!(
                "{:<16} {:<12} {:<40} KEY",
                "NAME", "VENDOR", "MODEL"
            );
            for (provider, (_, source)) in config.providers.iter().zip(&key_sources) {
                println!(
                    "{:<16} {:<12} {:<40} {}",
                    provider.name, provider.vendor, provider.model, source
                );
            }
            Ok(())
        }
    }
}
