use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use slack_relay::app::ports::{InstanceStorePort, IntrospectionPort, MessagingPort};
use slack_relay::app::RelayService;
use slack_relay::config::{Config, StoreKind, DEFAULT_CONFIG_PATH};
use slack_relay::error::StartupError;
use slack_relay::infra::{CouchInstanceStore, HttpCredentialIntrospector, MemoryInstanceStore, SlackClient};
use slack_relay::translators::registry_for;
use slack_relay::{logging, metrics, server};

#[derive(Parser)]
#[command(name = "slack_relay")]
#[command(about = "Relays toolchain and pipeline events to Slack")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP relay server
    Serve {
        /// Path to the TOML configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load and validate the configuration, then print a summary
    CheckConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
}

fn create_store(config: &Config) -> Result<Arc<dyn InstanceStorePort>, StartupError> {
    match config.store.kind {
        StoreKind::Memory => {
            let store = match &config.store.seed_file {
                Some(path) => MemoryInstanceStore::from_seed_file(path)?,
                None => MemoryInstanceStore::new(),
            };
            info!("Using in-memory instance store with {} records", store.len());
            Ok(Arc::new(store))
        }
        StoreKind::Couchdb => {
            let url = config
                .store
                .url
                .as_deref()
                .ok_or_else(|| StartupError::Config("store.url is required for couchdb".to_string()))?;
            info!("Using CouchDB instance store database '{}'", config.store.database);
            Ok(Arc::new(CouchInstanceStore::new(
                url,
                &config.store.database,
                config.store.timeout(),
            )?))
        }
    }
}

fn build_relay(config: &Config) -> Result<Arc<RelayService>, StartupError> {
    let store = create_store(config)?;
    let introspection: Arc<dyn IntrospectionPort> = Arc::new(HttpCredentialIntrospector::new(
        &config.introspection.url,
        config.introspection.timeout(),
    )?);
    let messaging: Arc<dyn MessagingPort> =
        Arc::new(SlackClient::new(&config.slack.api_url, config.slack.timeout())?);

    let translators = registry_for(config.relay.forward_unknown_sources);
    info!("Translators registered for: {}", translators.sources().join(", "));

    Ok(Arc::new(RelayService::new(store, introspection, messaging, translators)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let mut config = Config::load(&config)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            let _guard = logging::init_logging(&config.server.log_dir);

            if config.metrics.enabled {
                metrics::init_metrics(config.metrics.port);
            }

            let relay = build_relay(&config)?;
            let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
            server::start_server(server::create_server(relay), addr).await?;
        }
        Commands::CheckConfig { config } => {
            let config = Config::load(&config)?;
            println!("Configuration OK");
            println!("   Listen:        {}:{}", config.server.bind, config.server.port);
            println!("   Store:         {:?}", config.store.kind);
            println!("   Introspection: {}", config.introspection.url);
            println!("   Slack API:     {}", config.slack.api_url);
            println!("   Unknown sources forwarded: {}", config.relay.forward_unknown_sources);
            if config.metrics.enabled {
                println!("   Metrics port:  {}", config.metrics.port);
            }
        }
    }
    Ok(())
}
