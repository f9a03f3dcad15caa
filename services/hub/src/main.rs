//! Telemetry hub entry point.

use clap::Parser;
use hub_channels::{ChannelRepo, ChannelStore};
use std::path::PathBuf;
use std::sync::Arc;
use telemetry_hub::{HubConfig, HubServer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind_address: String,

    /// Port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Channel snapshot file; omit to keep channels in memory only
    #[arg(long)]
    store: Option<PathBuf>,

    /// Enable CORS
    #[arg(long)]
    enable_cors: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_hub=info,hub_relay=info,hub_channels=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("starting telemetry hub");
    info!("version: {}", env!("CARGO_PKG_VERSION"));

    let config = if let Some(config_path) = &args.config {
        HubConfig::from_file(config_path).await?
    } else {
        HubConfig {
            bind_address: args.bind_address,
            port: args.port,
            store_path: args.store,
            enable_cors: args.enable_cors,
        }
    };

    info!("configuration loaded: {:?}", config);

    let repo: Arc<dyn ChannelRepo> = match &config.store_path {
        Some(path) => Arc::new(ChannelStore::open(path).await?),
        None => Arc::new(ChannelStore::in_memory()),
    };

    let server = HubServer::new(config, repo);

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("shutdown signal received");
    };

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("hub server error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown_signal => {
            info!("shutting down telemetry hub");
        }
    }

    Ok(())
}
