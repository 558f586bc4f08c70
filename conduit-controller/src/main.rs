//! Conduit Controller
//!
//! Drives pipeline invocations in one namespace: provisions their services,
//! runs their steps in order, and tears everything down on deletion.

use anyhow::{Context, Result};
use clap::Parser;
use conduit_client::{HttpResourceStore, ResourceStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conduit_controller::Config;
use conduit_controller::scheduler::ResyncLoop;

#[derive(Parser)]
#[command(name = "conduit-controller")]
#[command(about = "Conduit pipeline invocation controller", long_about = None)]
struct Cli {
    /// Resource store URL
    #[arg(long, env = "CONDUIT_STORE_URL", default_value = "http://localhost:8001")]
    store_url: String,

    /// Bearer token for the resource store
    #[arg(long, env = "CONDUIT_STORE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Namespace to reconcile
    #[arg(short, long, env = "CONDUIT_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Seconds between resync cycles
    #[arg(long, env = "CONDUIT_RESYNC_INTERVAL", default_value = "10")]
    resync_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conduit_controller=info,conduit_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Conduit Controller");

    let cli = Cli::parse();
    let config = Config {
        store_url: cli.store_url,
        token: cli.token,
        namespace: cli.namespace,
        resync_interval: Duration::from_secs(cli.resync_interval),
    };
    config.validate().context("Invalid configuration")?;

    info!(
        "Loaded configuration: store_url={}, namespace={}",
        config.store_url, config.namespace
    );

    let mut store = HttpResourceStore::new(config.store_url.clone());
    if let Some(token) = &config.token {
        store = store.with_token(token.clone());
    }
    let store: Arc<dyn ResourceStore> = Arc::new(store);

    let resync = ResyncLoop::new(config, store);

    tokio::select! {
        result = resync.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    }
}
