//! ethrpc-watch - follows the chain head of an Ethereum node.
//!
//! Connects to the endpoint given as the first argument (or `ETHRPC_URL`),
//! subscribes to new block headers and logs each one until interrupted.

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ethrpc::Eth;

const DEFAULT_URL: &str = "ws://127.0.0.1:8546";

fn endpoint() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ETHRPC_URL").ok())
        .unwrap_or_else(|| DEFAULT_URL.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ethrpc=info,ethrpc_watch=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!("Starting ethrpc-watch v{}", env!("CARGO_PKG_VERSION"));

    let url = endpoint();
    if !url.starts_with("ws") {
        bail!("{} does not support subscriptions, use a ws:// or wss:// endpoint", url);
    }

    let eth = Eth::connect(&url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    let version = eth.version().await.context("Failed to query client version")?;
    let peers = eth.peer_count().await.context("Failed to query peer count")?;
    tracing::info!("{} ({} peers)", version, peers);

    let mut heads = eth
        .new_heads_subscription()
        .await
        .context("Failed to subscribe to new heads")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            header = heads.recv() => match header {
                Some(Ok(header)) => {
                    let number = header.number_u64().unwrap_or_default();
                    tracing::info!(
                        "Block {} {} ({} gas used)",
                        number,
                        header.hash,
                        header.gas_used
                    );
                }
                Some(Err(e)) => tracing::warn!("Skipping undecodable header: {}", e),
                None => {
                    tracing::error!("Subscription closed by the connection");
                    break;
                }
            }
        }
    }

    eth.unsubscribe(heads.id());
    eth.stop();
    tracing::info!("ethrpc-watch exited cleanly");
    Ok(())
}
