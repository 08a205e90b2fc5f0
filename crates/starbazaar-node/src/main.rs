//! Star node binary
//!
//! Serves the StarBazaar universe from a local RocksDB store.

use starbazaar_node::{StarConfig, StarNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "star_node=info,starbazaar=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting star node");

    let config = StarConfig::from_env()?;

    let node = StarNode::new(config).await?;
    node.run().await?;

    Ok(())
}
