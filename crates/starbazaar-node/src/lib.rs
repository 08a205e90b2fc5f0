//! StarBazaar Node
//!
//! Serves one shared star store to many browsers.
//!
//! # Architecture
//!
//! - **Node**: configuration from the environment, RocksDB store, first-start seeding
//! - **API**: HTTP endpoints for reads, claims and aggregate stats
//! - **WebSocket**: committed changes pushed as JSON, one subscription per socket
//!
//! # Example
//!
//! ```no_run
//! use starbazaar_node::{StarConfig, StarNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let node = StarNode::new(StarConfig::from_env()?).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod node;
pub mod ws;

pub use error::{Error, Result};
pub use node::{StarConfig, StarNode, StarState};
