//! Star node - the server entry point.
//!
//! Architecture:
//! - Single process with one shared RocksDB store
//! - HTTP API for reads, claims and stats
//! - WebSocket stream of committed changes

use crate::api;
use crate::error::{Error, Result};
use starbazaar_field::{generate, FieldSpec};
use starbazaar_store::{RecordStore, RocksStore};
use starbazaar_sync::ClaimCoordinator;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Configuration for a star node.
#[derive(Debug, Clone)]
pub struct StarConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Field generated when the store starts empty
    pub field: FieldSpec,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./star-data"),
            api_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            field: FieldSpec::default(),
        }
    }
}

impl StarConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let data_dir = std::env::var("STAR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Ok(Self {
            data_dir,
            api_addr: env_or("STAR_API_ADDR", defaults.api_addr)?,
            field: FieldSpec {
                count: env_or("STAR_SEED_COUNT", defaults.field.count)?,
                radius: env_radius("STAR_FIELD_RADIUS", defaults.field.radius)?,
                seed: env_or("STAR_SEED", defaults.field.seed)?,
            },
        })
    }
}

fn env_or<T>(key: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| Error::Config {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Field radius: a finite, non-negative length.
fn env_radius(key: &'static str, default: f64) -> Result<f64> {
    let radius: f64 = env_or(key, default)?;
    if !radius.is_finite() || radius < 0.0 {
        return Err(Error::Config {
            key,
            reason: format!("radius must be a finite non-negative number, got {}", radius),
        });
    }
    Ok(radius)
}

/// Shared state for the API handlers.
pub struct StarState {
    pub store: Arc<dyn RecordStore>,
    pub coordinator: ClaimCoordinator,
}

impl StarState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            coordinator: ClaimCoordinator::new(store.clone()),
            store,
        }
    }
}

/// A star node instance.
pub struct StarNode {
    state: Arc<StarState>,
    config: StarConfig,
}

impl StarNode {
    /// Open storage, seeding the field on first start.
    pub async fn new(config: StarConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let store = RocksStore::open(&config.data_dir)?;
        if store.is_empty()? {
            let seeded = store.seed(generate(&config.field))?;
            info!("Seeded empty store with {} stars", seeded);
        }

        Ok(Self {
            state: Arc::new(StarState::new(Arc::new(store))),
            config,
        })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<StarState> {
        Arc::clone(&self.state)
    }

    /// Run the HTTP server until it fails.
    pub async fn run(self) -> Result<()> {
        info!("Star node starting");
        info!("  API: http://{}", self.config.api_addr);
        info!("  Data: {:?}", self.config.data_dir);

        let app = api::build_router(self.state());

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
