// Store selection
// Configuration is via RELAY_STORE env var: "redis" (default) or "memory".

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::traits::RelayStore;

use crate::memory::MemoryRelayStore;
use crate::redis_store::RedisRelayStore;

/// Which relay store backs this process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreMode {
    /// Shared Redis deployment (default)
    #[default]
    Redis,
    /// Process-local memory, for tests and single-process development
    Memory,
}

impl std::str::FromStr for StoreMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" | "" => Ok(StoreMode::Redis),
            "memory" | "inmemory" | "in-memory" => Ok(StoreMode::Memory),
            _ => anyhow::bail!("Unknown store mode: {}. Use 'redis' or 'memory'", s),
        }
    }
}

/// Configuration for the relay store connection
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub mode: StoreMode,
    /// Redis connection URL (only used in redis mode)
    pub redis_url: Option<String>,
    /// Per-operation timeout budget
    pub op_timeout: Duration,
}

impl StoreConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mode = std::env::var("RELAY_STORE").unwrap_or_default().parse()?;
        let redis_url = std::env::var("REDIS_URL").ok();
        Ok(Self {
            mode,
            redis_url,
            op_timeout: Duration::from_secs(5),
        })
    }

    /// Get the Redis URL with default
    pub fn redis_url(&self) -> String {
        self.redis_url
            .clone()
            .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string())
    }
}

/// Create the relay store for this process based on configuration
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn RelayStore>> {
    match config.mode {
        StoreMode::Redis => {
            let store = RedisRelayStore::from_url(&config.redis_url())
                .await?
                .with_op_timeout(config.op_timeout);
            Ok(Arc::new(store))
        }
        StoreMode::Memory => Ok(Arc::new(MemoryRelayStore::new())),
    }
}
