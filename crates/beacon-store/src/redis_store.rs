// Redis-backed RelayStore implementation
//
// Every operation is wrapped in a timeout so a stuck store surfaces as
// StoreUnavailable instead of hanging a poll loop or a send batch. Key
// scans use SCAN, never KEYS.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;

use beacon_core::error::{BeaconError, Result};
use beacon_core::traits::RelayStore;

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis relay store
#[derive(Clone)]
pub struct RedisRelayStore {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisRelayStore {
    /// Connect to Redis at `url`
    pub async fn from_url(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BeaconError::config(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| BeaconError::store(e.to_string()))?;
        Ok(Self {
            manager,
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    /// Set the per-operation timeout budget
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BeaconError::store(e.to_string())),
            Err(_) => Err(BeaconError::store(format!(
                "operation timed out after {:?}",
                self.op_timeout
            ))),
        }
    }
}

#[async_trait]
impl RelayStore for RedisRelayStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        // SET EX rejects 0; a zero TTL still needs to create the key
        let secs = ttl.as_secs().max(1);
        self.bounded(async move { conn.set_ex::<_, _, ()>(key, value, secs).await })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn ttl_secs(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.manager.clone();
        let ttl: i64 = self
            .bounded(async move { redis::cmd("TTL").arg(key).query_async(&mut conn).await })
            .await?;
        // -2 = key absent; -1 = no expiry, which the sweep treats as lapsed
        Ok(if ttl == -2 { None } else { Some(ttl) })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        // DEL of an absent key returns 0, which is still a success
        self.bounded(async move { conn.del::<_, i64>(key).await })
            .await?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}*");
        self.bounded(async move {
            let mut keys = Vec::new();
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            Ok(keys)
        })
        .await
    }

    async fn append(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.rpush::<_, _, i64>(key, value).await })
            .await?;
        Ok(())
    }

    async fn drain(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        // MULTI/EXEC closes the window between read and clear
        let (items, _removed): (Vec<String>, i64) = self
            .bounded(async move {
                redis::pipe()
                    .atomic()
                    .lrange(key, 0, -1)
                    .del(key)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(items)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.incr::<_, _, i64>(key, 1).await })
            .await
    }
}
