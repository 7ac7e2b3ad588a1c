// Store facade trait
//
// The relay is the only shared mutable resource in the system; producer,
// consumer and reaper coordinate exclusively through it. Implementations:
// - Redis-backed for production (beacon-store)
// - In-memory for tests and local development (beacon-store)

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Thin typed facade over the shared key-value relay.
///
/// Contract, honored by every implementation:
/// - the only expected failure is `BeaconError::StoreUnavailable`
///   (transport/timeout); callers treat it as "assume no-op", never as
///   "key does not exist"
/// - no retries at this layer; retry policy belongs to callers
/// - deleting an absent key succeeds (producer and consumer both delete
///   after `complete`; the race stays benign only with this semantic)
/// - no cross-key transactions; every multi-key operation must tolerate
///   partial completion
#[async_trait]
pub trait RelayStore: Send + Sync {
    /// Write a value with an expiry, replacing any previous value and TTL
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Read a value; `None` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remaining TTL in seconds. `None` when the key is absent; values
    /// `<= 0` mean the key has lapsed (expired-but-not-evicted, or never
    /// had an expiry) and is garbage to the sweep.
    async fn ttl_secs(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a key. Deleting an absent key is a success.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Append one entry to the tail of a FIFO list
    async fn append(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically read the whole list and clear it, preserving order.
    /// Entries appended concurrently land in the next drain, never lost.
    async fn drain(&self, key: &str) -> Result<Vec<String>>;

    /// Increment a counter key, creating it at zero first
    async fn incr(&self, key: &str) -> Result<i64>;
}
