// In-memory RelayStore implementation
//
// Used by unit tests, router tests and local development. Expiry is lazy:
// value reads purge lapsed entries, while key listings and TTL probes
// still see them - mirroring a real store that defers eviction, which is
// exactly the window the reaper exists for.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use beacon_core::error::{BeaconError, Result};
use beacon_core::traits::RelayStore;

#[derive(Debug, Clone)]
enum Slot {
    Value(String),
    List(Vec<String>),
    Counter(i64),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn lapsed(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// In-memory relay store
#[derive(Default)]
pub struct MemoryRelayStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryRelayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `StoreUnavailable`,
    /// modeling a store outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Move a key's expiry into the past without evicting it, modeling
    /// the expired-but-not-yet-evicted window
    pub fn force_expire(&self, key: &str) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() - Duration::from_secs(1));
        }
    }

    /// Strip a key's expiry entirely (a marker written without one is
    /// malformed and must read as lapsed)
    pub fn strip_expiry(&self, key: &str) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = None;
        }
    }

    /// Number of live + lapsed entries, for test assertions
    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(BeaconError::store("injected outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RelayStore for MemoryRelayStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Value(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.lapsed(now)) {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).and_then(|entry| match &entry.slot {
            Slot::Value(v) => Some(v.clone()),
            Slot::Counter(n) => Some(n.to_string()),
            Slot::List(_) => None,
        }))
    }

    async fn ttl_secs(&self, key: &str) -> Result<Option<i64>> {
        self.check_available()?;
        let entries = self.entries.lock().expect("store lock poisoned");
        let now = Instant::now();
        Ok(entries.get(key).map(|entry| match entry.expires_at {
            // round up so a key with 0.5s left reads as 1, not lapsed
            Some(at) if at > now => (at - now).as_secs_f64().ceil() as i64,
            Some(_) => 0,
            None => -1,
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries
            .lock()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let entries = self.entries.lock().expect("store lock poisoned");
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn append(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.lapsed(now)) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            slot: Slot::List(Vec::new()),
            expires_at: None,
        });
        match &mut entry.slot {
            Slot::List(items) => items.push(value.to_string()),
            other => {
                *other = Slot::List(vec![value.to_string()]);
                entry.expires_at = None;
            }
        }
        Ok(())
    }

    async fn drain(&self, key: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let mut entries = self.entries.lock().expect("store lock poisoned");
        match entries.remove(key) {
            Some(Entry {
                slot: Slot::List(items),
                ..
            }) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.check_available()?;
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            slot: Slot::Counter(0),
            expires_at: None,
        });
        match &mut entry.slot {
            Slot::Counter(n) => {
                *n += 1;
                Ok(*n)
            }
            other => {
                *other = Slot::Counter(1);
                Ok(1)
            }
        }
    }
}
