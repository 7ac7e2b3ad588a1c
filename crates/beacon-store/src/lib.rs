// Relay store layer
//
// This crate provides the store implementations behind the RelayStore
// trait plus the two pieces of machinery built on top of it:
// - SessionChannel: the typed publish/drain/close facade
// - Reaper: the cleanup sweep bounding relay growth

pub mod channel;
pub mod config;
pub mod memory;
pub mod reaper;
pub mod redis_store;

pub use channel::SessionChannel;
pub use config::{create_store, StoreConfig, StoreMode};
pub use memory::MemoryRelayStore;
pub use reaper::{Reaper, SweepReport};
pub use redis_store::RedisRelayStore;
