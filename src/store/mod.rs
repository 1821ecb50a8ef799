//! Key-value capability the coordinator persists nodes, jobs and the shared
//! secret through.
//!
//! Only single-key atomicity is required: concurrent `register` calls for one
//! node race to last-write-wins, and `hdel` must report removal to at most
//! one caller. No multi-key transactions are used.
//!
//! - [`MemoryStore`]: in-process map with lazy TTL expiry, for tests and
//!   single-node development
//! - [`RedisStore`]: Redis-backed store for real deployments

pub mod memory;
pub mod redis;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("key {0} holds the wrong kind of value")]
    WrongType(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a string value. `ttl` of `None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove a key of any kind. Returns true if it existed.
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// Apply an expiry to an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Set many hash fields at once, creating the hash if needed.
    async fn hset_multiple(&self, key: &str, fields: &BTreeMap<String, String>)
        -> StoreResult<()>;

    async fn hgetall(&self, key: &str) -> StoreResult<BTreeMap<String, String>>;

    /// Remove one hash field. Returns true iff this call removed it.
    async fn hdel(&self, key: &str, field: &str) -> StoreResult<bool>;
}
