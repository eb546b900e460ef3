//! Key-value store adapter: Redis when reachable, in-memory otherwise.
//!
//! [`KvStore::connect`] never fails; it probes the configured Redis endpoint
//! once and silently falls back to the in-memory backend. Backend I/O errors
//! after that are absorbed per call (read → miss, write → drop) so a Redis
//! outage mid-session degrades the store instead of crashing the process.

pub mod tasks;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Which backend the adapter selected at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Connected,
    InMemoryFallback,
}

impl StoreStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreStatus::Connected => "connected",
            StoreStatus::InMemoryFallback => "in-memory fallback",
        }
    }
}

#[async_trait]
trait KvBackend: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn delete(&self, key: &str) -> Result<(), KvError>;
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

/// Uniform get/set/delete over the selected backend. Values are opaque
/// strings (JSON documents); the adapter does not interpret them.
pub struct KvStore {
    backend: Box<dyn KvBackend>,
    status: StoreStatus,
}

impl KvStore {
    /// Select a backend. If `redis_url` is given and a PING succeeds, uses
    /// Redis; otherwise logs once and falls back to the in-memory backend.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        if let Some(url) = redis_url {
            match RedisBackend::connect(url).await {
                Ok(backend) => {
                    tracing::info!("connected to Redis job store");
                    return Self {
                        backend: Box::new(backend),
                        status: StoreStatus::Connected,
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unreachable, using in-memory job store");
                }
            }
        }
        Self::in_memory()
    }

    /// In-memory store, used as the fallback backend and in tests.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            status: StoreStatus::InMemoryFallback,
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if let Err(e) = self.backend.set(key, value, ttl).await {
            tracing::warn!(key = %key, error = %e, "store write dropped");
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "store read failed, treating as miss");
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            tracing::warn!(key = %key, error = %e, "store delete dropped");
        }
    }

    /// Snapshot of all keys starting with `prefix`.
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "store key scan failed");
                Vec::new()
            }
        }
    }

    pub fn status(&self) -> StoreStatus {
        self.status
    }
}

/// Redis backend. One multiplexed connection per call, same as the rest of
/// the codebase's Redis usage.
struct RedisBackend {
    client: redis::Client,
}

impl RedisBackend {
    async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        match ttl {
            Some(ttl) => {
                conn.pset_ex::<_, _, ()>(key, value, ttl.as_millis() as u64)
                    .await?
            }
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory backend with per-key TTL, checked on read.
struct MemoryBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
