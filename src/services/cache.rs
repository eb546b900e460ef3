//! Disk-backed spot cache with style-indexed blueprint URLs.
//!
//! The full entry map is persisted on every mutation (write-through, atomic
//! tmp + rename) while the write lock is held, so concurrent writers never
//! leave a partial state on disk. A missing or corrupt file at startup means
//! an empty cache, never a startup failure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::RwLock;

use crate::models::job::BlueprintStyle;
use crate::models::spot::{CacheEntry, CacheStats, CachedSpot, SpotEnrichment, SpotSubject};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Storage behind the cache. File-backed in production; the in-memory
/// implementation gives tests the same write-through contract without disk.
pub trait CachePersistence: Send + Sync {
    /// Load the persisted entry map. Missing or corrupt storage loads as
    /// `None` (empty cache), never an error.
    fn load(&self) -> Option<BTreeMap<String, CacheEntry>>;

    fn save(&self, entries: &BTreeMap<String, CacheEntry>) -> Result<(), CacheError>;
}

pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CachePersistence for FilePersistence {
    fn load(&self) -> Option<BTreeMap<String, CacheEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read spot cache file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt spot cache file, starting empty");
                None
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, CacheEntry>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Holds the serialized map in memory; deterministic tests without disk I/O.
#[derive(Default)]
pub struct MemoryPersistence {
    snapshot: Mutex<Option<String>>,
}

impl CachePersistence for MemoryPersistence {
    fn load(&self) -> Option<BTreeMap<String, CacheEntry>> {
        let snapshot = self.snapshot.lock().ok()?;
        snapshot.as_ref().and_then(|json| serde_json::from_str(json).ok())
    }

    fn save(&self, entries: &BTreeMap<String, CacheEntry>) -> Result<(), CacheError> {
        let json = serde_json::to_string(entries)?;
        if let Ok(mut snapshot) = self.snapshot.lock() {
            *snapshot = Some(json);
        }
        Ok(())
    }
}

/// The result cache: normalized `class|operator` keys mapping to enrichment
/// payloads plus per-style blueprint URLs.
pub struct SpotCache {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    persistence: Box<dyn CachePersistence>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SpotCache {
    pub fn open(persistence: Box<dyn CachePersistence>) -> Self {
        let entries = persistence.load().unwrap_or_default();
        if !entries.is_empty() {
            tracing::info!(entries = entries.len(), "loaded spot cache");
        }
        Self {
            entries: RwLock::new(entries),
            persistence,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_file(path: impl AsRef<Path>) -> Self {
        Self::open(Box::new(FilePersistence::new(path.as_ref())))
    }

    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryPersistence::default()))
    }

    /// Look up a subject, resolving the blueprint URL for `style` (default
    /// `technical`). An entry found without the requested style is still a
    /// hit; only a missing entry counts as a miss.
    pub async fn lookup(
        &self,
        subject: &SpotSubject,
        style: Option<BlueprintStyle>,
    ) -> Option<CachedSpot> {
        let key = subject.cache_key();
        let entries = self.entries.read().await;
        match entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("spot_cache_hits_total").increment(1);
                let style = style.unwrap_or_default();
                Some(CachedSpot {
                    specs: entry.specs.clone(),
                    facts: entry.facts.clone(),
                    rarity: entry.rarity.clone(),
                    blueprint_url: entry.blueprints.get(&style.to_string()).cloned(),
                })
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("spot_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Wholesale upsert of the enrichment payload for a subject. Clears any
    /// previously generated blueprints for that key.
    pub async fn write(&self, subject: &SpotSubject, enrichment: SpotEnrichment) {
        let key = subject.cache_key();
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                specs: enrichment.specs,
                facts: enrichment.facts,
                rarity: enrichment.rarity,
                blueprints: BTreeMap::new(),
            },
        );
        self.persist(&entries);
    }

    /// Record a generated blueprint URL under one style, leaving the
    /// enrichment payload and all other styles untouched. Creates the entry
    /// if the subject has never been written.
    pub async fn write_blueprint(&self, subject: &SpotSubject, url: &str, style: BlueprintStyle) {
        let key = subject.cache_key();
        let mut entries = self.entries.write().await;
        entries
            .entry(key)
            .or_default()
            .blueprints
            .insert(style.to_string(), url.to_string());
        self.persist(&entries);
    }

    /// Presence probe that does not move the hit/miss counters.
    pub async fn contains(&self, subject: &SpotSubject) -> bool {
        self.entries.read().await.contains_key(&subject.cache_key())
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.read().await.len(),
            total_hits: self.hits.load(Ordering::Relaxed),
            total_misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn persist(&self, entries: &BTreeMap<String, CacheEntry>) {
        if let Err(e) = self.persistence.save(entries) {
            tracing::warn!(error = %e, "failed to persist spot cache");
        }
    }
}
