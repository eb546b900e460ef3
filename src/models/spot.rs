use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a spotted unit: rolling stock class plus operator.
///
/// Two subjects that differ only in case or whitespace are the same subject
/// for caching purposes; see [`SpotSubject::cache_key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpotSubject {
    pub class: String,
    pub operator: String,
}

impl SpotSubject {
    pub fn new(class: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            operator: operator.into(),
        }
    }

    /// Normalized composite cache key: lowercase, whitespace-collapsed
    /// class and operator joined with `|`.
    pub fn cache_key(&self) -> String {
        format!("{}|{}", normalize(&self.class), normalize(&self.operator))
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Enrichment payload computed by the identification pipeline.
///
/// The cache stores these blobs opaquely; their shape belongs to the
/// pipeline, not to this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotEnrichment {
    #[serde(default)]
    pub specs: serde_json::Value,
    #[serde(default)]
    pub facts: serde_json::Value,
    #[serde(default)]
    pub rarity: serde_json::Value,
}

/// Persisted cache record for one subject.
///
/// `blueprints` maps style name → image URL. Keys are plain strings so that
/// style names added by a newer build survive a round trip through an older
/// one; unknown top-level fields in a persisted record are ignored on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub specs: serde_json::Value,
    #[serde(default)]
    pub facts: serde_json::Value,
    #[serde(default)]
    pub rarity: serde_json::Value,
    #[serde(default)]
    pub blueprints: BTreeMap<String, String>,
}

/// Lookup view of a cache entry with the blueprint URL resolved for the
/// requested style. `blueprint_url` is `None` when the entry exists but no
/// blueprint has been generated in that style yet.
#[derive(Debug, Clone, Serialize)]
pub struct CachedSpot {
    pub specs: serde_json::Value,
    pub facts: serde_json::Value,
    pub rarity: serde_json::Value,
    pub blueprint_url: Option<String>,
}

/// Process-lifetime cache counters. Not persisted; hit/miss reset on restart.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_hits: u64,
    pub total_misses: u64,
}
