//! Per-engine mutable state: the query result cache and the performance log.
//!
//! Both sit behind short-lived `parking_lot` locks. No lock is held across
//! a store or synthesizer round trip.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lexgraph_core::Row;
use lexgraph_graph::Params;
use parking_lot::Mutex;
use serde::Serialize;

use crate::router::Intent;

struct CacheEntry {
    rows: Arc<Vec<Row>>,
    inserted: Instant,
}

/// Execution-time summary for one intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentTimings {
    pub count: usize,
    pub average_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Snapshot of the performance log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub total_queries: usize,
    pub average_ms: f64,
    pub by_intent: BTreeMap<String, IntentTimings>,
}

pub struct EngineState {
    cache: Mutex<HashMap<String, CacheEntry>>,
    timings: Mutex<BTreeMap<Intent, Vec<u64>>>,
    ttl: Duration,
    max_entries: usize,
    samples_per_intent: usize,
}

impl EngineState {
    pub fn new(ttl: Duration, max_entries: usize, samples_per_intent: usize) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            timings: Mutex::new(BTreeMap::new()),
            ttl,
            max_entries,
            samples_per_intent: samples_per_intent.max(1),
        }
    }

    /// Cache key: BLAKE3 of the whitespace-collapsed query and its parameters.
    pub fn cache_key(cypher: &str, params: &Params) -> String {
        let normalized = cypher.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b"\0");
        // BTreeMap keys serialize in order, so this is canonical.
        hasher.update(serde_json::to_string(params).unwrap_or_default().as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Live cached rows for `key`, if any.
    pub fn cached(&self, key: &str) -> Option<Arc<Vec<Row>>> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(Arc::clone(&entry.rows)),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store rows under `key`. Entries are never overwritten while live; a
    /// full cache drops the write after purging expired entries.
    pub fn store(&self, key: String, rows: Arc<Vec<Row>>) {
        if self.max_entries == 0 {
            return;
        }
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&key) {
            if existing.inserted.elapsed() < self.ttl {
                return;
            }
        }
        if cache.len() >= self.max_entries {
            let ttl = self.ttl;
            cache.retain(|_, entry| entry.inserted.elapsed() < ttl);
            if cache.len() >= self.max_entries {
                tracing::debug!(entries = cache.len(), "Query cache full, skipping insert");
                return;
            }
        }
        cache.insert(
            key,
            CacheEntry {
                rows,
                inserted: Instant::now(),
            },
        );
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Append one execution time, keeping the newest samples per intent.
    pub fn record(&self, intent: Intent, elapsed_ms: u64) {
        let mut timings = self.timings.lock();
        let samples = timings.entry(intent).or_default();
        if samples.len() >= self.samples_per_intent {
            samples.remove(0);
        }
        samples.push(elapsed_ms);
    }

    pub fn tracked_intents(&self) -> usize {
        self.timings.lock().len()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let timings = self.timings.lock();
        let mut stats = PerformanceStats::default();
        let mut total_ms = 0u64;

        for (intent, samples) in timings.iter() {
            if samples.is_empty() {
                continue;
            }
            let sum: u64 = samples.iter().sum();
            total_ms += sum;
            stats.total_queries += samples.len();
            stats.by_intent.insert(
                intent.label().to_string(),
                IntentTimings {
                    count: samples.len(),
                    average_ms: sum as f64 / samples.len() as f64,
                    min_ms: samples.iter().copied().min().unwrap_or(0),
                    max_ms: samples.iter().copied().max().unwrap_or(0),
                },
            );
        }
        if stats.total_queries > 0 {
            stats.average_ms = total_ms as f64 / stats.total_queries as f64;
        }
        stats
    }

    pub fn clear_performance_stats(&self) {
        self.timings.lock().clear();
    }
}
