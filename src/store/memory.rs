//! In-process key-value store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use super::{KeyValueStore, WindowCount, whole_seconds};
use crate::{ItineraError, Result};

/// Writes between two sweeps of expired entries.
const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory [`KeyValueStore`] with per-key expiry.
///
/// Time comes from `tokio::time::Instant`, so tests running with a paused
/// clock can step through windows with `tokio::time::advance`. Expired
/// entries are dropped on access, and every few hundred writes the whole
/// map is swept for expired keys. Every operation holds one lock, which makes
/// [`incr_window`](KeyValueStore::incr_window) atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| ItineraError::Store("memory store lock poisoned".to_string()))
    }

    /// Drop every expired entry now.
    pub fn purge_expired(&self) -> usize {
        match self.lock() {
            Ok(mut entries) => Self::sweep(&mut entries, Instant::now()),
            Err(_) => 0,
        }
    }

    fn sweep(entries: &mut HashMap<String, Entry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Count a write and sweep when the interval is reached.
    fn note_write(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes.is_multiple_of(SWEEP_INTERVAL) {
            let removed = Self::sweep(entries, now);
            if removed > 0 {
                debug!(removed, "swept expired entries");
            }
        }
    }

    /// Look up a live entry, evicting it first if it has expired.
    fn live<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        Ok(Self::live(&mut entries, key, Instant::now()).map(|e| e.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        self.note_write(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        Ok(entries.remove(key).is_some_and(|e| !e.is_expired(now)))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        Ok(Self::live(&mut entries, key, now)
            .and_then(|e| e.expires_at)
            .map(|at| whole_seconds(at - now)))
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        self.note_write(&mut entries, now);

        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });

        let count = entry.value.parse::<u64>().map_err(|_| {
            ItineraError::Store(format!("value at {key} is not an integer"))
        })? + 1;
        entry.value = count.to_string();

        // A fresh window, or a counter that never got its expiry.
        if count == 1 || entry.expires_at.is_none() {
            entry.expires_at = Some(now + window);
        }
        let remaining = entry.expires_at.map(|at| at - now).unwrap_or(window);

        Ok(WindowCount {
            count,
            remaining: whole_seconds(remaining),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
