//! Memoized table loads.
//!
//! Entries are keyed by (path, filter, columns) and remember the file
//! signature they were loaded under; a changed mtime or size replaces the
//! entry on the next lookup. Eviction is least-recently-used.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::csv_io::{file_signature, FileSignature};
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    /// Normalized ISO3 for filtered loads.
    pub filter: Option<String>,
    pub columns: Vec<String>,
}

impl CacheKey {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            filter: None,
            columns: Vec::new(),
        }
    }

    pub fn with_filter(mut self, iso3: &str) -> Self {
        self.filter = Some(iso3.trim().to_uppercase());
        self
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub reloads: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct Entry {
    signature: FileSignature,
    table: Arc<Table>,
    last_used: u64,
    inserted: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    tick: u64,
    stats: CacheStats,
}

pub struct FrameCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl FrameCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl: None,
        }
    }

    /// Entries older than `ttl` are reloaded even if the file is unchanged.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    // A panic while holding the lock leaves the map consistent; keep using it.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached table for `key`, calling `load` on a miss or when the
    /// file changed since the entry was stored.
    pub fn get_or_load<F>(&self, key: CacheKey, load: F) -> Arc<Table>
    where
        F: FnOnce() -> Table,
    {
        let signature = file_signature(&key.path);
        let mut stale = false;
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.tick += 1;
            let tick = inner.tick;
            if let Some(entry) = inner.entries.get_mut(&key) {
                let expired = self.ttl.is_some_and(|ttl| entry.inserted.elapsed() >= ttl);
                if entry.signature == signature && !expired {
                    entry.last_used = tick;
                    inner.stats.hits += 1;
                    return Arc::clone(&entry.table);
                }
                stale = true;
            }
        }

        // Load outside the lock; concurrent misses on one key may both load.
        let table = Arc::new(load());

        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick += 1;
        if stale {
            inner.stats.reloads += 1;
            debug!(path = %key.path.display(), "file changed, cache entry replaced");
        } else {
            inner.stats.misses += 1;
        }
        let entry = Entry {
            signature,
            table: Arc::clone(&table),
            last_used: inner.tick,
            inserted: Instant::now(),
        };
        inner.entries.insert(key, entry);

        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    inner.entries.remove(&k);
                    inner.stats.evictions += 1;
                }
                None => break,
            }
        }
        table
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Drop every entry loaded from `path`. Returns how many were removed.
    pub fn invalidate_path(&self, path: &Path) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| k.path != path);
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn table_with(rows: usize) -> Table {
        let mut t = Table::empty(&["n"]);
        for i in 0..rows {
            t.push_text_row([i.to_string().as_str()]);
        }
        t
    }

    #[test]
    fn test_second_lookup_is_a_hit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "n\n1\n").unwrap();

        let cache = FrameCache::default();
        let loads = Cell::new(0);
        for _ in 0..3 {
            let t = cache.get_or_load(CacheKey::new(&path), || {
                loads.set(loads.get() + 1);
                table_with(1)
            });
            assert_eq!(t.len(), 1);
        }
        assert_eq!(loads.get(), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (2, 1, 1));
    }

    #[test]
    fn test_changed_file_is_reloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "n\n1\n").unwrap();

        let cache = FrameCache::default();
        let first = cache.get_or_load(CacheKey::new(&path), || table_with(1));
        fs::write(&path, "n\n1\n2\n").unwrap();
        let second = cache.get_or_load(CacheKey::new(&path), || table_with(2));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(cache.stats().reloads, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_filters_and_columns_are_separate_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        let cache = FrameCache::default();
        cache.get_or_load(CacheKey::new(&path).with_filter("prt"), || table_with(1));
        cache.get_or_load(CacheKey::new(&path).with_filter("ESP"), || table_with(2));
        cache.get_or_load(CacheKey::new(&path).with_columns(&["n"]), || table_with(3));
        let hit = cache.get_or_load(CacheKey::new(&path).with_filter("PRT"), || table_with(9));
        assert_eq!(hit.len(), 1);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_lru_eviction() {
        let dir = TempDir::new().unwrap();
        let cache = FrameCache::new(2);
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        let c = dir.path().join("c.csv");

        cache.get_or_load(CacheKey::new(&a), || table_with(1));
        cache.get_or_load(CacheKey::new(&b), || table_with(2));
        // touch a so b becomes least recently used
        cache.get_or_load(CacheKey::new(&a), || table_with(9));
        cache.get_or_load(CacheKey::new(&c), || table_with(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
        let reloaded = cache.get_or_load(CacheKey::new(&b), || table_with(5));
        assert_eq!(reloaded.len(), 5);
        let kept = cache.get_or_load(CacheKey::new(&c), || table_with(9));
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_zero_ttl_always_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        let cache = FrameCache::default().with_ttl(Duration::ZERO);
        cache.get_or_load(CacheKey::new(&path), || table_with(1));
        let again = cache.get_or_load(CacheKey::new(&path), || table_with(2));
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        let cache = FrameCache::default();
        cache.get_or_load(CacheKey::new(&a), || table_with(1));
        cache.get_or_load(CacheKey::new(&a).with_filter("PRT"), || table_with(1));
        cache.get_or_load(CacheKey::new(&b), || table_with(1));

        assert_eq!(cache.invalidate_path(&a), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
