use std::path::Path;
use std::sync::Arc;

use crate::cache::{CacheKey, CacheStats, FrameCache};
use crate::csv_io::{read_csv_filtered, read_csv_safe_any, FilteredQuery};
use crate::paths::DataPaths;
use crate::schema::{normalize_columns, FieldAliases};
use crate::table::Table;

/// Read-side handle over the data directory.
///
/// The entity queries live in their own modules as `impl OfflineStore`
/// blocks; this type only owns the paths and the load cache.
pub struct OfflineStore {
    paths: DataPaths,
    cache: FrameCache,
}

impl OfflineStore {
    pub fn new(paths: DataPaths) -> Self {
        Self::with_cache(paths, FrameCache::default())
    }

    pub fn with_cache(paths: DataPaths, cache: FrameCache) -> Self {
        Self { paths, cache }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whole-file read with drifted headers renamed through `schema` and the
    /// result sliced to `columns` (all columns when empty). Cached per file
    /// signature.
    pub(crate) fn load(&self, path: &Path, schema: &[FieldAliases], columns: &[&str]) -> Arc<Table> {
        let key = CacheKey::new(path).with_columns(columns);
        self.cache.get_or_load(key, || {
            let mut table = read_csv_safe_any(path);
            normalize_columns(&mut table, schema);
            if columns.is_empty() {
                table
            } else {
                table.select_columns(columns)
            }
        })
    }

    /// Single-country streamed read, cached per (file, iso3, columns).
    pub(crate) fn load_filtered(&self, path: &Path, iso3: &str, query: &FilteredQuery) -> Arc<Table> {
        let key = CacheKey::new(path).with_filter(iso3).with_columns(&query.columns);
        self.cache
            .get_or_load(key, || read_csv_filtered(path, iso3, query))
    }
}
