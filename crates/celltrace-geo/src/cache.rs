//! Tiered location cache
//!
//! Population order at startup: the read-only reference dataset first, the
//! durable cache file second; duplicate keys resolve first-writer-wins so
//! reference entries are never overwritten by stale cache rows. Entries are
//! never evicted. Remote successes write through to memory and to the
//! durable tier's single-writer task.

use crate::cache_file::{load_cache_file, CacheFileWriter};
use crate::dataset::load_reference_dataset;
use crate::provider::CellLocator;
use celltrace_common::{CellKey, Coordinate, RadioType, Result};
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Three-tier cell-location cache
pub struct LocationCache {
    memory: DashMap<CellKey, Coordinate>,
    /// Last tick id a remote lookup was attempted for a key. Scopes dedup
    /// to one tick: the same key is retried on the next tick if it is
    /// observed again.
    tick_queries: DashMap<CellKey, u64>,
    writer: CacheFileWriter,
    locator: Option<Arc<dyn CellLocator>>,
}

impl LocationCache {
    /// Load both durable sources into memory and start the cache-file
    /// writer task. `locator` is `None` when no API credential is
    /// configured, degrading to local-only resolution.
    pub fn open(
        reference_dataset: Option<&Path>,
        cache_file: &Path,
        locator: Option<Arc<dyn CellLocator>>,
    ) -> Result<Self> {
        let memory = DashMap::new();

        if let Some(path) = reference_dataset {
            let loaded = load_reference_dataset(path, |key, coordinate| {
                memory.entry(key).or_insert(coordinate);
            })?;
            info!(entries = loaded, path = %path.display(), "reference dataset loaded");
        }

        let mut known = HashSet::new();
        let loaded = load_cache_file(cache_file, |key, coordinate| {
            known.insert(key.clone());
            memory.entry(key).or_insert(coordinate);
        })?;
        info!(entries = loaded, path = %cache_file.display(), "durable cache loaded");

        let writer = CacheFileWriter::spawn(cache_file.to_path_buf(), known);

        Ok(Self {
            memory,
            tick_queries: DashMap::new(),
            writer,
            locator,
        })
    }

    /// Memory-tier lookup; both file tiers were folded into memory at open
    #[must_use]
    pub fn lookup(&self, key: &CellKey) -> Option<Coordinate> {
        self.memory.get(key).map(|entry| *entry.value())
    }

    /// Number of cells currently resolvable without a remote call
    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Resolve a key, falling back to the remote provider on a miss.
    ///
    /// At most one remote attempt is made per key per tick; a failed or
    /// credential-less attempt returns `None` without caching anything.
    pub async fn resolve(
        &self,
        key: &CellKey,
        radio: RadioType,
        tick: u64,
    ) -> Option<Coordinate> {
        if let Some(coordinate) = self.lookup(key) {
            return Some(coordinate);
        }

        {
            use dashmap::mapref::entry::Entry;
            match self.tick_queries.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    if *entry.get() == tick {
                        debug!(key = %key, tick, "remote lookup already attempted this tick");
                        return None;
                    }
                    entry.insert(tick);
                }
                Entry::Vacant(entry) => {
                    entry.insert(tick);
                }
            }
        }

        let locator = match &self.locator {
            Some(locator) => Arc::clone(locator),
            None => {
                debug!(key = %key, "no geolocation credential configured");
                return None;
            }
        };

        let coordinate = locator.locate(radio, key).await?;

        // Write-through: memory keeps the first resolution, the durable
        // writer appends only keys the file does not already hold.
        self.memory.entry(key.clone()).or_insert(coordinate);
        self.writer.enqueue(radio, key.clone(), coordinate);
        info!(key = %key, coordinate = %coordinate, "cell resolved remotely");
        Some(coordinate)
    }

    /// Drain pending durable appends to disk and stop the writer task
    pub async fn close(&self) {
        self.writer.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct MockLocator {
        coordinate: Option<Coordinate>,
        calls: AtomicUsize,
    }

    impl MockLocator {
        fn resolving(lat: f64, lon: f64) -> Arc<Self> {
            Arc::new(Self {
                coordinate: Some(Coordinate::new(lat, lon)),
                calls: AtomicUsize::new(0),
            })
        }

        fn unresolving() -> Arc<Self> {
            Arc::new(Self {
                coordinate: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CellLocator for MockLocator {
        async fn locate(&self, _radio: RadioType, _key: &CellKey) -> Option<Coordinate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.coordinate
        }
    }

    fn key(mnc: &str, cell: &str) -> CellKey {
        CellKey::new("732", mnc, "100", cell).unwrap()
    }

    fn write_reference(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("732.csv");
        fs::write(
            &path,
            "id,mcc,mnc,area,cell,unit,lat,lon\n1,732,101,100,500,0,4.7,-74.2\n",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_reference_hit_makes_no_remote_call() {
        let dir = tempdir().unwrap();
        let reference = write_reference(dir.path());
        let locator = MockLocator::resolving(0.0, 0.0);
        let cache = LocationCache::open(
            Some(&reference),
            &dir.path().join("cell_cache.csv"),
            Some(locator.clone()),
        )
        .unwrap();

        let coordinate = cache
            .resolve(&key("101", "500"), RadioType::Lte, 1)
            .await
            .unwrap();
        assert_eq!((coordinate.lat, coordinate.lon), (4.7, -74.2));
        assert_eq!(locator.calls(), 0);
        cache.close().await;
    }

    #[tokio::test]
    async fn test_same_tick_dedup_and_next_tick_retry() {
        let dir = tempdir().unwrap();
        let locator = MockLocator::unresolving();
        let cache = LocationCache::open(
            None,
            &dir.path().join("cell_cache.csv"),
            Some(locator.clone()),
        )
        .unwrap();
        let k = key("101", "999");

        assert!(cache.resolve(&k, RadioType::Lte, 7).await.is_none());
        assert!(cache.resolve(&k, RadioType::Lte, 7).await.is_none());
        assert_eq!(locator.calls(), 1);

        assert!(cache.resolve(&k, RadioType::Lte, 8).await.is_none());
        assert_eq!(locator.calls(), 2);
        cache.close().await;
    }

    #[tokio::test]
    async fn test_remote_success_writes_through_and_survives_restart() {
        let dir = tempdir().unwrap();
        let cache_file = dir.path().join("cell_cache.csv");
        let locator = MockLocator::resolving(4.6, -74.1);
        let cache =
            LocationCache::open(None, &cache_file, Some(locator.clone())).unwrap();
        let k = key("01", "500");

        let coordinate = cache.resolve(&k, RadioType::Lte, 1).await.unwrap();
        assert_eq!((coordinate.lat, coordinate.lon), (4.6, -74.1));

        // Now in memory: no further remote calls even on a new tick.
        assert!(cache.resolve(&k, RadioType::Lte, 2).await.is_some());
        assert_eq!(locator.calls(), 1);
        cache.close().await;

        let content = fs::read_to_string(&cache_file).unwrap();
        assert!(content.contains("lte,732,01,100,500,,-74.1,4.6"));

        // Simulated restart: reload the durable tier, resolve locally.
        let restarted_locator = MockLocator::resolving(0.0, 0.0);
        let restarted =
            LocationCache::open(None, &cache_file, Some(restarted_locator.clone())).unwrap();
        let reloaded = restarted.lookup(&k).unwrap();
        assert_eq!((reloaded.lat, reloaded.lon), (4.6, -74.1));
        assert_eq!(restarted_locator.calls(), 0);
        restarted.close().await;
    }

    #[tokio::test]
    async fn test_reference_takes_precedence_over_cache_file() {
        let dir = tempdir().unwrap();
        let reference = write_reference(dir.path());
        let cache_file = dir.path().join("cell_cache.csv");
        fs::write(
            &cache_file,
            "radio,mcc,mnc,area,cell,unit,lon,lat\nlte,732,101,100,500,,-1.0,1.0\n",
        )
        .unwrap();

        let cache = LocationCache::open(Some(&reference), &cache_file, None).unwrap();
        let coordinate = cache.lookup(&key("101", "500")).unwrap();
        // The reference dataset row wins over the stale cache row.
        assert_eq!((coordinate.lat, coordinate.lon), (4.7, -74.2));
        cache.close().await;
    }

    #[tokio::test]
    async fn test_missing_credential_resolves_to_none_without_caching() {
        let dir = tempdir().unwrap();
        let cache_file = dir.path().join("cell_cache.csv");
        let cache = LocationCache::open(None, &cache_file, None).unwrap();
        let k = key("101", "123");

        assert!(cache.resolve(&k, RadioType::Nr, 1).await.is_none());
        assert!(cache.lookup(&k).is_none());
        cache.close().await;
        assert!(!cache_file.exists());
    }

    #[tokio::test]
    async fn test_failed_lookup_caches_no_negative_result() {
        let dir = tempdir().unwrap();
        let locator = MockLocator::unresolving();
        let cache = LocationCache::open(
            None,
            &dir.path().join("cell_cache.csv"),
            Some(locator.clone()),
        )
        .unwrap();
        let k = key("101", "123");

        assert!(cache.resolve(&k, RadioType::Wcdma, 1).await.is_none());
        assert!(cache.lookup(&k).is_none());
        // Retried on the next tick because nothing negative was cached.
        assert!(cache.resolve(&k, RadioType::Wcdma, 2).await.is_none());
        assert_eq!(locator.calls(), 2);
        cache.close().await;
    }
}
