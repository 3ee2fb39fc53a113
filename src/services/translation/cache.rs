use lru::LruCache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::core::errors::{CacheError, CacheResult};
use crate::core::types::LanguageTag;
use crate::services::translation::TranslatedBatch;
use crate::utils::Metrics;

const CACHE_FILE_NAME: &str = "translations.json";

/// LRU cache of translation responses with debounced JSON persistence.
///
/// Keys are xxHash3 digests of the source text and language pair, so the
/// same paragraph captured twice is only sent to the backend once.
#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: RwLock<LruCache<String, TranslatedBatch>>,
    cache_file: Option<PathBuf>,
    dirty: AtomicBool,
    metrics: Option<Metrics>,
}

impl TranslationCache {
    /// In-memory cache with no persistence
    pub fn in_memory(max_entries: usize, metrics: Option<Metrics>) -> CacheResult<Self> {
        let capacity = NonZeroUsize::new(max_entries).ok_or(CacheError::ZeroCapacity)?;
        Ok(Self::from_parts(LruCache::new(capacity), None, metrics))
    }

    /// Cache backed by `<cache_dir>/translations.json`.
    ///
    /// Existing entries are loaded; an unreadable or malformed file starts an
    /// empty cache. When `save_interval` is non-zero a background task writes
    /// dirty state at most once per interval.
    pub async fn persistent(
        cache_dir: &str,
        max_entries: usize,
        save_interval: Duration,
        metrics: Option<Metrics>,
    ) -> CacheResult<Self> {
        let capacity = NonZeroUsize::new(max_entries).ok_or(CacheError::ZeroCapacity)?;

        let cache_path = Path::new(cache_dir);
        if !cache_path.exists() {
            tokio::fs::create_dir_all(cache_path)
                .await
                .map_err(CacheError::DirectoryCreationFailed)?;
        }

        let cache_file = cache_path.join(CACHE_FILE_NAME);
        let mut lru = LruCache::new(capacity);

        if cache_file.exists() {
            let data = tokio::fs::read_to_string(&cache_file)
                .await
                .map_err(|source| CacheError::LoadFailed {
                    path: cache_file.display().to_string(),
                    source,
                })?;

            match serde_json::from_str::<HashMap<String, TranslatedBatch>>(&data) {
                Ok(stored) => {
                    for (key, batch) in stored {
                        lru.put(key, batch);
                    }
                }
                Err(e) => warn!("Ignoring malformed cache file {}: {}", cache_file.display(), e),
            }
        }

        debug!("Loaded {} cached translations", lru.len());

        let cache = Self::from_parts(lru, Some(cache_file), metrics);
        if !save_interval.is_zero() {
            cache.start_persistence_task(save_interval);
        }

        Ok(cache)
    }

    fn from_parts(
        entries: LruCache<String, TranslatedBatch>,
        cache_file: Option<PathBuf>,
        metrics: Option<Metrics>,
    ) -> Self {
        if let Some(ref m) = metrics {
            m.update_cache_size(entries.len());
        }

        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(entries),
                cache_file,
                dirty: AtomicBool::new(false),
                metrics,
            }),
        }
    }

    /// Key for a text and language pair
    pub fn generate_key(text: &str, source: &LanguageTag, target: &LanguageTag) -> String {
        let mut hash_input = Vec::with_capacity(text.len() + 16);
        hash_input.extend_from_slice(source.as_str().as_bytes());
        hash_input.push(0);
        hash_input.extend_from_slice(target.as_str().as_bytes());
        hash_input.push(0);
        hash_input.extend_from_slice(text.as_bytes());

        format!("{:016x}", xxh3_64(&hash_input))
    }

    /// Look up a cached response, recording a hit or miss
    pub fn get(&self, key: &str) -> Option<TranslatedBatch> {
        let found = self.inner.entries.write().get(key).cloned();

        if let Some(ref m) = self.inner.metrics {
            if found.is_some() {
                m.record_cache_hit();
            } else {
                m.record_cache_miss();
            }
        }

        found
    }

    pub fn put(&self, key: String, batch: &TranslatedBatch) {
        let size = {
            let mut entries = self.inner.entries.write();
            entries.put(key, batch.clone());
            entries.len()
        };

        if let Some(ref m) = self.inner.metrics {
            m.update_cache_size(size);
        }

        self.inner.dirty.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache file now. No-op for in-memory caches.
    pub async fn save(&self) -> CacheResult<()> {
        let Some(ref cache_file) = self.inner.cache_file else {
            return Ok(());
        };

        write_snapshot(&self.inner, cache_file).await
    }

    fn start_persistence_task(&self, interval: Duration) {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut last_save = Instant::now();

            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;

                let Some(ref cache_file) = inner.cache_file else {
                    break;
                };

                if inner.dirty.load(Ordering::Acquire) && last_save.elapsed() >= interval {
                    if let Err(e) = write_snapshot(&inner, cache_file).await {
                        warn!("Translation cache persistence failed: {}", e);
                    }
                    last_save = Instant::now();
                }
            }
        });
    }
}

async fn write_snapshot(inner: &CacheInner, cache_file: &Path) -> CacheResult<()> {
    // Cleared first so a put racing with the snapshot re-marks the cache
    inner.dirty.store(false, Ordering::Release);

    let snapshot: HashMap<String, TranslatedBatch> = inner
        .entries
        .read()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let written = match serde_json::to_string(&snapshot) {
        Ok(json) => tokio::fs::write(cache_file, json)
            .await
            .map_err(|source| CacheError::SaveFailed {
                path: cache_file.display().to_string(),
                source,
            }),
        Err(e) => Err(e.into()),
    };

    if written.is_err() {
        inner.dirty.store(true, Ordering::Release);
    }
    written
}
