use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use bevy::{
    log::{debug, info},
    prelude::*,
};

use crate::{
    gaussian::settings::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_SPLATS},
    io::source::SplatFetcher,
    sort::SortConfig,
};

pub mod entry;
pub mod handle;
mod pipeline;

pub use entry::{CacheEntry, EntryState};
pub use handle::{LoadProgress, SplatHandle};

use entry::lock;


#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquireOptions {
    /// records decoded and published per batch
    pub chunk_size: usize,
    /// upper bound of the initial texture allocation; larger sources still load fully
    pub max_splats: usize,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_splats: DEFAULT_MAX_SPLATS,
        }
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Reflect)]
pub enum LoadExecution {
    #[default]
    Background,
    Inline,
}


#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheConfig {
    pub sort: SortConfig,
    pub load_execution: LoadExecution,
}


pub(crate) struct CacheInner {
    fetcher: Arc<dyn SplatFetcher>,
    config: CacheConfig,
    entries: Mutex<HashMap<String, Arc<CacheEntry>>>,
    next_generation: AtomicU64,
    next_consumer: AtomicU64,
}

impl CacheInner {
    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Re-registers `consumer_id` on its entry. Fails once the entry has been released.
    pub(crate) fn attach(&self, key: &str, consumer_id: u64, entry: &Arc<CacheEntry>) -> bool {
        let entries = lock(&self.entries);

        match entries.get(key) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                lock(&current.consumers).insert(consumer_id);
                true
            }
            _ => false,
        }
    }

    /// Drops the entry with its pipeline and textures when the last consumer leaves.
    pub(crate) fn detach(&self, key: &str, consumer_id: u64) {
        let released = {
            let mut entries = lock(&self.entries);

            let Some(entry) = entries.get(key) else {
                return;
            };

            let remaining = {
                let mut consumers = lock(&entry.consumers);
                consumers.remove(&consumer_id);
                consumers.len()
            };

            if remaining > 0 {
                return;
            }

            entries.remove(key)
        };

        if let Some(entry) = released {
            entry.cancel_pipeline();
            info!("released splat source `{key}`");
        }
    }
}


/// Shares one decoded asset, one set of packed textures and one sort order per source
/// key between every consumer showing it.
///
/// Entries live exactly as long as at least one [`SplatHandle`] is attached. Cloning the
/// cache is cheap and every clone sees the same entries.
#[derive(Clone, Resource)]
pub struct SharedAssetCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for SharedAssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAssetCache")
            .field("config", &self.inner.config)
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl SharedAssetCache {
    pub fn new(fetcher: impl SplatFetcher) -> Self {
        Self::with_config(Arc::new(fetcher), CacheConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn SplatFetcher>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                config,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                next_consumer: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns an attached handle to `key`, starting its load if no consumer holds it.
    ///
    /// Concurrent acquires of one key share a single load; `options` only apply to the
    /// acquire that creates the entry.
    pub fn acquire(&self, key: &str, options: AcquireOptions) -> SplatHandle {
        let consumer_id = self.inner.next_consumer.fetch_add(1, Ordering::Relaxed);

        let (entry, created) = {
            let mut entries = lock(&self.inner.entries);

            match entries.get(key) {
                Some(entry) => {
                    lock(&entry.consumers).insert(consumer_id);
                    (Arc::clone(entry), false)
                }
                None => {
                    let entry = Arc::new(CacheEntry::new(
                        key.to_owned(),
                        options,
                        self.inner.next_generation(),
                        self.inner.config.sort.clone(),
                    ));
                    lock(&entry.consumers).insert(consumer_id);
                    entries.insert(key.to_owned(), Arc::clone(&entry));
                    (entry, true)
                }
            }
        };

        let handle = SplatHandle::new(
            key.to_owned(),
            consumer_id,
            &entry,
            Arc::downgrade(&self.inner),
        );

        if created {
            info!("loading splat source `{key}`");
            pipeline::start_pipeline(
                &entry,
                Arc::clone(&self.inner.fetcher),
                entry.generation(),
                self.inner.config.load_execution,
            );
        } else {
            debug!("sharing splat source `{key}` with {} consumers", entry.consumer_count());
        }

        handle
    }

    /// Restarts the load of `key` under a new generation. Results still in flight from
    /// the previous attempt are discarded. Returns false if nobody holds `key`.
    pub fn retry(&self, key: &str) -> bool {
        let Some(entry) = self.entry(key) else {
            return false;
        };

        entry.cancel_pipeline();

        let generation = self.inner.next_generation();
        lock(&entry.state).reset(generation);

        info!("retrying splat source `{key}` as generation {generation}");
        pipeline::start_pipeline(
            &entry,
            Arc::clone(&self.inner.fetcher),
            generation,
            self.inner.config.load_execution,
        );

        true
    }

    pub fn entry(&self, key: &str) -> Option<Arc<CacheEntry>> {
        lock(&self.inner.entries).get(key).cloned()
    }

    pub fn entries(&self) -> Vec<Arc<CacheEntry>> {
        lock(&self.inner.entries).values().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.inner.entries).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = lock(&self.inner.entries).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn consumer_count(&self, key: &str) -> usize {
        self.entry(key).map_or(0, |entry| entry.consumer_count())
    }

    /// Advances every entry's sort engine. Returns the keys that published a new order.
    pub fn tick_sorts(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.tick_sort())
            .map(|entry| entry.key().to_owned())
            .collect()
    }
}
