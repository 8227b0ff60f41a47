use std::sync::{
    Arc,
    Weak,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    cache::{CacheEntry, CacheInner},
    camera::CameraPose,
    gaussian::{
        asset::{LoadStatus, SplatAsset},
        textures::PackedTextures,
    },
    sort::SortOrder,
};


/// A snapshot of one entry's load, tagged with the generation that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    pub generation: u64,
    pub loaded_count: usize,
    pub total_count: usize,
    pub status: LoadStatus,
    pub version: u64,
}


/// A consumer's reference to a cached source.
///
/// The handle never keeps the entry alive by itself; the cache does, for as long as
/// at least one handle is attached. Dropping a handle detaches it.
pub struct SplatHandle {
    key: String,
    consumer_id: u64,
    generation: u64,
    entry: Weak<CacheEntry>,
    cache: Weak<CacheInner>,
    attached: AtomicBool,
}

impl std::fmt::Debug for SplatHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplatHandle")
            .field("key", &self.key)
            .field("consumer_id", &self.consumer_id)
            .field("generation", &self.generation)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl SplatHandle {
    pub(crate) fn new(
        key: String,
        consumer_id: u64,
        entry: &Arc<CacheEntry>,
        cache: Weak<CacheInner>,
    ) -> Self {
        Self {
            key,
            consumer_id,
            generation: entry.generation(),
            entry: Arc::downgrade(entry),
            cache,
            attached: AtomicBool::new(true),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn consumer_id(&self) -> u64 {
        self.consumer_id
    }

    /// Generation of the load this handle was acquired under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Re-attaches after [`SplatHandle::detach`]. Fails if the entry was released
    /// in the meantime; acquire again in that case.
    pub fn attach(&self) -> bool {
        if self.is_attached() {
            return true;
        }

        let (Some(cache), Some(entry)) = (self.cache.upgrade(), self.entry.upgrade()) else {
            return false;
        };

        let attached = cache.attach(&self.key, self.consumer_id, &entry);
        self.attached.store(attached, Ordering::Release);
        attached
    }

    /// Idempotent. The last detach frees the entry and cancels its load.
    pub fn detach(&self) {
        if !self.attached.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(cache) = self.cache.upgrade() {
            cache.detach(&self.key, self.consumer_id);
        }
    }

    fn live_entry(&self) -> Option<Arc<CacheEntry>> {
        if !self.is_attached() {
            return None;
        }
        self.entry.upgrade()
    }

    pub fn entry(&self) -> Option<Arc<CacheEntry>> {
        self.live_entry()
    }

    pub fn asset(&self) -> Option<SplatAsset> {
        self.live_entry()
            .map(|entry| entry.with_state(|state| state.asset().clone()))
    }

    pub fn status(&self) -> Option<LoadStatus> {
        self.live_entry()
            .map(|entry| entry.with_state(|state| state.asset().status().clone()))
    }

    pub fn progress(&self) -> Option<LoadProgress> {
        self.live_entry().map(|entry| entry.with_state(|state| LoadProgress {
            generation: state.generation(),
            loaded_count: state.asset().loaded_count(),
            total_count: state.asset().total_count(),
            status: state.asset().status().clone(),
            version: state.version(),
        }))
    }

    pub fn with_textures<R>(&self, f: impl FnOnce(&PackedTextures) -> R) -> Option<R> {
        self.live_entry()
            .map(|entry| entry.with_state(|state| f(state.textures())))
    }

    /// Requests an order for `camera` (in the entry's local frame) and returns the
    /// latest complete one, which may still belong to an earlier pose.
    pub fn current_sort_order(&self, camera: &CameraPose) -> Option<Arc<SortOrder>> {
        let entry = self.live_entry()?;
        entry.submit_pose(*camera);
        Some(entry.current_sort_order())
    }
}

impl Drop for SplatHandle {
    fn drop(&mut self) {
        self.detach();
    }
}
