use std::{
    collections::HashSet,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use bevy::{
    log::{debug, warn},
    tasks::Task,
};

use crate::{
    cache::AcquireOptions,
    camera::CameraPose,
    error::{SplatError, SplatResult},
    gaussian::{
        asset::SplatAsset,
        textures::PackedTextures,
    },
    sort::{DepthSortEngine, SortConfig, SortOrder},
    stream::DecodedBatch,
};


pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}


/// Everything one source decodes into. The load pipeline is its only writer.
#[derive(Debug)]
pub struct EntryState {
    generation: u64,
    asset: SplatAsset,
    textures: PackedTextures,
    sort: DepthSortEngine,
    version: u64,
}

impl EntryState {
    pub(crate) fn new(generation: u64, sort: SortConfig) -> Self {
        Self {
            generation,
            asset: SplatAsset::default(),
            textures: PackedTextures::default(),
            sort: DepthSortEngine::new(sort),
            version: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn asset(&self) -> &SplatAsset {
        &self.asset
    }

    pub fn textures(&self) -> &PackedTextures {
        &self.textures
    }

    pub fn sort(&self) -> &DepthSortEngine {
        &self.sort
    }

    /// Bumped whenever texel data or load status changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn check_generation(&self, generation: u64) -> SplatResult<()> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(SplatError::StaleGeneration {
                current: self.generation,
                found: generation,
            })
        }
    }

    pub(crate) fn begin(
        &mut self,
        generation: u64,
        declared_count: Option<usize>,
        options: &AcquireOptions,
    ) -> SplatResult<()> {
        self.check_generation(generation)?;

        let capacity = declared_count
            .unwrap_or(options.chunk_size)
            .min(options.max_splats)
            .max(1);

        self.asset = SplatAsset::new(declared_count);
        self.asset.begin();
        self.textures = PackedTextures::with_capacity(capacity);
        self.version += 1;

        Ok(())
    }

    pub(crate) fn apply_batch(
        &mut self,
        generation: u64,
        batch: &DecodedBatch,
    ) -> SplatResult<()> {
        self.check_generation(generation)?;

        if batch.start != self.asset.loaded_count() {
            return Err(SplatError::Format(format!(
                "batch starting at {} arrived with {} splats loaded",
                batch.start,
                self.asset.loaded_count(),
            )));
        }

        self.textures.write_or_grow(batch.start, &batch.records)?;
        self.asset.advance(batch.records.len());
        self.version += 1;

        Ok(())
    }

    pub(crate) fn complete(&mut self, generation: u64) -> SplatResult<()> {
        self.check_generation(generation)?;

        self.asset.finish();
        self.version += 1;

        Ok(())
    }

    pub(crate) fn fail(&mut self, generation: u64, error: SplatError) -> SplatResult<()> {
        self.check_generation(generation)?;

        self.asset.fail(error);
        self.version += 1;

        Ok(())
    }

    /// Starts over under a new generation; anything tagged with the old one is refused.
    pub(crate) fn reset(&mut self, generation: u64) {
        self.generation = generation;
        self.asset = SplatAsset::default();
        self.textures = PackedTextures::default();
        self.sort.reset();
        self.version += 1;
    }

    pub(crate) fn submit_pose(&mut self, pose: CameraPose) {
        self.sort.submit_pose(pose);
    }

    pub(crate) fn tick_sort(&mut self) -> bool {
        let count = self.asset.loaded_count();
        let textures = &self.textures;

        self.sort.tick(count, || textures.centers(count))
    }
}


pub(crate) struct PipelineTask {
    pub(crate) task: Option<Task<()>>,
    pub(crate) cancel: Arc<AtomicBool>,
}


/// One cached source: its decoded state plus the consumers keeping it alive.
pub struct CacheEntry {
    key: String,
    options: AcquireOptions,
    pub(crate) state: Mutex<EntryState>,
    pub(crate) consumers: Mutex<HashSet<u64>>,
    pub(crate) pipeline: Mutex<Option<PipelineTask>>,
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("consumers", &self.consumer_count())
            .finish_non_exhaustive()
    }
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        options: AcquireOptions,
        generation: u64,
        sort: SortConfig,
    ) -> Self {
        Self {
            key,
            options,
            state: Mutex::new(EntryState::new(generation, sort)),
            consumers: Mutex::new(HashSet::new()),
            pipeline: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &AcquireOptions {
        &self.options
    }

    pub fn generation(&self) -> u64 {
        lock(&self.state).generation()
    }

    pub fn consumer_count(&self) -> usize {
        lock(&self.consumers).len()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&EntryState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn current_sort_order(&self) -> Arc<SortOrder> {
        lock(&self.state).sort().current_order()
    }

    pub fn submit_pose(&self, pose: CameraPose) {
        lock(&self.state).submit_pose(pose);
    }

    pub fn tick_sort(&self) -> bool {
        lock(&self.state).tick_sort()
    }

    /// Applies `f` if the state still belongs to `generation`; stale writes are dropped.
    pub(crate) fn update(
        &self,
        generation: u64,
        f: impl FnOnce(&mut EntryState) -> SplatResult<()>,
    ) -> SplatResult<()> {
        let mut state = lock(&self.state);
        let result = state
            .check_generation(generation)
            .and_then(|()| f(&mut state));

        if let Err(error) = &result {
            if error.is_stale() {
                debug!("discarding stale result for `{}`: {error}", self.key);
            } else {
                warn!("splat source `{}` failed: {error}", self.key);
            }
        }

        result
    }

    pub(crate) fn install_pipeline(&self, pipeline: PipelineTask) {
        if let Some(previous) = lock(&self.pipeline).replace(pipeline) {
            previous.cancel.store(true, Ordering::Release);
        }
    }

    /// Signals and drops the running pipeline, if any.
    pub(crate) fn cancel_pipeline(&self) {
        if let Some(pipeline) = lock(&self.pipeline).take() {
            pipeline.cancel.store(true, Ordering::Release);
            drop(pipeline.task);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaussian::record::SplatRecord;

    fn batch(start: usize, count: usize) -> DecodedBatch {
        DecodedBatch {
            start,
            records: vec![SplatRecord::default(); count],
        }
    }

    #[test]
    fn stale_batches_are_refused() {
        let mut state = EntryState::new(1, SortConfig::default());
        state.begin(1, Some(8), &AcquireOptions::default()).unwrap();
        state.apply_batch(1, &batch(0, 4)).unwrap();

        state.reset(2);
        let version = state.version();

        let late = state.apply_batch(1, &batch(4, 4));
        assert_eq!(late, Err(SplatError::StaleGeneration { current: 2, found: 1 }));
        assert_eq!(state.asset().loaded_count(), 0);
        assert_eq!(state.version(), version);
    }

    #[test]
    fn update_skips_writers_of_an_older_generation() {
        let entry = CacheEntry::new("scan.splat".into(), AcquireOptions::default(), 3, SortConfig::default());

        let mut ran = false;
        let result = entry.update(2, |_| {
            ran = true;
            Ok(())
        });

        assert_eq!(result, Err(SplatError::StaleGeneration { current: 3, found: 2 }));
        assert!(!ran);

        entry.update(3, |state| state.begin(3, Some(4), &AcquireOptions::default())).unwrap();
        assert_eq!(entry.with_state(|state| state.asset().total_count()), 4);
    }

    #[test]
    fn batches_apply_in_file_order() {
        let mut state = EntryState::new(1, SortConfig::default());
        state.begin(1, None, &AcquireOptions::default()).unwrap();

        assert!(matches!(state.apply_batch(1, &batch(4, 2)), Err(SplatError::Format(_))));

        state.apply_batch(1, &batch(0, 4)).unwrap();
        state.apply_batch(1, &batch(4, 2)).unwrap();
        state.complete(1).unwrap();

        assert_eq!(state.asset().loaded_count(), 6);
        assert_eq!(state.asset().declared_count(), Some(6));
        assert!(state.asset().is_complete());
    }
}
