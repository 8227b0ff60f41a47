use std::sync::{
    Arc,
    Weak,
    atomic::{AtomicBool, Ordering},
};

use bevy::{
    log::{debug, info},
    platform::time::Instant,
    tasks::{
        IoTaskPool,
        TaskPool,
        block_on,
        futures_lite::future,
    },
};

use crate::{
    cache::{
        LoadExecution,
        entry::{CacheEntry, EntryState, PipelineTask},
    },
    error::SplatResult,
    io::source::SplatFetcher,
    stream::ChunkStreamDecoder,
};


/// Starts loading `entry` under `generation`. Background loads run on the io pool and
/// are owned by the entry; inline loads run to completion before returning.
pub(crate) fn start_pipeline(
    entry: &Arc<CacheEntry>,
    fetcher: Arc<dyn SplatFetcher>,
    generation: u64,
    execution: LoadExecution,
) {
    let cancel = Arc::new(AtomicBool::new(false));
    let load = load_source(
        Arc::downgrade(entry),
        fetcher,
        generation,
        Arc::clone(&cancel),
    );

    match execution {
        LoadExecution::Background => {
            let task = IoTaskPool::get_or_init(TaskPool::new).spawn(load);
            entry.install_pipeline(PipelineTask {
                task: Some(task),
                cancel,
            });
        }
        LoadExecution::Inline => {
            entry.install_pipeline(PipelineTask {
                task: None,
                cancel,
            });
            block_on(load);
        }
    }
}


async fn load_source(
    entry: Weak<CacheEntry>,
    fetcher: Arc<dyn SplatFetcher>,
    generation: u64,
    cancel: Arc<AtomicBool>,
) {
    let Some((key, options)) = entry
        .upgrade()
        .map(|entry| (entry.key().to_owned(), entry.options().clone()))
    else {
        return;
    };

    let started = Instant::now();

    let stream = match fetcher.request(&key) {
        Ok(stream) => stream,
        Err(error) => {
            let _ = update(&entry, generation, |state| state.fail(generation, error));
            return;
        }
    };

    let declared_count = stream.declared_count();
    let mut reader = stream.reader;

    let began = update(&entry, generation, |state| state.begin(generation, declared_count, &options));
    if !matches!(began, Some(Ok(()))) {
        return;
    }

    let mut decoder = ChunkStreamDecoder::new(options.chunk_size, declared_count);

    loop {
        if cancel.load(Ordering::Acquire) {
            debug!("load of `{key}` cancelled after {} splats", decoder.decoded_count());
            return;
        }

        let applied = match decoder.next_batch(&mut reader) {
            Ok(Some(batch)) => update(&entry, generation, |state| state.apply_batch(generation, &batch)),
            Ok(None) => {
                let completed = update(&entry, generation, |state| state.complete(generation));
                if matches!(completed, Some(Ok(()))) {
                    info!(
                        "loaded {} splats from `{key}` in {:?}",
                        decoder.decoded_count(),
                        started.elapsed(),
                    );
                }
                return;
            }
            Err(error) => {
                let _ = update(&entry, generation, |state| state.fail(generation, error));
                return;
            }
        };

        match applied {
            Some(Ok(())) => {}
            Some(Err(error)) if !error.is_stale() => {
                let _ = update(&entry, generation, |state| state.fail(generation, error));
                return;
            }
            _ => return,
        }

        future::yield_now().await;
    }
}


/// `None` once every consumer has let go of the entry.
fn update(
    entry: &Weak<CacheEntry>,
    generation: u64,
    f: impl FnOnce(&mut EntryState) -> SplatResult<()>,
) -> Option<SplatResult<()>> {
    let entry = entry.upgrade()?;
    Some(entry.update(generation, f))
}
