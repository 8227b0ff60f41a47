#![allow(dead_code)]

use std::{
    io::{Cursor, Read},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use bevy::prelude::*;

use bevy_splat_compare::{
    CacheConfig,
    LoadExecution,
    MemoryFetcher,
    SortConfig,
    SplatComparePlugin,
    SplatFetcher,
    SplatLoadEvent,
    SplatRecord,
    SplatResult,
    io::{
        source::ByteStream,
        splat::{SPLAT_RECORD_SIZE, encode_records},
    },
    sort::SortExecution,
};


/// Loads and sorts on the calling thread so one `update` observes their results.
pub fn inline_config() -> CacheConfig {
    CacheConfig {
        sort: SortConfig {
            execution: SortExecution::Inline,
            ..default()
        },
        load_execution: LoadExecution::Inline,
    }
}

/// Loads on the io pool, sorts inline.
pub fn background_load_config() -> CacheConfig {
    CacheConfig {
        load_execution: LoadExecution::Background,
        ..inline_config()
    }
}

pub fn test_app(fetcher: MemoryFetcher) -> App {
    test_app_with(fetcher, inline_config())
}

pub fn test_app_with(fetcher: impl SplatFetcher, config: CacheConfig) -> App {
    let mut app = App::new();

    app.add_plugins(MinimalPlugins);
    app.add_plugins(SplatComparePlugin::new(fetcher).with_config(config));

    app.init_resource::<CollectedLoadEvents>();
    app.add_systems(PostUpdate, collect_load_events);

    app
}

/// Also stores images, so consumers receive [`bevy_splat_compare::SplatTextures`].
pub fn test_app_with_images(fetcher: MemoryFetcher) -> App {
    let mut app = test_app(fetcher);

    app.add_plugins(AssetPlugin::default());
    app.init_asset::<Image>();

    app
}


#[derive(Resource, Default)]
pub struct CollectedLoadEvents(pub Vec<SplatLoadEvent>);

fn collect_load_events(
    mut events: EventReader<SplatLoadEvent>,
    mut collected: ResMut<CollectedLoadEvents>,
) {
    collected.0.extend(events.read().cloned());
}


/// Records placed along the z axis, `z = -index`.
pub fn line_of_splats(count: usize) -> Vec<SplatRecord> {
    (0..count)
        .map(|i| SplatRecord {
            position: [0.0, 0.0, -(i as f32)],
            ..default()
        })
        .collect()
}

pub fn splat_bytes(records: &[SplatRecord]) -> Vec<u8> {
    encode_records(records)
}

/// Records served per read of a [`SlowReader`].
pub const SLOW_READ_RECORDS: usize = 10;

/// Serves a few records per read, sleeping before each one.
pub struct SlowReader {
    bytes: Cursor<Arc<[u8]>>,
    reads: Arc<AtomicUsize>,
    delay: Duration,
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(self.delay);
        self.reads.fetch_add(1, Ordering::SeqCst);

        let limit = buf.len().min(SLOW_READ_RECORDS * SPLAT_RECORD_SIZE);
        self.bytes.read(&mut buf[..limit])
    }
}


/// Streams `slow_key` through a [`SlowReader`] and every other key from memory.
pub struct SlowFetcher {
    slow_key: String,
    bytes: Arc<[u8]>,
    delay: Duration,
    reads: Arc<AtomicUsize>,
    memory: MemoryFetcher,
}

impl SlowFetcher {
    pub fn new(slow_key: &str, records: &[SplatRecord], delay: Duration) -> Self {
        Self {
            slow_key: slow_key.to_string(),
            bytes: splat_bytes(records).into(),
            delay,
            reads: Arc::default(),
            memory: MemoryFetcher::default(),
        }
    }

    pub fn with_memory(mut self, memory: MemoryFetcher) -> Self {
        self.memory = memory;
        self
    }

    pub fn reads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl SplatFetcher for SlowFetcher {
    fn request(&self, key: &str) -> SplatResult<ByteStream> {
        if key != self.slow_key {
            return self.memory.request(key);
        }

        let reader = SlowReader {
            bytes: Cursor::new(Arc::clone(&self.bytes)),
            reads: Arc::clone(&self.reads),
            delay: self.delay,
        };
        Ok(ByteStream::new(reader, Some(self.bytes.len() as u64)))
    }
}


pub fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(10) {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}
