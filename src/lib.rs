use std::sync::Arc;

use bevy::prelude::*;

pub use cache::{
    AcquireOptions,
    CacheConfig,
    LoadExecution,
    SharedAssetCache,
    SplatHandle,
};
pub use camera::{CameraPose, SplatCamera};
pub use consumer::{SplatConsumer, SplatLoadEvent};
pub use error::{SplatError, SplatResult};
pub use gaussian::{
    asset::{LoadStatus, SplatAsset},
    rand::random_splats,
    record::SplatRecord,
    settings::{
        ClipSide,
        MaskMode,
        SplatSettings,
        SplatSource,
    },
};
pub use io::source::{
    FileFetcher,
    MemoryFetcher,
    SplatFetcher,
};
pub use render::{SplatDrawState, SplatTextures};
pub use sort::{SortConfig, SortMode, SortOrder};

use render::RenderBindingPlugin;
use sort::SortPlugin;

pub mod cache;
pub mod camera;
pub mod consumer;
pub mod error;
pub mod gaussian;
pub mod io;
pub mod render;
pub mod sort;
pub mod stream;
pub mod utils;


/// Streams `.splat` scans into a shared cache and keeps every [`SplatSource`] entity's
/// draw state current.
pub struct SplatComparePlugin {
    pub fetcher: Arc<dyn SplatFetcher>,
    pub config: CacheConfig,
}

impl Default for SplatComparePlugin {
    fn default() -> Self {
        Self::new(FileFetcher::default())
    }
}

impl SplatComparePlugin {
    pub fn new(fetcher: impl SplatFetcher) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config: CacheConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }
}

impl Plugin for SplatComparePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SharedAssetCache::with_config(
            Arc::clone(&self.fetcher),
            self.config.clone(),
        ));

        app.register_type::<SplatCamera>();
        app.register_type::<SplatSource>();
        app.register_type::<SplatSettings>();
        app.register_type::<ClipSide>();
        app.register_type::<MaskMode>();

        app.add_event::<SplatLoadEvent>();

        app.add_plugins((
            SortPlugin,
            RenderBindingPlugin,
        ));

        app.add_systems(
            Update,
            (
                consumer::attach_consumers,
                consumer::sort_splats,
                consumer::emit_load_events,
                render::texture::sync_texture_images,
                render::bind_render_state,
            ).chain(),
        );
    }
}
