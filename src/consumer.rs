use bevy::{
    log::debug,
    prelude::*,
};

use crate::{
    cache::{AcquireOptions, SharedAssetCache, SplatHandle},
    camera::{CameraPose, SplatCamera},
    error::SplatError,
    gaussian::{
        asset::LoadStatus,
        settings::SplatSource,
    },
    render::{SplatDrawState, SplatTextures},
};


/// Everything a consumer entity carries while it is attached to a cache entry.
type AttachedComponents = (SplatConsumer, SplatDrawState, SplatTextures);


/// Attached to every entity with a non-empty [`SplatSource`]. Dropping it detaches
/// the entity from the cache.
#[derive(Component, Debug)]
pub struct SplatConsumer {
    pub handle: SplatHandle,
    /// bumped each time the entity is retargeted to another key
    pub generation: u64,
    reported: Option<(u64, u64)>,
}

impl SplatConsumer {
    pub fn new(handle: SplatHandle) -> Self {
        Self {
            handle,
            generation: 1,
            reported: None,
        }
    }

    fn retarget(&mut self, handle: SplatHandle) {
        self.handle = handle;
        self.generation += 1;
        self.reported = None;
    }
}


#[derive(Event, Clone, Debug, PartialEq)]
pub enum SplatLoadEvent {
    Progress {
        entity: Entity,
        generation: u64,
        loaded_count: usize,
        total_count: usize,
    },
    Loaded {
        entity: Entity,
        generation: u64,
        count: usize,
    },
    /// `loaded_count` splats stay drawable.
    Failed {
        entity: Entity,
        generation: u64,
        loaded_count: usize,
        error: SplatError,
    },
}

impl SplatLoadEvent {
    pub fn entity(&self) -> Entity {
        match self {
            SplatLoadEvent::Progress { entity, .. }
            | SplatLoadEvent::Loaded { entity, .. }
            | SplatLoadEvent::Failed { entity, .. } => *entity,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            SplatLoadEvent::Progress { generation, .. }
            | SplatLoadEvent::Loaded { generation, .. }
            | SplatLoadEvent::Failed { generation, .. } => *generation,
        }
    }
}


pub fn attach_consumers(
    mut commands: Commands,
    cache: Res<SharedAssetCache>,
    mut sources: Query<
        (Entity, &SplatSource, Option<&mut SplatConsumer>),
        Changed<SplatSource>,
    >,
    mut removed: RemovedComponents<SplatSource>,
    still_sourced: Query<(), With<SplatSource>>,
) {
    for entity in removed.read() {
        if still_sourced.contains(entity) {
            continue;
        }
        if let Ok(mut entity) = commands.get_entity(entity) {
            entity.try_remove::<AttachedComponents>();
        }
    }

    for (entity, source, consumer) in sources.iter_mut() {
        if source.key.is_empty() {
            if consumer.is_some() {
                commands.entity(entity).remove::<AttachedComponents>();
            }
            continue;
        }

        let options = AcquireOptions {
            chunk_size: source.chunk_size,
            max_splats: source.max_splats,
        };

        match consumer {
            Some(consumer) if consumer.handle.key() == source.key => {}
            Some(mut consumer) => {
                debug!("retargeting {entity} from `{}` to `{}`", consumer.handle.key(), source.key);
                consumer.retarget(cache.acquire(&source.key, options));
            }
            None => {
                commands
                    .entity(entity)
                    .insert(SplatConsumer::new(cache.acquire(&source.key, options)));
            }
        }
    }
}


/// Feeds the camera pose, in each consumer's local frame, to its entry and advances
/// every entry's sort engine.
pub fn sort_splats(
    cache: Res<SharedAssetCache>,
    cameras: Query<&GlobalTransform, With<SplatCamera>>,
    consumers: Query<(&SplatConsumer, &GlobalTransform)>,
) {
    if let Some(camera) = cameras.iter().next() {
        let pose = CameraPose::from_global_transform(camera);

        for (consumer, transform) in consumers.iter() {
            if let Some(entry) = consumer.handle.entry() {
                entry.submit_pose(pose.relative_to(transform));
            }
        }
    }

    for key in cache.tick_sorts() {
        debug!("published sort order for `{key}`");
    }
}


pub fn emit_load_events(
    mut events: EventWriter<SplatLoadEvent>,
    mut consumers: Query<(Entity, &mut SplatConsumer)>,
) {
    for (entity, mut consumer) in consumers.iter_mut() {
        let Some(progress) = consumer.handle.progress() else {
            continue;
        };

        let seen = Some((progress.generation, progress.version));
        if consumer.reported == seen {
            continue;
        }
        consumer.reported = seen;

        let generation = consumer.generation;
        let event = match progress.status {
            LoadStatus::Pending => continue,
            LoadStatus::Loading => SplatLoadEvent::Progress {
                entity,
                generation,
                loaded_count: progress.loaded_count,
                total_count: progress.total_count,
            },
            LoadStatus::Loaded => SplatLoadEvent::Loaded {
                entity,
                generation,
                count: progress.loaded_count,
            },
            LoadStatus::Failed(error) => SplatLoadEvent::Failed {
                entity,
                generation,
                loaded_count: progress.loaded_count,
                error,
            },
        };

        events.write(event);
    }
}
