use std::{collections::HashMap, ops::Range};

use bevy::{
    asset::RenderAssetUsages,
    log::debug,
    math::UVec2,
    prelude::*,
    render::render_resource::{
        Extent3d,
        TextureDimension,
        TextureFormat,
        TextureUsages,
    },
};

use crate::{
    cache::SharedAssetCache,
    consumer::SplatConsumer,
    gaussian::{
        packed::{CenterScaleTexel, CovColorTexel},
        textures::PackedTextures,
    },
};


/// The two images a consumer's draw call samples.
#[derive(Component, Clone, Debug, PartialEq, Reflect)]
pub struct SplatTextures {
    pub size: UVec2,
    /// `Rgba32Float`: center xyz, covariance quantization factor
    pub center_and_scale: Handle<Image>,
    /// `Rgba32Uint`: three words of packed covariance halves, RGBA8 color
    pub cov_and_color: Handle<Image>,
}


#[derive(Clone, Debug)]
struct EntryImages {
    generation: u64,
    version: u64,
    /// texels already copied into the images
    synced: usize,
    textures: SplatTextures,
}


/// Image handles per cache key, kept in step with the entry's packed textures.
#[derive(Resource, Debug, Default)]
pub struct SplatTextureImages {
    entries: HashMap<String, EntryImages>,
}

impl SplatTextureImages {
    pub fn get(&self, key: &str) -> Option<&SplatTextures> {
        self.entries
            .get(key)
            .map(|images| &images.textures)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}


fn texture_image(
    size: UVec2,
    data: Vec<u8>,
    format: TextureFormat,
) -> Image {
    let mut image = Image::new(
        Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        format,
        RenderAssetUsages::default(),
    );
    image.texture_descriptor.usage = TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING;
    image
}

fn create_images(
    images: &mut Assets<Image>,
    textures: &PackedTextures,
) -> SplatTextures {
    let size = textures.size();

    SplatTextures {
        size,
        center_and_scale: images.add(texture_image(
            size,
            textures.center_and_scale_bytes().to_vec(),
            TextureFormat::Rgba32Float,
        )),
        cov_and_color: images.add(texture_image(
            size,
            textures.cov_and_color_bytes().to_vec(),
            TextureFormat::Rgba32Uint,
        )),
    }
}

/// Copies `texels` of `source` into `image`, or all of it when the image data is
/// missing or sized differently.
fn copy_texels(
    image: &mut Image,
    source: &[u8],
    texel_size: usize,
    texels: Range<usize>,
) {
    match image.data.as_mut() {
        Some(data) if data.len() == source.len() => {
            let end = (texels.end * texel_size).min(source.len());
            let start = (texels.start * texel_size).min(end);
            data[start..end].copy_from_slice(&source[start..end]);
        }
        _ => image.data = Some(source.to_vec()),
    }
}

fn update_images(
    images: &mut Assets<Image>,
    target: &SplatTextures,
    textures: &PackedTextures,
    texels: Range<usize>,
) {
    if texels.is_empty() {
        return;
    }

    if let Some(image) = images.get_mut(&target.center_and_scale) {
        copy_texels(
            image,
            textures.center_and_scale_bytes(),
            size_of::<CenterScaleTexel>(),
            texels.clone(),
        );
    }
    if let Some(image) = images.get_mut(&target.cov_and_color) {
        copy_texels(
            image,
            textures.cov_and_color_bytes(),
            size_of::<CovColorTexel>(),
            texels,
        );
    }
}

fn remove_images(
    images: &mut Assets<Image>,
    target: &SplatTextures,
) {
    images.remove(&target.center_and_scale);
    images.remove(&target.cov_and_color);
}


/// Mirrors every live entry's packed textures into bevy images and hands them to the
/// entry's consumers. Images of released entries are removed.
pub fn sync_texture_images(
    mut commands: Commands,
    cache: Res<SharedAssetCache>,
    images: Option<ResMut<Assets<Image>>>,
    mut entry_images: ResMut<SplatTextureImages>,
    consumers: Query<(Entity, &SplatConsumer, Option<&SplatTextures>)>,
) {
    let Some(mut images) = images else {
        return;
    };

    entry_images.entries.retain(|key, entry| {
        let live = cache.contains(key);
        if !live {
            debug!("removing images of released splat source `{key}`");
            remove_images(&mut images, &entry.textures);
        }
        live
    });

    for entry in cache.entries() {
        let key = entry.key();

        entry.with_state(|state| {
            let textures = state.textures();
            if textures.capacity() == 0 {
                return;
            }

            let loaded = state.asset().loaded_count();

            match entry_images.entries.get_mut(key) {
                Some(current) if current.version == state.version() && current.generation == state.generation() => {}
                Some(current) if current.generation == state.generation() && current.textures.size == textures.size() => {
                    update_images(&mut images, &current.textures, textures, current.synced..loaded);
                    current.version = state.version();
                    current.synced = loaded;
                }
                Some(current) => {
                    remove_images(&mut images, &current.textures);
                    current.textures = create_images(&mut images, textures);
                    current.version = state.version();
                    current.generation = state.generation();
                    current.synced = loaded;
                }
                None => {
                    entry_images.entries.insert(key.to_owned(), EntryImages {
                        generation: state.generation(),
                        version: state.version(),
                        synced: loaded,
                        textures: create_images(&mut images, textures),
                    });
                }
            }
        });
    }

    for (entity, consumer, current) in consumers.iter() {
        let Some(textures) = entry_images.get(consumer.handle.key()) else {
            if current.is_some() {
                commands.entity(entity).remove::<SplatTextures>();
            }
            continue;
        };

        if current != Some(textures) {
            commands.entity(entity).insert(textures.clone());
        }
    }
}


#[derive(Default)]
pub struct TexturePlugin;

impl Plugin for TexturePlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<SplatTextures>();
        app.init_resource::<SplatTextureImages>();
    }
}
