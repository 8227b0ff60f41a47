use std::sync::Arc;

use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};

use crate::{
    consumer::SplatConsumer,
    gaussian::settings::{MaskMode, SplatSettings},
    sort::SortOrder,
};

pub mod texture;

pub use texture::{
    SplatTextureImages,
    SplatTextures,
    TexturePlugin,
};


/// Per-consumer shader parameters.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Pod,
    Reflect,
    Zeroable,
)]
#[repr(C)]
pub struct SplatUniforms {
    pub clip_x: f32,
    /// -1 keeps x <= clip_x, 1 keeps x >= clip_x, 0 disables clipping
    pub clip_side: f32,
    /// 0 discards masked fragments, 1 zeroes their alpha
    pub mask_mode: f32,
    pub alpha_test: f32,
}

static_assertions::assert_eq_size!(SplatUniforms, [f32; 4]);

impl From<&SplatSettings> for SplatUniforms {
    fn from(settings: &SplatSettings) -> Self {
        Self {
            clip_x: settings.clip_x,
            clip_side: settings.clip_side.sign(),
            mask_mode: settings.mask_mode.uniform(),
            alpha_test: DrawPipelineState::from(settings).alpha_test,
        }
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Reflect)]
pub enum BlendMode {
    /// premultiplied color over `one_minus_src_alpha`
    #[default]
    PremultipliedCustom,
    Normal,
}


/// Fixed-function state the rasterizer binds for one consumer.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct DrawPipelineState {
    pub transparent: bool,
    pub depth_write: bool,
    pub depth_test: bool,
    pub blend: BlendMode,
    pub render_order: i32,
    pub alpha_test: f32,
    pub tone_mapped: bool,
}

impl Default for DrawPipelineState {
    fn default() -> Self {
        Self::from(&SplatSettings::default())
    }
}

impl From<&SplatSettings> for DrawPipelineState {
    fn from(settings: &SplatSettings) -> Self {
        let overlay = settings.mask_mode == MaskMode::AlphaZero;

        Self {
            transparent: !settings.alpha_hash || overlay,
            depth_write: !overlay,
            depth_test: !overlay,
            blend: if settings.alpha_hash || overlay {
                BlendMode::Normal
            } else {
                BlendMode::PremultipliedCustom
            },
            render_order: i32::from(overlay),
            alpha_test: if settings.alpha_hash {
                0.0
            } else {
                settings.alpha_test
            },
            tone_mapped: settings.tone_mapped,
        }
    }
}


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FragmentMask {
    Keep,
    Discard,
    ZeroAlpha,
}

pub fn is_clipped(x: f32, clip_x: f32, clip_side: f32) -> bool {
    (clip_side > 0.0 && x < clip_x) || (clip_side < 0.0 && x > clip_x)
}

/// CPU mirror of the fragment stage's clip test at world-space `x`.
pub fn fragment_mask(x: f32, uniforms: &SplatUniforms) -> FragmentMask {
    if !is_clipped(x, uniforms.clip_x, uniforms.clip_side) {
        FragmentMask::Keep
    } else if uniforms.mask_mode > 0.0 {
        FragmentMask::ZeroAlpha
    } else {
        FragmentMask::Discard
    }
}


/// What the rasterizer draws for a consumer this frame.
#[derive(Clone, Component, Debug, Default)]
pub struct SplatDrawState {
    pub generation: u64,
    pub draw_count: usize,
    pub order: Arc<SortOrder>,
    pub order_version: u64,
    /// set when `order` must be uploaded again
    pub order_changed: bool,
    pub uniforms: SplatUniforms,
    pub pipeline: DrawPipelineState,
}

impl SplatDrawState {
    /// Compares orders by identity, never by content.
    pub fn differs_from(&self, other: &SplatDrawState) -> bool {
        self.order_changed
            || other.order_changed
            || self.generation != other.generation
            || self.draw_count != other.draw_count
            || self.order_version != other.order_version
            || !Arc::ptr_eq(&self.order, &other.order)
            || self.uniforms != other.uniforms
            || self.pipeline != other.pipeline
    }
}

/// Next visible state from the entry's current data and the consumer's settings.
///
/// The draw count follows `loaded_count` but never runs past the published order,
/// which catches up on the next sort tick.
pub fn bind_frame(
    previous: Option<&SplatDrawState>,
    generation: u64,
    loaded_count: usize,
    order: Arc<SortOrder>,
    settings: &SplatSettings,
) -> SplatDrawState {
    let order_changed = previous.is_none_or(|previous| {
        previous.generation != generation
            || previous.order_version != order.version()
            || !Arc::ptr_eq(&previous.order, &order)
    });

    SplatDrawState {
        generation,
        draw_count: loaded_count.min(order.len()),
        order_version: order.version(),
        order,
        order_changed,
        uniforms: SplatUniforms::from(settings),
        pipeline: DrawPipelineState::from(settings),
    }
}


pub fn bind_render_state(
    mut commands: Commands,
    consumers: Query<(
        Entity,
        &SplatConsumer,
        &SplatSettings,
        Option<&SplatDrawState>,
    )>,
) {
    for (entity, consumer, settings, previous) in consumers.iter() {
        let Some(entry) = consumer.handle.entry() else {
            continue;
        };

        let (loaded_count, order) = entry.with_state(|state| (
            state.asset().loaded_count(),
            state.sort().current_order(),
        ));

        let next = bind_frame(previous, consumer.generation, loaded_count, order, settings);
        if previous.is_none_or(|previous| next.differs_from(previous)) {
            commands.entity(entity).insert(next);
        }
    }
}


#[derive(Default)]
pub struct RenderBindingPlugin;

impl Plugin for RenderBindingPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<SplatUniforms>();
        app.register_type::<DrawPipelineState>();
        app.register_type::<BlendMode>();

        app.add_plugins(TexturePlugin);
    }
}
