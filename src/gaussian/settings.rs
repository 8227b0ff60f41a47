use bevy::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};


pub const DEFAULT_CHUNK_SIZE: usize = 25_000;
pub const DEFAULT_MAX_SPLATS: usize = 1_000_000;


/// Which side of `clip_x` stays visible.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Reflect,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum ClipSide {
    /// keeps x <= clip_x
    Left,
    #[default]
    None,
    /// keeps x >= clip_x
    Right,
}

impl ClipSide {
    pub fn sign(&self) -> f32 {
        match self {
            ClipSide::Left => -1.0,
            ClipSide::None => 0.0,
            ClipSide::Right => 1.0,
        }
    }
}


#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Reflect,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum MaskMode {
    /// masked fragments are discarded, a hard geometric cut for side-by-side comparison
    #[default]
    Discard,
    /// masked fragments keep their draw call with zero alpha, for overlay comparison
    AlphaZero,
}

impl MaskMode {
    pub fn uniform(&self) -> f32 {
        match self {
            MaskMode::Discard => 0.0,
            MaskMode::AlphaZero => 1.0,
        }
    }
}


/// The scan a consumer entity shows. Changing `key` retargets the consumer.
#[derive(Component, Clone, Debug, PartialEq, Reflect)]
#[reflect(Component)]
#[require(SplatSettings, Transform)]
pub struct SplatSource {
    pub key: String,
    pub chunk_size: usize,
    pub max_splats: usize,
}

impl SplatSource {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }
}

impl Default for SplatSource {
    fn default() -> Self {
        Self {
            key: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_splats: DEFAULT_MAX_SPLATS,
        }
    }
}


#[derive(Component, Clone, Debug, PartialEq, Reflect)]
#[reflect(Component)]
pub struct SplatSettings {
    pub clip_x: f32,
    pub clip_side: ClipSide,
    pub mask_mode: MaskMode,
    pub alpha_test: f32,
    pub alpha_hash: bool,
    /// run splat colors through the camera's tone mapping
    pub tone_mapped: bool,
}

impl Default for SplatSettings {
    fn default() -> Self {
        Self {
            clip_x: 0.0,
            clip_side: ClipSide::default(),
            mask_mode: MaskMode::default(),
            alpha_test: 0.0,
            alpha_hash: false,
            tone_mapped: false,
        }
    }
}
