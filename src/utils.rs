use bevy::prelude::*;
use bevy_args::{
    Deserialize,
    Parser,
    Serialize,
};

use crate::gaussian::settings::{
    DEFAULT_CHUNK_SIZE,
    MaskMode,
};


#[derive(
    Debug,
    Resource,
    Serialize,
    Deserialize,
    Parser,
)]
#[command(about = "bevy_splat_compare viewer", version, long_about = None)]
pub struct SplatCompareViewer {
    #[arg(long, default_value = "true")]
    pub editor: bool,

    #[arg(long, default_value = "true")]
    pub press_esc_close: bool,

    #[arg(long, default_value = "1920.0")]
    pub width: f32,

    #[arg(long, default_value = "1080.0")]
    pub height: f32,

    #[arg(long, default_value = "bevy_splat_compare")]
    pub name: String,

    /// key of the scan drawn left of the clip plane, resolved below the asset root
    #[arg(long, default_value = "")]
    pub left: String,

    #[arg(long, default_value = "")]
    pub right: String,

    /// unclipped scan drawn behind both sides, `b` toggles it
    #[arg(long, default_value = "")]
    pub background: String,

    #[arg(long, default_value = "assets")]
    pub asset_root: String,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, default_value = "0.0")]
    pub clip_x: f32,

    #[arg(long, value_enum, default_value_t = MaskMode::Discard)]
    pub mask_mode: MaskMode,

    /// synthetic splats per side when a source key is empty
    #[arg(long, default_value = "10000")]
    pub random_count: usize,
}

impl Default for SplatCompareViewer {
    fn default() -> SplatCompareViewer {
        SplatCompareViewer {
            editor: true,
            press_esc_close: true,
            width: 1920.0,
            height: 1080.0,
            name: "bevy_splat_compare".to_string(),
            left: "".to_string(),
            right: "".to_string(),
            background: "".to_string(),
            asset_root: "assets".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            clip_x: 0.0,
            mask_mode: MaskMode::Discard,
            random_count: 10_000,
        }
    }
}


pub fn setup_hooks() {
    #[cfg(debug_assertions)]
    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
    }
}

