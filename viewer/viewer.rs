use bevy::{
    app::AppExit,
    core_pipeline::tonemapping::Tonemapping,
    math::Isometry3d,
    prelude::*,
};
use bevy_args::{BevyArgsPlugin, parse_args};
use bevy_inspector_egui::{bevy_egui::EguiPlugin, quick::WorldInspectorPlugin};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

use bevy_splat_compare::{
    ClipSide,
    FileFetcher,
    MemoryFetcher,
    SharedAssetCache,
    SplatCamera,
    SplatComparePlugin,
    SplatConsumer,
    SplatDrawState,
    SplatError,
    SplatFetcher,
    SplatLoadEvent,
    SplatResult,
    SplatSettings,
    SplatSource,
    io::{source::ByteStream, splat::encode_records},
    random_splats,
    render::{FragmentMask, fragment_mask},
    utils::{SplatCompareViewer, setup_hooks},
};


const PREVIEW_LIMIT: usize = 20_000;


#[derive(Component)]
struct BackgroundSplats;


/// Synthetic sources first, then files below the asset root.
struct ViewerFetcher {
    memory: MemoryFetcher,
    files: FileFetcher,
}

impl SplatFetcher for ViewerFetcher {
    fn request(&self, key: &str) -> SplatResult<ByteStream> {
        match self.memory.request(key) {
            Err(SplatError::Network(_)) => self.files.request(key),
            result => result,
        }
    }
}


fn source_key(
    memory: &MemoryFetcher,
    key: &str,
    fallback: &str,
    count: usize,
) -> String {
    if !key.is_empty() {
        return key.to_string();
    }

    info!("generating {count} splats for `{fallback}`");
    memory.insert(fallback, encode_records(&random_splats(count)));
    fallback.to_string()
}


fn setup_comparison(
    mut commands: Commands,
    config: Res<SplatCompareViewer>,
) {
    let settings = |clip_side| SplatSettings {
        clip_x: config.clip_x,
        clip_side,
        mask_mode: config.mask_mode,
        ..default()
    };

    for (key, clip_side) in [
        (config.left.clone(), ClipSide::Left),
        (config.right.clone(), ClipSide::Right),
    ] {
        commands.spawn((
            SplatSource {
                key: key.clone(),
                chunk_size: config.chunk_size,
                ..default()
            },
            settings(clip_side),
            Name::new(format!("splats_{key}")),
        ));
    }

    if !config.background.is_empty() {
        commands.spawn((
            SplatSource {
                key: config.background.clone(),
                chunk_size: config.chunk_size,
                ..default()
            },
            BackgroundSplats,
            Visibility::Visible,
            Name::new("splats_background"),
        ));
    }

    commands.spawn((
        SplatCamera,
        Camera3d::default(),
        Transform::from_translation(Vec3::new(0.0, 1.5, 40.0)),
        Tonemapping::None,
        PanOrbitCamera {
            allow_upside_down: true,
            ..default()
        },
    ));
}


/// Draws the sorted centers of every consumer, honoring its clip plane.
fn preview_splats(
    mut gizmos: Gizmos,
    consumers: Query<(&SplatConsumer, &SplatDrawState, &GlobalTransform, Option<&Visibility>)>,
) {
    for (consumer, draw_state, transform, visibility) in consumers.iter() {
        if visibility == Some(&Visibility::Hidden) {
            continue;
        }

        let step = (draw_state.draw_count / PREVIEW_LIMIT).max(1);

        consumer.handle.with_textures(|textures| {
            let centers = textures.center_and_scale();
            let colors = textures.cov_and_color();

            for &index in draw_state.order.indices()[..draw_state.draw_count].iter().step_by(step) {
                let (Some(center), Some(color)) = (centers.get(index as usize), colors.get(index as usize)) else {
                    continue;
                };
                let position = transform.transform_point(Vec3::from_array(center.center));

                if fragment_mask(position.x, &draw_state.uniforms) != FragmentMask::Keep {
                    continue;
                }

                let [r, g, b, a] = color.rgba();
                gizmos.sphere(
                    Isometry3d::from_translation(position),
                    0.05,
                    Color::srgba_u8(r, g, b, a),
                );
            }
        });
    }
}


fn move_clip_plane(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut settings: Query<&mut SplatSettings>,
) {
    let direction = match (keys.pressed(KeyCode::ArrowLeft), keys.pressed(KeyCode::ArrowRight)) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => return,
    };

    for mut settings in settings.iter_mut() {
        settings.clip_x += direction * 5.0 * time.delta_secs();
    }
}


fn press_b_toggle_background(
    keys: Res<ButtonInput<KeyCode>>,
    mut backgrounds: Query<&mut Visibility, With<BackgroundSplats>>,
) {
    if keys.just_pressed(KeyCode::KeyB) {
        for mut visibility in backgrounds.iter_mut() {
            visibility.toggle_visible_hidden();
        }
    }
}


fn press_r_retry(
    keys: Res<ButtonInput<KeyCode>>,
    cache: Res<SharedAssetCache>,
) {
    if keys.just_pressed(KeyCode::KeyR) {
        for key in cache.keys() {
            cache.retry(&key);
        }
    }
}


fn report_load_events(
    mut events: EventReader<SplatLoadEvent>,
) {
    for event in events.read() {
        match event {
            SplatLoadEvent::Progress { loaded_count, total_count, .. } => {
                debug!("{loaded_count} / {total_count} splats");
            }
            SplatLoadEvent::Loaded { entity, count, .. } => {
                info!("{entity} loaded {count} splats");
            }
            SplatLoadEvent::Failed { entity, loaded_count, error, .. } => {
                warn!("{entity} failed after {loaded_count} splats: {error}, press r to retry");
            }
        }
    }
}


fn viewer_app() {
    let mut config = parse_args::<SplatCompareViewer>();

    let memory = MemoryFetcher::default();
    config.left = source_key(&memory, &config.left, "random_left.splat", config.random_count);
    config.right = source_key(&memory, &config.right, "random_right.splat", config.random_count);

    let fetcher = ViewerFetcher {
        memory,
        files: FileFetcher::new(config.asset_root.clone()),
    };

    let mut app = App::new();

    #[cfg(target_arch = "wasm32")]
    let primary_window = Some(Window {
        mode: bevy::window::WindowMode::Windowed,
        present_mode: bevy::window::PresentMode::AutoVsync,
        prevent_default_event_handling: true,
        title: config.name.clone(),
        ..default()
    });

    #[cfg(not(target_arch = "wasm32"))]
    let primary_window = Some(Window {
        mode: bevy::window::WindowMode::Windowed,
        present_mode: bevy::window::PresentMode::AutoVsync,
        prevent_default_event_handling: false,
        resolution: (config.width, config.height).into(),
        title: config.name.clone(),
        ..default()
    });

    app.insert_resource(ClearColor(Color::srgb_u8(0, 0, 0)));
    app.add_plugins(
        DefaultPlugins
            .set(ImagePlugin::default_nearest())
            .set(WindowPlugin {
                primary_window,
                ..default()
            }),
    );
    app.add_plugins(BevyArgsPlugin::<SplatCompareViewer>::default());
    app.add_plugins(PanOrbitCameraPlugin);

    if config.editor {
        app.add_plugins(EguiPlugin {
            enable_multipass_for_primary_context: true,
        });
        app.add_plugins(WorldInspectorPlugin::new());
    }

    if config.press_esc_close {
        app.add_systems(Update, esc_close);
    }

    app.add_plugins(SplatComparePlugin::new(fetcher));
    app.insert_resource(config);

    app.add_systems(Startup, setup_comparison);
    app.add_systems(Update, (
        move_clip_plane,
        press_b_toggle_background,
        press_r_retry,
        report_load_events,
        preview_splats,
    ));

    app.run();
}


pub fn esc_close(
    keys: Res<ButtonInput<KeyCode>>,
    mut exit: EventWriter<AppExit>,
) {
    if keys.just_pressed(KeyCode::Escape) {
        exit.write(AppExit::Success);
    }
}


pub fn main() {
    setup_hooks();
    viewer_app();
}
