//! A walkable street with traffic that wakes up as the player approaches.
//!
//! - WASD / arrows to walk, Space to jump
//! - Mouse to look, Tab toggles mouse look, Escape releases the cursor
//! - F3 toggles the frame-time overlay
//!
//! Run with `cargo run --example scene -- --camera third-person`.

use std::{f32::consts::TAU, path::PathBuf};

use avian3d::prelude::*;
use bevy::{prelude::*, render::camera::Exposure};
use clap::{Parser, ValueEnum};
use scene_rig::*;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CameraArg {
    Head,
    Orbit,
    ThirdPerson,
}

impl From<CameraArg> for CameraPreset {
    fn from(arg: CameraArg) -> Self {
        match arg {
            CameraArg::Head => CameraPreset::HeadMounted,
            CameraArg::Orbit => CameraPreset::OrbitChase,
            CameraArg::ThirdPerson => CameraPreset::ThirdPerson,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Walk around a street of proximity-activated vehicles")]
struct Args {
    /// JSON settings file; missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the camera from the settings file.
    #[arg(long, value_enum)]
    camera: Option<CameraArg>,
    #[arg(long, default_value_t = 6)]
    vehicles: usize,
    /// Looped clip played by each vehicle, relative to the asset folder.
    #[arg(long)]
    engine_clip: Option<String>,
    /// Asset folder holding footstep_1..3.ogg, jump.ogg and land.ogg.
    #[arg(long)]
    sounds: Option<String>,
}

#[derive(Resource)]
struct SceneLayout {
    vehicles: usize,
    engine_clip: Option<String>,
    sounds: Option<String>,
    load_error: Option<ConfigError>,
}

fn main() {
    let args = Args::parse();
    let (mut settings, load_error) = match args.config.as_ref().map(SceneSettings::load) {
        Some(Ok(settings)) => (settings, None),
        Some(Err(error)) => (SceneSettings::default(), Some(error)),
        None => (SceneSettings::default(), None),
    };
    if let Some(camera) = args.camera {
        settings.apply_camera_preset(camera.into());
    }

    App::new()
        .add_plugins((
            DefaultPlugins,
            PhysicsPlugins::default(),
            bevy_framepace::FramepacePlugin,
            PerfOverlayPlugin,
            InputPlugin,
            SceneRigPlugin,
        ))
        .insert_resource(settings)
        .insert_resource(SceneLayout {
            vehicles: args.vehicles,
            engine_clip: args.engine_clip,
            sounds: args.sounds,
            load_error,
        })
        .add_systems(Startup, (report_settings, setup))
        .run();
}

fn report_settings(settings: Res<SceneSettings>, mut layout: ResMut<SceneLayout>) {
    if let Some(error) = layout.load_error.take() {
        warn!("{error}; using default settings");
    }
    if let Err(error) = settings.validate() {
        warn!("questionable settings: {error}");
    }
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    asset_server: Res<AssetServer>,
    settings: Res<SceneSettings>,
    layout: Res<SceneLayout>,
) {
    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::FULL_DAYLIGHT,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 7.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        Name::new(PLAYER_NAME),
        Player,
        RigidBody::Kinematic,
        Collider::capsule(0.4, 1.0),
        Mesh3d(meshes.add(Capsule3d::new(0.4, 1.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.5, 0.8))),
        Transform::from_xyz(0.0, 2.0, 0.0),
        GroundedLocomotion::new(settings.locomotion),
    ));

    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: TAU / 5.0,
            ..default()
        }),
        Exposure::SUNLIGHT,
        Transform::from_xyz(0.0, 4.0, 8.0),
        FollowCamera::new(settings.camera),
        LookController::new(settings.look),
    ));

    // floor
    commands.spawn((
        RigidBody::Static,
        Collider::cuboid(400.0, 1.0, 400.0),
        Mesh3d(meshes.add(Cuboid::new(400.0, 1.0, 400.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.8, 0.7, 0.6))),
        Transform::from_xyz(0.0, 0.0, 0.0),
    ));

    if let Some(folder) = &layout.sounds {
        commands.insert_resource(LocomotionSounds {
            footsteps: (1..=3)
                .map(|n| asset_server.load(format!("{folder}/footstep_{n}.ogg")))
                .collect(),
            jump: Some(asset_server.load(format!("{folder}/jump.ogg"))),
            land: Some(asset_server.load(format!("{folder}/land.ogg"))),
            ..default()
        });
    }

    let vehicle_mesh = meshes.add(Cuboid::new(2.0, 1.5, 4.0));
    let vehicle_material = materials.add(Color::srgb(0.7, 0.2, 0.2));
    let engine_clip = layout
        .engine_clip
        .as_ref()
        .map(|path| asset_server.load::<AudioSource>(path.clone()));
    for index in 0..layout.vehicles {
        let angle = index as f32 / layout.vehicles.max(1) as f32 * TAU;
        let radius = 30.0 + 15.0 * index as f32;
        let position = Vec3::new(angle.cos() * radius, 1.25, angle.sin() * radius);
        commands.spawn((
            Name::new(format!("Vehicle {index}")),
            Mesh3d(vehicle_mesh.clone()),
            MeshMaterial3d(vehicle_material.clone()),
            Transform::from_translation(position)
                .with_rotation(Quat::from_rotation_y(angle + TAU / 4.0)),
            ProximityActivator::new(settings.proximity),
            DistanceAttenuatedEmitter::new(settings.emitter, engine_clip.clone()),
        ));
    }

    // Light
    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            range: 50.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(0.0, 15.0, 0.0),
    ));
}
