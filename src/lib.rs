//! Player locomotion, follow cameras and proximity-activated background actors
//! for a small Bevy scene.
//!
//! Everything runs once per frame in [`TickSet`] order: look input, camera,
//! locomotion, proximity, audio. Later stages read what earlier ones wrote
//! in the same frame.
mod camera_plugin;
mod character_controller;
mod config;
mod diag_plugin;
mod emitter;
mod error;
mod input_plugin;
mod locator;
mod look;
mod orientation;
mod proximity;

pub use camera_plugin::*;
pub use character_controller::*;
pub use config::*;
pub use diag_plugin::*;
pub use emitter::*;
pub use error::*;
pub use input_plugin::*;
pub use locator::*;
pub use look::*;
pub use orientation::*;
pub use proximity::*;

use bevy::prelude::*;

/// Per-frame stages, run in declaration order.
#[derive(SystemSet, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickSet {
    /// Find the controlled actor and camera for anything missing one.
    Bind,
    Look,
    Camera,
    Locomotion,
    Proximity,
    Audio,
}

/// Everything except device input and diagnostics, so hosts and tests can
/// feed intents directly.
pub struct SceneRigPlugin;

impl Plugin for SceneRigPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                TickSet::Bind,
                TickSet::Look,
                TickSet::Camera,
                TickSet::Locomotion,
                TickSet::Proximity,
                TickSet::Audio,
            )
                .chain(),
        )
        .add_plugins((
            LocatorPlugin,
            LookPlugin,
            FollowCameraPlugin,
            CharacterControllerPlugin,
            ProximityPlugin,
            EmitterPlugin,
        ));
    }
}
