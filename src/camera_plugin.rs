use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{ClampedOrientation, ControlledTarget, LookController, TickSet};

pub struct FollowCameraPlugin;

impl Plugin for FollowCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, follow_camera.in_set(TickSet::Camera));
    }
}

/// How the offset is attached to the target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FollowMode {
    /// Offset added unrotated; the camera faces wherever the look points.
    RigidOffset,
    /// Offset rotated by the look orientation, swinging around the target.
    OrbitOffset {
        /// Aim at `target + up * aim_height` instead of facing the look direction.
        look_at_target: bool,
        aim_height: f32,
        /// Pins the desired height to `target.y + h`, ignoring pitch.
        level_height: Option<f32>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Smoothing {
    None,
    /// Exponential approach with the given rate per second.
    Exponential(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    pub offset: Vec3,
    pub mode: FollowMode,
    pub smoothing: Smoothing,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self::orbit_chase()
    }
}

impl FollowConfig {
    /// Eye-height camera riding the target's head.
    pub fn head_mounted() -> Self {
        Self {
            offset: Vec3::new(0.0, 1.8, 0.0),
            mode: FollowMode::RigidOffset,
            smoothing: Smoothing::None,
        }
    }

    /// Camera swung around the target by the look, facing the look direction.
    pub fn orbit_chase() -> Self {
        Self {
            offset: Vec3::new(0.0, 4.0, -1.0),
            mode: FollowMode::OrbitOffset {
                look_at_target: false,
                aim_height: 0.0,
                level_height: None,
            },
            smoothing: Smoothing::Exponential(10.0),
        }
    }

    /// Chase camera behind the target at a held height, always aiming at it.
    pub fn third_person() -> Self {
        let height = 5.0;
        Self {
            offset: Vec3::new(0.0, 0.0, 7.0),
            mode: FollowMode::OrbitOffset {
                look_at_target: true,
                aim_height: height * 0.5,
                level_height: Some(height),
            },
            smoothing: Smoothing::Exponential(10.0),
        }
    }

    pub fn desired_position(&self, target: Vec3, orientation: &ClampedOrientation) -> Vec3 {
        match self.mode {
            FollowMode::RigidOffset => target + self.offset,
            FollowMode::OrbitOffset { level_height, .. } => {
                let mut desired = target + orientation.rotation() * self.offset;
                if let Some(height) = level_height {
                    desired.y = target.y + height;
                }
                desired
            }
        }
    }

    pub fn rotation(&self, position: Vec3, target: Vec3, orientation: &ClampedOrientation) -> Quat {
        match self.mode {
            FollowMode::OrbitOffset {
                look_at_target: true,
                aim_height,
                ..
            } => {
                let aim = target + Vec3::Y * aim_height;
                if aim.distance_squared(position) <= f32::EPSILON {
                    return orientation.rotation();
                }
                Transform::from_translation(position)
                    .looking_at(aim, Vec3::Y)
                    .rotation
            }
            _ => orientation.rotation(),
        }
    }
}

/// A named rig: follow config plus the pitch range it is meant for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraPreset {
    HeadMounted,
    #[default]
    OrbitChase,
    ThirdPerson,
}

impl CameraPreset {
    pub fn follow_config(self) -> FollowConfig {
        match self {
            Self::HeadMounted => FollowConfig::head_mounted(),
            Self::OrbitChase => FollowConfig::orbit_chase(),
            Self::ThirdPerson => FollowConfig::third_person(),
        }
    }

    /// `(min, max)` pitch in degrees. Orbiting rigs stop short of flipping
    /// over or under the target.
    pub fn pitch_limits(self) -> (f32, f32) {
        match self {
            Self::HeadMounted => (-90.0, 90.0),
            Self::OrbitChase | Self::ThirdPerson => (-30.0, 60.0),
        }
    }
}

/// Moves `current` toward `desired`. Exponential smoothing never overshoots.
pub fn apply_motion(current: Vec3, desired: Vec3, smoothing: Smoothing, dt: f32) -> Vec3 {
    match smoothing {
        Smoothing::None => desired,
        Smoothing::Exponential(rate) => {
            let blend = 1.0 - (-(rate * dt).max(0.0)).exp();
            current + (desired - current) * blend
        }
    }
}

/// A camera following the controlled actor.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
#[require(ControlledTarget, LookController)]
pub struct FollowCamera {
    pub config: FollowConfig,
}

impl FollowCamera {
    pub fn new(config: FollowConfig) -> Self {
        Self { config }
    }
}

pub fn follow_camera(
    time: Res<Time>,
    mut cameras: Query<(&mut Transform, &FollowCamera, &LookController, &ControlledTarget)>,
    targets: Query<&Transform, Without<FollowCamera>>,
) {
    let dt = time.delta_secs();
    for (mut transform, camera, look, target) in &mut cameras {
        let Some(target_position) = target.get().and_then(|e| targets.get(e).ok()) else {
            continue;
        };
        let target_position = target_position.translation;
        let config = camera.config;
        let desired = config.desired_position(target_position, &look.orientation);
        transform.translation = apply_motion(transform.translation, desired, config.smoothing, dt);
        transform.rotation =
            config.rotation(transform.translation, target_position, &look.orientation);
    }
}
