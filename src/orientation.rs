use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Yaw/pitch accumulator in degrees with a clamped pitch.
///
/// Yaw is a compass heading: positive turns to the right when seen from above.
/// Pitch is positive when looking up. Yaw is never wrapped, use
/// [`ClampedOrientation::display_yaw`] when a bounded value is needed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClampedOrientation {
    pub yaw: f32,
    pub pitch: f32,
    pub pitch_min: f32,
    pub pitch_max: f32,
}

impl Default for ClampedOrientation {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            pitch_min: -90.0,
            pitch_max: 90.0,
        }
    }
}

impl ClampedOrientation {
    pub fn new(pitch_min: f32, pitch_max: f32) -> Self {
        Self {
            pitch_min,
            pitch_max,
            ..default()
        }
    }

    /// Seeds yaw and pitch from an existing rotation so the first frame does
    /// not snap. Roll is discarded.
    pub fn from_rotation(rotation: Quat, pitch_min: f32, pitch_max: f32) -> Self {
        let (yaw, pitch, _) = rotation.to_euler(EulerRot::YXZ);
        let mut orientation = Self {
            yaw: -yaw.to_degrees(),
            pitch: pitch.to_degrees(),
            pitch_min,
            pitch_max,
        };
        orientation.clamp_pitch();
        orientation
    }

    /// Adds `delta_yaw` to yaw and subtracts `delta_pitch` from pitch, so a
    /// positive pointer-Y delta looks down.
    pub fn accumulate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch -= delta_pitch;
        self.clamp_pitch();
    }

    fn clamp_pitch(&mut self) {
        // `f32::clamp` panics on min > max, a misconfigured range pins to max instead.
        self.pitch = self.pitch.max(self.pitch_min).min(self.pitch_max);
    }

    /// Yaw folded into `[0, 360)`. Display only.
    pub fn display_yaw(&self) -> f32 {
        self.yaw.rem_euclid(360.0)
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            -self.yaw.to_radians(),
            self.pitch.to_radians(),
            0.0,
        )
    }
}
