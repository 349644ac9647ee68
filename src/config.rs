use std::{fs, path::Path};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    CameraPreset, ConfigError, EmitterSettings, FollowConfig, LocomotionSettings, LookSettings,
    ProximitySettings,
};

/// Settings for one scene: the player rig plus the template every
/// background vehicle is spawned from. Missing keys keep their defaults,
/// which are the [`CameraPreset::OrbitChase`] rig. A `camera_preset` key
/// replaces `camera` and the look pitch limits with that preset's.
///
/// ```
/// use scene_rig::SceneSettings;
///
/// let settings = SceneSettings::from_json_str(r#"{ "proximity": { "speed": 8.0 } }"#).unwrap();
/// assert_eq!(settings.proximity.speed, 8.0);
/// assert_eq!(settings.proximity.activation_distance, 50.0);
/// ```
#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub camera_preset: Option<CameraPreset>,
    pub look: LookSettings,
    pub camera: FollowConfig,
    pub locomotion: LocomotionSettings,
    pub proximity: ProximitySettings,
    pub emitter: EmitterSettings,
}

impl Default for SceneSettings {
    fn default() -> Self {
        let mut settings = Self {
            camera_preset: None,
            look: LookSettings::default(),
            camera: FollowConfig::default(),
            locomotion: LocomotionSettings::default(),
            proximity: ProximitySettings::default(),
            emitter: EmitterSettings::default(),
        };
        settings.apply_camera_preset(CameraPreset::default());
        settings
    }
}

impl SceneSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = serde_json::from_str(json)?;
        if let Some(preset) = settings.camera_preset {
            settings.apply_camera_preset(preset);
        }
        Ok(settings)
    }

    /// Switches the camera rig, keeping sensitivity and the look switch.
    pub fn apply_camera_preset(&mut self, preset: CameraPreset) {
        let (pitch_min, pitch_max) = preset.pitch_limits();
        self.camera = preset.follow_config();
        self.look.pitch_min = pitch_min;
        self.look.pitch_max = pitch_max;
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// First problem found, if any. Loading never rejects a file for these.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.locomotion.validate()?;
        self.proximity.validate()?;
        self.emitter.validate()
    }
}
