use std::path::PathBuf;

use thiserror::Error;

/// Problems found while loading or validating scene settings.
///
/// None of these stop the scene: a component with a bad setting still runs,
/// degraded, and the problem is logged when it spawns.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings")]
    Parse(#[from] serde_json::Error),
    #[error(
        "deactivation distance {deactivation} is below activation distance {activation}; \
         the activator will flicker at a single threshold"
    )]
    InvertedHysteresis { activation: f32, deactivation: f32 },
    #[error("audio range [{min}, {max}] is empty; gain jumps straight from full to silent")]
    DegenerateAudioRange { min: f32, max: f32 },
    #[error("max volume {0} is outside [0, 1]")]
    VolumeOutOfRange(f32),
    #[error("gravity {0} does not point down")]
    UpwardGravity(f32),
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f32 },
}
