use bevy::{
    prelude::*,
    window::{CursorGrabMode, PrimaryWindow},
};
use serde::{Deserialize, Serialize};

use crate::{ClampedOrientation, TickSet};

pub struct LookPlugin;

impl Plugin for LookPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PointerCaptureRequest>()
            .add_systems(
                Update,
                (request_initial_capture, look_update)
                    .chain()
                    .in_set(TickSet::Look),
            )
            .add_systems(PostUpdate, apply_pointer_capture);
    }
}

/// Asks the host to capture (lock and hide) or release the pointer.
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerCaptureRequest {
    pub captured: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookMode {
    /// Pointer captured, deltas rotate the view.
    Active,
    /// Pointer released, deltas are ignored.
    Released,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookSettings {
    /// Degrees per pointer unit.
    pub sensitivity: f32,
    pub pitch_min: f32,
    pub pitch_max: f32,
    /// When false the controller never reacts to the pointer.
    pub enabled: bool,
}

impl Default for LookSettings {
    fn default() -> Self {
        Self {
            sensitivity: 0.1,
            pitch_min: -90.0,
            pitch_max: 90.0,
            enabled: true,
        }
    }
}

/// Per-frame look input, filled by the input layer.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct LookInput {
    pub pointer_delta: Vec2,
    pub toggle: bool,
    pub cancel: bool,
}

/// Pointer-driven view rotation with a capture toggle.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
#[require(LookInput)]
pub struct LookController {
    pub mode: LookMode,
    pub orientation: ClampedOrientation,
    pub settings: LookSettings,
    seeded: bool,
}

impl LookController {
    pub fn new(settings: LookSettings) -> Self {
        Self {
            mode: LookMode::Active,
            orientation: ClampedOrientation::new(settings.pitch_min, settings.pitch_max),
            settings,
            seeded: false,
        }
    }

    /// Starts from `rotation` instead of looking straight ahead.
    pub fn seeded_from(settings: LookSettings, rotation: Quat) -> Self {
        Self {
            orientation: ClampedOrientation::from_rotation(
                rotation,
                settings.pitch_min,
                settings.pitch_max,
            ),
            seeded: true,
            ..Self::new(settings)
        }
    }

    pub fn is_active(&self) -> bool {
        self.settings.enabled && self.mode == LookMode::Active
    }

    /// Flips between captured and released look and returns the capture
    /// request the host should apply.
    pub fn toggle(&mut self) -> PointerCaptureRequest {
        self.mode = match self.mode {
            LookMode::Active => LookMode::Released,
            LookMode::Released => LookMode::Active,
        };
        PointerCaptureRequest {
            captured: self.mode == LookMode::Active,
        }
    }

    /// Releases the pointer unconditionally. Idempotent.
    pub fn force_release(&mut self) -> PointerCaptureRequest {
        self.mode = LookMode::Released;
        PointerCaptureRequest { captured: false }
    }

    pub fn tick(&mut self, pointer_delta_x: f32, pointer_delta_y: f32, sensitivity: f32) {
        if !self.is_active() {
            return;
        }
        self.orientation
            .accumulate(pointer_delta_x * sensitivity, pointer_delta_y * sensitivity);
    }
}

impl Default for LookController {
    fn default() -> Self {
        Self::new(LookSettings::default())
    }
}

/// Seeds unseeded controllers from their transform and captures the pointer
/// for the ones that start active.
fn request_initial_capture(
    mut query: Query<(&mut LookController, &Transform), Added<LookController>>,
    mut capture: EventWriter<PointerCaptureRequest>,
) {
    for (mut controller, transform) in &mut query {
        if !controller.seeded {
            let settings = controller.settings;
            controller.orientation = ClampedOrientation::from_rotation(
                transform.rotation,
                settings.pitch_min,
                settings.pitch_max,
            );
            controller.seeded = true;
        }
        if controller.is_active() {
            capture.write(PointerCaptureRequest { captured: true });
        }
    }
}

pub fn look_update(
    mut query: Query<(&mut LookController, &LookInput)>,
    mut capture: EventWriter<PointerCaptureRequest>,
) {
    for (mut controller, input) in &mut query {
        if !controller.settings.enabled {
            continue;
        }
        if input.toggle {
            let request = controller.toggle();
            info!(captured = request.captured, "mouse look toggled");
            capture.write(request);
        }
        if input.cancel {
            capture.write(controller.force_release());
        }
        let sensitivity = controller.settings.sensitivity;
        controller.tick(input.pointer_delta.x, input.pointer_delta.y, sensitivity);
    }
}

fn apply_pointer_capture(
    mut requests: EventReader<PointerCaptureRequest>,
    mut window_query: Query<&mut Window, With<PrimaryWindow>>,
) {
    let Some(request) = requests.read().last().copied() else {
        return;
    };
    for mut window in &mut window_query {
        if request.captured {
            window.cursor_options.grab_mode = CursorGrabMode::Locked;
            window.cursor_options.visible = false;
        } else {
            window.cursor_options.grab_mode = CursorGrabMode::None;
            window.cursor_options.visible = true;
        }
    }
}
