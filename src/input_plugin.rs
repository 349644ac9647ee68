use bevy::{
    input::{InputSystem, mouse::MouseMotion},
    prelude::*,
};

use crate::{GroundedLocomotion, LocomotionIntent, LookInput};

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreUpdate, (keyboard_input, pointer_input).after(InputSystem));
    }
}

/// Samples movement keys into every [`LocomotionIntent`].
fn keyboard_input(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut query: Query<&mut LocomotionIntent, With<GroundedLocomotion>>,
) {
    let up = keyboard_input.any_pressed([KeyCode::KeyW, KeyCode::ArrowUp]);
    let down = keyboard_input.any_pressed([KeyCode::KeyS, KeyCode::ArrowDown]);
    let left = keyboard_input.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]);
    let right = keyboard_input.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]);

    let strafe = right as i8 - left as i8;
    let forward = up as i8 - down as i8;

    for mut intent in &mut query {
        *intent = LocomotionIntent {
            forward: forward as f32,
            strafe: strafe as f32,
            jump: keyboard_input.just_pressed(KeyCode::Space),
        };
    }
}

/// Sends pointer motion and the look toggles to every [`LookInput`].
fn pointer_input(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut mouse_events: EventReader<MouseMotion>,
    mut query: Query<&mut LookInput>,
) {
    let mut pointer_delta = Vec2::ZERO;
    for mouse_event in mouse_events.read() {
        pointer_delta += mouse_event.delta;
    }

    for mut input in &mut query {
        *input = LookInput {
            pointer_delta,
            toggle: keyboard_input.just_pressed(KeyCode::Tab),
            cancel: keyboard_input.just_pressed(KeyCode::Escape),
        };
    }
}
