//! Shared helpers for driving the scene rig headlessly.
#![allow(dead_code)]

use std::time::Duration;

use bevy::{prelude::*, time::TimeUpdateStrategy};
use scene_rig::*;

/// Fixed frame time. The first update after startup always has a zero delta.
pub const FRAME: Duration = Duration::from_millis(125);

/// Headless app with the full rig, a fixed frame time and the given events
/// recorded.
pub fn rig_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME))
        .add_plugins(SceneRigPlugin);
    record::<ProximityEvent>(&mut app);
    record::<LocomotionEvent>(&mut app);
    record::<PointerCaptureRequest>(&mut app);
    app
}

/// Every `E` written so far, oldest first.
#[derive(Resource)]
pub struct Recorded<E>(pub Vec<E>);

impl<E> Default for Recorded<E> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

fn record_events<E: Event + Clone>(mut reader: EventReader<E>, mut recorded: ResMut<Recorded<E>>) {
    recorded.0.extend(reader.read().cloned());
}

pub fn record<E: Event + Clone>(app: &mut App) {
    app.init_resource::<Recorded<E>>()
        .add_systems(Last, record_events::<E>);
}

pub fn recorded<E: Event + Clone>(app: &App) -> &[E] {
    &app.world().resource::<Recorded<E>>().0
}

pub fn take_recorded<E: Event + Clone>(app: &mut App) -> Vec<E> {
    std::mem::take(&mut app.world_mut().resource_mut::<Recorded<E>>().0)
}

pub fn spawn_player(app: &mut App, position: Vec3) -> Entity {
    app.world_mut()
        .spawn((Player, Transform::from_translation(position)))
        .id()
}

pub fn set_translation(app: &mut App, entity: Entity, position: Vec3) {
    app.world_mut()
        .get_mut::<Transform>(entity)
        .expect("entity has a transform")
        .translation = position;
}

pub fn translation(app: &App, entity: Entity) -> Vec3 {
    app.world()
        .get::<Transform>(entity)
        .expect("entity has a transform")
        .translation
}

pub fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}
