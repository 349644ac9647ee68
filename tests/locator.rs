//! Discovery of the controlled actor and the view camera.

mod common;

use bevy::prelude::*;
use common::*;
use scene_rig::*;

fn follower(app: &mut App) -> Entity {
    app.world_mut().spawn(ProximityActivator::default()).id()
}

fn bound(app: &App, follower: Entity) -> Option<Entity> {
    app.world().get::<ControlledTarget>(follower).unwrap().get()
}

#[test]
fn tag_wins_over_name_and_controller() {
    let mut app = rig_app();
    app.world_mut()
        .spawn((GroundedLocomotion::default(), Transform::default()));
    app.world_mut()
        .spawn((Name::new(PLAYER_NAME), Transform::default()));
    let tagged = spawn_player(&mut app, Vec3::ZERO);
    let follower = follower(&mut app);

    app.update();

    assert_eq!(bound(&app, follower), Some(tagged));
}

#[test]
fn name_is_the_first_fallback() {
    let mut app = rig_app();
    app.world_mut()
        .spawn((GroundedLocomotion::default(), Transform::default()));
    app.world_mut().spawn((Name::new("Traffic"), Transform::default()));
    let named = app
        .world_mut()
        .spawn((Name::new(PLAYER_NAME), Transform::default()))
        .id();
    let follower = follower(&mut app);

    app.update();

    assert_eq!(bound(&app, follower), Some(named));
}

#[test]
fn any_locomotion_is_the_last_fallback() {
    let mut app = rig_app();
    let walker = app.world_mut().spawn(GroundedLocomotion::default()).id();
    let follower = follower(&mut app);

    app.update();

    assert_eq!(bound(&app, follower), Some(walker));
}

#[test]
fn late_actor_is_picked_up_and_a_despawned_one_released() {
    let mut app = rig_app();
    let follower = follower(&mut app);

    app.update();
    assert_eq!(bound(&app, follower), None);

    let first = spawn_player(&mut app, Vec3::ZERO);
    app.update();
    assert_eq!(bound(&app, follower), Some(first));

    app.world_mut().despawn(first);
    app.update();
    assert_eq!(bound(&app, follower), None);

    let second = spawn_player(&mut app, Vec3::ZERO);
    app.update();
    assert_eq!(bound(&app, follower), Some(second));
}

#[test]
fn locomotion_prefers_the_follow_camera() {
    let mut app = rig_app();
    app.world_mut().spawn(Camera::default());
    let follow = app
        .world_mut()
        .spawn((Camera::default(), FollowCamera::default()))
        .id();
    let walker = app.world_mut().spawn(GroundedLocomotion::default()).id();

    app.update();

    let view = app.world().get::<ViewCamera>(walker).unwrap();
    assert_eq!(view.0, Some(follow));
}
