use bevy::{ecs::system::SystemParam, prelude::*};

use crate::{FollowCamera, GroundedLocomotion, TickSet};

/// Name searched for when no entity carries the [`Player`] tag.
pub const PLAYER_NAME: &str = "Player";

pub struct LocatorPlugin;

impl Plugin for LocatorPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (bind_controlled_targets, bind_view_cameras).in_set(TickSet::Bind),
        );
    }
}

/// Tag for the actor the player controls.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Player;

/// The controlled actor a follower reads from, once found.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlledTarget(pub Option<Entity>);

impl ControlledTarget {
    pub fn get(&self) -> Option<Entity> {
        self.0
    }
}

/// The camera whose facing drives a locomotion basis, once found.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewCamera(pub Option<Entity>);

/// Finds the controlled actor: tagged first, then by name, then any entity
/// running a [`GroundedLocomotion`].
#[derive(SystemParam)]
pub struct ActorLocator<'w, 's> {
    tagged: Query<'w, 's, Entity, With<Player>>,
    named: Query<'w, 's, (Entity, &'static Name)>,
    controllers: Query<'w, 's, Entity, With<GroundedLocomotion>>,
}

impl ActorLocator<'_, '_> {
    pub fn find_controlled_actor(&self) -> Option<Entity> {
        self.tagged
            .iter()
            .next()
            .or_else(|| {
                self.named
                    .iter()
                    .find(|(_, name)| name.as_str() == PLAYER_NAME)
                    .map(|(entity, _)| entity)
            })
            .or_else(|| self.controllers.iter().next())
    }
}

/// Fills every empty [`ControlledTarget`] and drops targets that no longer
/// exist, so followers retry discovery on the next tick.
pub fn bind_controlled_targets(
    locator: ActorLocator,
    mut followers: Query<(Entity, &mut ControlledTarget)>,
    entities: Query<Entity>,
    mut missing_reported: Local<bool>,
) {
    let mut found = None;
    for (follower, mut target) in &mut followers {
        if let Some(current) = target.0 {
            if entities.contains(current) {
                continue;
            }
            debug!(?follower, ?current, "controlled actor vanished");
            target.0 = None;
        }
        if found.is_none() {
            found = locator.find_controlled_actor();
        }
        match found {
            Some(actor) if actor != follower => {
                target.0 = Some(actor);
                *missing_reported = false;
                info!(?follower, ?actor, "bound controlled actor");
            }
            _ => {
                if !*missing_reported {
                    warn!("no controlled actor found; followers idle until one appears");
                    *missing_reported = true;
                }
            }
        }
    }
}

/// Binds each locomotion to the follow camera, or to any camera as a fallback.
pub fn bind_view_cameras(
    mut walkers: Query<&mut ViewCamera>,
    follow_cameras: Query<Entity, (With<Camera>, With<FollowCamera>)>,
    cameras: Query<Entity, With<Camera>>,
) {
    for mut view in &mut walkers {
        if view.0.is_some_and(|camera| cameras.contains(camera)) {
            continue;
        }
        view.0 = follow_cameras
            .iter()
            .next()
            .or_else(|| cameras.iter().next());
    }
}
