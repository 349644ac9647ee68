//! Background actors that wake up when the controlled actor comes near.
//!
//! Each [`ProximityActivator`] runs a two-threshold state machine on its
//! distance to the controlled actor. The gap between the activation and
//! deactivation distances is a dead band in which the state never changes,
//! so an actor parked near a single boundary does not flicker.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ControlledTarget, TickSet};

pub struct ProximityPlugin;

impl Plugin for ProximityPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ProximityEvent>().add_systems(
            Update,
            (record_origins, warn_misconfigured_activators, proximity_tick)
                .chain()
                .in_set(TickSet::Proximity),
        );
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    #[default]
    Idle,
    Moving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProximityEventKind {
    StartedMoving,
    StoppedMoving,
    Reset,
}

#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProximityEvent {
    pub actor: Entity,
    pub kind: ProximityEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    /// Forward speed while moving, in units per second.
    pub speed: f32,
    pub activation_distance: f32,
    pub deactivation_distance: f32,
    pub reset_when_far_away: bool,
    /// Distance from the origin past which the actor is teleported back.
    pub reset_distance: f32,
    pub show_debug_info: bool,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            speed: 5.0,
            activation_distance: 50.0,
            deactivation_distance: 70.0,
            reset_when_far_away: true,
            reset_distance: 100.0,
            show_debug_info: false,
        }
    }
}

impl ProximitySettings {
    /// An inverted band still runs, it just degrades to a single threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deactivation_distance < self.activation_distance {
            return Err(ConfigError::InvertedHysteresis {
                activation: self.activation_distance,
                deactivation: self.deactivation_distance,
            });
        }
        for (field, value) in [("speed", self.speed), ("reset_distance", self.reset_distance)] {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        Ok(())
    }
}

/// Spawn position, captured once on the first tick.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Origin(pub Vec3);

#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
#[require(ControlledTarget, Transform)]
pub struct ProximityActivator {
    pub settings: ProximitySettings,
    pub state: ActivationState,
    /// Distance to the controlled actor measured this tick, if one is bound.
    pub distance: Option<f32>,
}

impl ProximityActivator {
    pub fn new(settings: ProximitySettings) -> Self {
        Self {
            settings,
            ..default()
        }
    }

    pub fn is_moving(&self) -> bool {
        self.state == ActivationState::Moving
    }

    /// Applies the hysteresis rule and reports the transition, if any.
    pub fn evaluate(&mut self, distance: f32) -> Option<ProximityEventKind> {
        self.distance = Some(distance);
        let settings = &self.settings;
        match self.state {
            ActivationState::Idle if distance <= settings.activation_distance => {
                self.state = ActivationState::Moving;
                Some(ProximityEventKind::StartedMoving)
            }
            ActivationState::Moving if distance > settings.deactivation_distance => {
                self.state = ActivationState::Idle;
                Some(ProximityEventKind::StoppedMoving)
            }
            _ => None,
        }
    }

    /// Forward travel for this tick along the actor's own facing.
    pub fn travel(&self, facing: Dir3, dt: f32) -> Vec3 {
        if self.is_moving() {
            facing * self.settings.speed * dt
        } else {
            Vec3::ZERO
        }
    }

    pub fn strayed(&self, position: Vec3, origin: Vec3) -> bool {
        self.settings.reset_when_far_away
            && position.distance(origin) > self.settings.reset_distance
    }
}

fn record_origins(
    mut commands: Commands,
    query: Query<(Entity, &Transform), (With<ProximityActivator>, Without<Origin>)>,
) {
    for (entity, transform) in &query {
        commands.entity(entity).insert(Origin(transform.translation));
    }
}

fn warn_misconfigured_activators(
    query: Query<(Entity, &ProximityActivator), Added<ProximityActivator>>,
) {
    for (entity, activator) in &query {
        if let Err(error) = activator.settings.validate() {
            warn!(?entity, %error, "proximity activator misconfigured");
        }
    }
}

pub fn proximity_tick(
    time: Res<Time>,
    mut actors: Query<(
        Entity,
        &mut Transform,
        &mut ProximityActivator,
        &ControlledTarget,
        Option<&Origin>,
    )>,
    targets: Query<&Transform, Without<ProximityActivator>>,
    mut events: EventWriter<ProximityEvent>,
) {
    let dt = time.delta_secs();
    for (entity, mut transform, mut activator, target, origin) in &mut actors {
        let Some(target_position) = target.get().and_then(|e| targets.get(e).ok()) else {
            activator.distance = None;
            continue;
        };
        let distance = transform.translation.distance(target_position.translation);

        if let Some(kind) = activator.evaluate(distance) {
            info!(?entity, ?kind, distance, "activation changed");
            events.write(ProximityEvent {
                actor: entity,
                kind,
            });
        }

        let travel = activator.travel(transform.forward(), dt);
        transform.translation += travel;

        if let Some(Origin(origin)) = origin.copied() {
            if activator.strayed(transform.translation, origin) {
                transform.translation = origin;
                if activator.settings.show_debug_info {
                    debug!(?entity, "reset to starting position");
                }
                events.write(ProximityEvent {
                    actor: entity,
                    kind: ProximityEventKind::Reset,
                });
            }
        }

        if activator.settings.show_debug_info {
            debug!(?entity, distance, moving = activator.is_moving(), "proximity");
        }
    }
}
