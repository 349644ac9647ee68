use avian3d::prelude::*;
use bevy::{audio::Volume, prelude::*};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, TickSet, ViewCamera};

/// Drives camera-relative walking, jumping and footstep cadence for every
/// [`GroundedLocomotion`]. Runs in [`TickSet::Locomotion`], after the camera
/// has taken this frame's look.
pub struct CharacterControllerPlugin;

impl Plugin for CharacterControllerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<LocomotionEvent>()
            .add_systems(
                Update,
                (probe_ground, locomotion_tick)
                    .chain()
                    .in_set(TickSet::Locomotion),
            )
            .add_systems(Update, play_locomotion_sounds.in_set(TickSet::Audio));
    }
}

/// Input magnitude below which an axis counts as idle.
pub const INPUT_DEADZONE: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionSettings {
    pub move_speed: f32,
    pub jump_height: f32,
    /// Vertical acceleration, negative is down.
    pub gravity: f32,

    /// Probe centre relative to the actor.
    pub probe_offset: Vec3,
    pub probe_radius: f32,
    /// Collision layers the probe counts as ground.
    pub ground_layers: u32,
    /// Vertical velocity held while standing, keeps the probe in contact.
    pub grounded_velocity: f32,

    /// Rate of the facing slerp toward the movement direction.
    pub turn_rate: f32,
    pub footstep_interval: f32,
}

impl Default for LocomotionSettings {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            jump_height: 2.0,
            gravity: -9.81,
            probe_offset: Vec3::new(0.0, -1.0, 0.0),
            probe_radius: 0.4,
            ground_layers: LayerMask::ALL.0,
            grounded_velocity: -2.0,
            turn_rate: 10.0,
            footstep_interval: 0.5,
        }
    }
}

impl LocomotionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gravity >= 0.0 {
            return Err(ConfigError::UpwardGravity(self.gravity));
        }
        for (field, value) in [
            ("move_speed", self.move_speed),
            ("jump_height", self.jump_height),
            ("probe_radius", self.probe_radius),
            ("turn_rate", self.turn_rate),
            ("footstep_interval", self.footstep_interval),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        Ok(())
    }

    /// Launch speed reaching `jump_height` under `gravity`.
    pub fn jump_velocity(&self) -> f32 {
        (self.jump_height * -2.0 * self.gravity).max(0.0).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocomotionState {
    pub vertical_velocity: f32,
    pub is_grounded: bool,
    pub was_grounded: bool,
    pub footstep_cooldown: f32,
}

/// Per-frame movement input, filled by the input layer.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct LocomotionIntent {
    /// Forward axis in `[-1, 1]`.
    pub forward: f32,
    /// Strafe axis in `[-1, 1]`, positive is right.
    pub strafe: f32,
    /// Jump pressed this frame.
    pub jump: bool,
}

impl LocomotionIntent {
    pub fn is_moving(&self) -> bool {
        self.forward.abs() > INPUT_DEADZONE || self.strafe.abs() > INPUT_DEADZONE
    }
}

/// Latest ground probe result.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroundContact(pub bool);

#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
#[require(LocomotionIntent, GroundContact, ViewCamera, Transform)]
pub struct GroundedLocomotion {
    pub settings: LocomotionSettings,
    pub state: LocomotionState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocomotionEventKind {
    Landed,
    Jumped,
    Footstep,
}

#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocomotionEvent {
    pub actor: Entity,
    pub kind: LocomotionEventKind,
}

/// Horizontal movement axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementBasis {
    pub forward: Vec3,
    pub right: Vec3,
}

impl MovementBasis {
    pub const WORLD: Self = Self {
        forward: Vec3::NEG_Z,
        right: Vec3::X,
    };

    /// Camera forward/right flattened onto the ground plane. A camera looking
    /// straight up or down has no horizontal forward and yields [`Self::WORLD`].
    pub fn from_camera(rotation: Quat) -> Self {
        let flatten = |v: Vec3| Vec3::new(v.x, 0.0, v.z).try_normalize();
        match (
            flatten(rotation * Vec3::NEG_Z),
            flatten(rotation * Vec3::X),
        ) {
            (Some(forward), Some(right)) => Self { forward, right },
            _ => Self::WORLD,
        }
    }
}

/// Everything one tick wants applied to the actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocomotionStep {
    pub translation: Vec3,
    pub rotation: Quat,
    pub landed: bool,
    pub jumped: bool,
    pub footstep: bool,
}

impl LocomotionStep {
    pub fn events(&self) -> impl Iterator<Item = LocomotionEventKind> {
        [
            (self.landed, LocomotionEventKind::Landed),
            (self.footstep, LocomotionEventKind::Footstep),
            (self.jumped, LocomotionEventKind::Jumped),
        ]
        .into_iter()
        .filter_map(|(fired, kind)| fired.then_some(kind))
    }
}

// ██╗      ██████╗  ██████╗ ██╗ ██████╗
// ██║     ██╔═══██╗██╔════╝ ██║██╔════╝
// ██║     ██║   ██║██║  ███╗██║██║
// ██║     ██║   ██║██║   ██║██║██║
// ███████╗╚██████╔╝╚██████╔╝██║╚██████╗
// ╚══════╝ ╚═════╝  ╚═════╝ ╚═╝ ╚═════╝

impl GroundedLocomotion {
    pub fn new(settings: LocomotionSettings) -> Self {
        Self {
            settings,
            state: LocomotionState::default(),
        }
    }

    /// Advances one tick. `grounded` is this tick's probe sample and
    /// `rotation` the actor's current facing.
    pub fn step(
        &mut self,
        grounded: bool,
        intent: &LocomotionIntent,
        basis: MovementBasis,
        rotation: Quat,
        dt: f32,
    ) -> LocomotionStep {
        let settings = self.settings;
        let state = &mut self.state;

        state.was_grounded = state.is_grounded;
        state.is_grounded = grounded;
        let landed = state.is_grounded && !state.was_grounded;

        if state.is_grounded && state.vertical_velocity < 0.0 {
            state.vertical_velocity = settings.grounded_velocity;
        }

        let direction = basis.forward * intent.forward + basis.right * intent.strafe;
        let mut translation = Vec3::ZERO;
        let mut facing = rotation;
        if direction.length() >= INPUT_DEADZONE {
            translation += direction * settings.move_speed * dt;
            // Zero direction has no look rotation
            if let Ok(heading) = Dir3::new(direction) {
                let target = Transform::IDENTITY.looking_to(heading, Vec3::Y).rotation;
                facing = rotation.slerp(target, (settings.turn_rate * dt).clamp(0.0, 1.0));
            }
        }

        let mut footstep = false;
        if intent.is_moving() && state.is_grounded {
            state.footstep_cooldown -= dt;
            if state.footstep_cooldown <= 0.0 {
                footstep = true;
                state.footstep_cooldown = settings.footstep_interval;
            }
        } else {
            state.footstep_cooldown = 0.0;
        }

        let jumped = intent.jump && state.is_grounded;
        if jumped {
            state.vertical_velocity = settings.jump_velocity();
        }

        state.vertical_velocity += settings.gravity * dt;
        translation.y += state.vertical_velocity * dt;

        LocomotionStep {
            translation,
            rotation: facing,
            landed,
            jumped,
            footstep,
        }
    }
}

/// Ground contact query used by the locomotion probe.
pub trait GroundProbe {
    fn query_contact(&self, position: Vec3, radius: f32, mask: LayerMask) -> bool;
}

/// Sphere-overlap probe against the physics world, ignoring the actor itself.
pub struct SpatialGroundProbe<'a> {
    pub pipeline: &'a SpatialQueryPipeline,
    pub actor: Entity,
}

impl GroundProbe for SpatialGroundProbe<'_> {
    fn query_contact(&self, position: Vec3, radius: f32, mask: LayerMask) -> bool {
        let filter = SpatialQueryFilter::from_mask(mask).with_excluded_entities([self.actor]);
        !self
            .pipeline
            .shape_intersections(&Collider::sphere(radius), position, Quat::IDENTITY, &filter)
            .is_empty()
    }
}

/// Infinite horizontal plane. Overrides the physics probe when inserted as a
/// resource so the controller can be driven without a physics world.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct FlatGround {
    pub height: f32,
}

impl GroundProbe for FlatGround {
    fn query_contact(&self, position: Vec3, radius: f32, _mask: LayerMask) -> bool {
        position.y - radius <= self.height
    }
}

pub fn probe_ground(
    pipeline: Option<Res<SpatialQueryPipeline>>,
    flat: Option<Res<FlatGround>>,
    mut query: Query<(Entity, &Transform, &GroundedLocomotion, &mut GroundContact)>,
) {
    for (entity, transform, locomotion, mut contact) in &mut query {
        let settings = &locomotion.settings;
        let origin = transform.translation + transform.rotation * settings.probe_offset;
        let mask = LayerMask(settings.ground_layers);
        contact.0 = match (flat.as_deref(), pipeline.as_deref()) {
            (Some(flat), _) => flat.query_contact(origin, settings.probe_radius, mask),
            (None, Some(pipeline)) => SpatialGroundProbe {
                pipeline,
                actor: entity,
            }
            .query_contact(origin, settings.probe_radius, mask),
            (None, None) => false,
        };
    }
}

pub fn locomotion_tick(
    time: Res<Time>,
    pipeline: Option<Res<SpatialQueryPipeline>>,
    mut walkers: Query<(
        Entity,
        &mut Transform,
        &mut GroundedLocomotion,
        &LocomotionIntent,
        &GroundContact,
        &ViewCamera,
        Option<&Collider>,
    )>,
    cameras: Query<&Transform, (With<Camera>, Without<GroundedLocomotion>)>,
    mut events: EventWriter<LocomotionEvent>,
) {
    let dt = time.delta_secs();
    for (entity, mut transform, mut locomotion, intent, contact, view, collider) in &mut walkers {
        let basis = view
            .0
            .and_then(|camera| cameras.get(camera).ok())
            .map_or(MovementBasis::WORLD, |camera| {
                MovementBasis::from_camera(camera.rotation)
            });

        let step = locomotion.step(contact.0, intent, basis, transform.rotation, dt);

        let delta = match (pipeline.as_deref(), collider) {
            (Some(pipeline), Some(collider)) => {
                blocked_move(pipeline, entity, collider, &transform, step.translation)
            }
            _ => step.translation,
        };
        transform.translation += delta;
        transform.rotation = step.rotation;

        for kind in step.events() {
            if kind == LocomotionEventKind::Landed {
                debug!(?entity, "landed");
            }
            events.write(LocomotionEvent {
                actor: entity,
                kind,
            });
        }
    }
}

/// Distance kept between the collider and whatever blocks it.
const SKIN_WIDTH: f32 = 0.01;

/// Moves horizontally and vertically in two casts so a blocked fall does not
/// also cancel walking.
fn blocked_move(
    pipeline: &SpatialQueryPipeline,
    entity: Entity,
    collider: &Collider,
    transform: &Transform,
    delta: Vec3,
) -> Vec3 {
    let filter = SpatialQueryFilter::default().with_excluded_entities([entity]);
    let mut origin = transform.translation;
    let mut applied = Vec3::ZERO;
    for part in [Vec3::new(delta.x, 0.0, delta.z), Vec3::Y * delta.y] {
        let Ok((direction, length)) = Dir3::new_and_length(part) else {
            continue;
        };
        let allowed = pipeline
            .cast_shape(
                collider,
                origin,
                transform.rotation,
                direction,
                &ShapeCastConfig::from_max_distance(length),
                &filter,
            )
            .map_or(length, |hit| (hit.distance - SKIN_WIDTH).max(0.0));
        origin += direction * allowed;
        applied += direction * allowed;
    }
    applied
}

/// Clips for the controlled actor's movement cues. Missing clips are skipped.
#[derive(Resource, Clone, Debug)]
pub struct LocomotionSounds {
    pub footsteps: Vec<Handle<AudioSource>>,
    pub jump: Option<Handle<AudioSource>>,
    pub land: Option<Handle<AudioSource>>,
    pub volume: f32,
}

impl Default for LocomotionSounds {
    fn default() -> Self {
        Self {
            footsteps: Vec::new(),
            jump: None,
            land: None,
            volume: 0.7,
        }
    }
}

//  █████╗ ██╗   ██╗██████╗ ██╗ ██████╗
// ██╔══██╗██║   ██║██╔══██╗██║██╔═══██╗
// ███████║██║   ██║██║  ██║██║██║   ██║
// ██╔══██║██║   ██║██║  ██║██║██║   ██║
// ██║  ██║╚██████╔╝██████╔╝██║╚██████╔╝
// ╚═╝  ╚═╝ ╚═════╝ ╚═════╝ ╚═╝ ╚═════╝

pub fn play_locomotion_sounds(
    mut commands: Commands,
    sounds: Option<Res<LocomotionSounds>>,
    mut events: EventReader<LocomotionEvent>,
) {
    let Some(sounds) = sounds else {
        events.clear();
        return;
    };
    let mut rng = rand::thread_rng();
    for event in events.read() {
        let clip = match event.kind {
            LocomotionEventKind::Footstep => sounds.footsteps.choose(&mut rng),
            LocomotionEventKind::Jumped => sounds.jump.as_ref(),
            LocomotionEventKind::Landed => sounds.land.as_ref(),
        };
        if let Some(clip) = clip {
            commands.spawn((
                AudioPlayer::new(clip.clone()),
                PlaybackSettings::DESPAWN.with_volume(Volume::Linear(sounds.volume)),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const DT: f32 = 0.125;

    fn walker() -> GroundedLocomotion {
        GroundedLocomotion::new(LocomotionSettings::default())
    }

    fn forward() -> LocomotionIntent {
        LocomotionIntent {
            forward: 1.0,
            ..default()
        }
    }

    #[test]
    fn jump_velocity_matches_projectile_height() {
        let settings = LocomotionSettings {
            jump_height: 2.0,
            gravity: -9.81,
            ..default()
        };
        assert_relative_eq!(settings.jump_velocity(), 6.264, epsilon = 1e-3);
    }

    #[test]
    fn jump_launches_then_gravity_applies() {
        let mut locomotion = walker();
        let intent = LocomotionIntent {
            jump: true,
            ..default()
        };
        let step = locomotion.step(true, &intent, MovementBasis::WORLD, Quat::IDENTITY, DT);
        assert!(step.jumped);
        let expected = locomotion.settings.jump_velocity() - 9.81 * DT;
        assert_relative_eq!(locomotion.state.vertical_velocity, expected, epsilon = 1e-5);
        assert_relative_eq!(step.translation.y, expected * DT, epsilon = 1e-5);
    }

    #[test]
    fn jump_needs_ground() {
        let mut locomotion = walker();
        let intent = LocomotionIntent {
            jump: true,
            ..default()
        };
        let step = locomotion.step(false, &intent, MovementBasis::WORLD, Quat::IDENTITY, DT);
        assert!(!step.jumped);
        assert!(locomotion.state.vertical_velocity < 0.0);
    }

    #[test]
    fn landing_fires_on_the_grounded_edge_only() {
        let mut locomotion = walker();
        let idle = LocomotionIntent::default();
        let airborne = locomotion.step(false, &idle, MovementBasis::WORLD, Quat::IDENTITY, DT);
        let touchdown = locomotion.step(true, &idle, MovementBasis::WORLD, Quat::IDENTITY, DT);
        let standing = locomotion.step(true, &idle, MovementBasis::WORLD, Quat::IDENTITY, DT);
        assert!(!airborne.landed);
        assert!(touchdown.landed);
        assert!(!standing.landed);
    }

    #[test]
    fn grounded_velocity_is_clamped_before_gravity() {
        let mut locomotion = walker();
        locomotion.state.vertical_velocity = -30.0;
        locomotion.step(
            true,
            &LocomotionIntent::default(),
            MovementBasis::WORLD,
            Quat::IDENTITY,
            DT,
        );
        assert_relative_eq!(
            locomotion.state.vertical_velocity,
            -2.0 - 9.81 * DT,
            epsilon = 1e-5
        );
    }

    #[test]
    fn footsteps_follow_the_interval() {
        let mut locomotion = walker();
        let fired: Vec<bool> = (0..9)
            .map(|_| {
                locomotion
                    .step(true, &forward(), MovementBasis::WORLD, Quat::IDENTITY, DT)
                    .footstep
            })
            .collect();
        // 0.5 s interval at 0.125 s ticks: every fourth tick, starting at once.
        assert_eq!(
            fired,
            [true, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn footstep_fires_immediately_after_a_pause() {
        let mut locomotion = walker();
        let idle = LocomotionIntent::default();
        locomotion.step(true, &forward(), MovementBasis::WORLD, Quat::IDENTITY, DT);
        locomotion.step(true, &forward(), MovementBasis::WORLD, Quat::IDENTITY, DT);
        locomotion.step(true, &idle, MovementBasis::WORLD, Quat::IDENTITY, DT);
        assert_relative_eq!(locomotion.state.footstep_cooldown, 0.0);
        let resumed = locomotion.step(true, &forward(), MovementBasis::WORLD, Quat::IDENTITY, DT);
        assert!(resumed.footstep);
    }

    #[test]
    fn no_footsteps_in_the_air() {
        let mut locomotion = walker();
        let step = locomotion.step(false, &forward(), MovementBasis::WORLD, Quat::IDENTITY, DT);
        assert!(!step.footstep);
    }

    #[rstest]
    #[case(0.05, 0.0, false)]
    #[case(0.0, -0.05, false)]
    #[case(0.5, 0.0, true)]
    #[case(0.0, -1.0, true)]
    fn deadzone_gates_horizontal_motion(
        #[case] forward_axis: f32,
        #[case] strafe_axis: f32,
        #[case] moves: bool,
    ) {
        let mut locomotion = walker();
        let intent = LocomotionIntent {
            forward: forward_axis,
            strafe: strafe_axis,
            jump: false,
        };
        let step = locomotion.step(true, &intent, MovementBasis::WORLD, Quat::IDENTITY, DT);
        let horizontal = Vec3::new(step.translation.x, 0.0, step.translation.z);
        assert_eq!(horizontal.length() > 0.0, moves);
    }

    #[test]
    fn movement_follows_camera_heading() {
        let mut locomotion = walker();
        // Camera turned to face +X and pitched down.
        let camera = Quat::from_euler(EulerRot::YXZ, -90f32.to_radians(), -40f32.to_radians(), 0.0);
        let basis = MovementBasis::from_camera(camera);
        let step = locomotion.step(true, &forward(), basis, Quat::IDENTITY, DT);
        assert_relative_eq!(step.translation.x, 5.0 * DT, epsilon = 1e-5);
        assert_relative_eq!(step.translation.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn straight_down_camera_falls_back_to_world_axes() {
        let camera = Quat::from_rotation_x(-90f32.to_radians());
        assert_eq!(MovementBasis::from_camera(camera), MovementBasis::WORLD);
    }

    #[test]
    fn facing_turns_toward_movement() {
        let mut locomotion = walker();
        let intent = LocomotionIntent {
            strafe: 1.0,
            ..default()
        };
        let before = Quat::IDENTITY;
        let step = locomotion.step(true, &intent, MovementBasis::WORLD, before, DT);
        let target = Transform::IDENTITY.looking_to(Vec3::X, Vec3::Y).rotation;
        assert!(step.rotation.angle_between(target) < before.angle_between(target));
    }

    #[test]
    fn idle_keeps_facing() {
        let mut locomotion = walker();
        let facing = Quat::from_rotation_y(1.0);
        let step = locomotion.step(
            true,
            &LocomotionIntent::default(),
            MovementBasis::WORLD,
            facing,
            DT,
        );
        assert_eq!(step.rotation, facing);
    }

    #[test]
    fn flat_ground_contact() {
        let ground = FlatGround { height: 0.0 };
        assert!(ground.query_contact(Vec3::new(0.0, 0.3, 0.0), 0.4, LayerMask::ALL));
        assert!(!ground.query_contact(Vec3::new(0.0, 0.5, 0.0), 0.4, LayerMask::ALL));
    }

    #[test]
    fn upward_gravity_is_rejected() {
        let settings = LocomotionSettings {
            gravity: 9.81,
            ..default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::UpwardGravity(_))));
        assert!(LocomotionSettings::default().validate().is_ok());
    }
}
