use bevy::{
    audio::{AudioSink, AudioSinkPlayback, Volume},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    ActivationState, ConfigError, ProximityActivator, ProximityEvent, ProximityEventKind, TickSet,
};

pub struct EmitterPlugin;

impl Plugin for EmitterPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (attach_loops, warn_misconfigured_emitters, emitter_tick)
                .chain()
                .in_set(TickSet::Audio),
        );
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterSettings {
    pub max_volume: f32,
    /// Distance at and below which the loop plays at `max_volume`.
    pub min_audio_distance: f32,
    /// Distance past which the loop is silent and stopped.
    pub max_audio_distance: f32,
    pub play_only_when_moving: bool,
    pub show_debug_info: bool,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            max_volume: 0.7,
            min_audio_distance: 5.0,
            max_audio_distance: 100.0,
            play_only_when_moving: true,
            show_debug_info: false,
        }
    }
}

impl EmitterSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_audio_distance <= self.min_audio_distance {
            return Err(ConfigError::DegenerateAudioRange {
                min: self.min_audio_distance,
                max: self.max_audio_distance,
            });
        }
        if !(0.0..=1.0).contains(&self.max_volume) {
            return Err(ConfigError::VolumeOutOfRange(self.max_volume));
        }
        Ok(())
    }

    /// Linear falloff from `max_volume` at the min distance to silence at the
    /// max distance.
    pub fn target_gain(&self, distance: f32) -> f32 {
        let span = self.max_audio_distance - self.min_audio_distance;
        let normalized = if span > 0.0 {
            ((distance - self.min_audio_distance) / span).clamp(0.0, 1.0)
        } else if distance <= self.min_audio_distance {
            0.0
        } else {
            1.0
        };
        (1.0 - normalized) * self.max_volume
    }

    pub fn should_play(&self, distance: f32, activation: ActivationState) -> bool {
        if self.play_only_when_moving && activation == ActivationState::Idle {
            return false;
        }
        distance <= self.max_audio_distance
    }
}

/// Derived each tick, kept for inspection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EmitterState {
    pub target_gain: f32,
    pub playing: bool,
    /// The loop was sent back to its beginning this tick.
    pub restarted: bool,
}

/// Playback handle the emitter drives.
pub trait LoopSink {
    fn play(&mut self);
    fn stop(&mut self);
    fn set_gain(&mut self, gain: f32);
    fn is_playing(&self) -> bool;

    /// Plays the loop again from its first sample.
    fn restart(&mut self);
}

impl LoopSink for AudioSink {
    fn play(&mut self) {
        AudioSinkPlayback::play(self);
    }

    // A stopped sink cannot be restarted, so a stopped loop is a paused one.
    fn stop(&mut self) {
        self.pause();
    }

    fn set_gain(&mut self, gain: f32) {
        self.set_volume(Volume::Linear(gain));
    }

    fn is_playing(&self) -> bool {
        !self.is_paused()
    }

    // A Bevy sink cannot rewind; `emitter_tick` replaces it with a fresh one.
    fn restart(&mut self) {
        self.pause();
    }
}

/// Ambient loop whose gain falls off with distance to the controlled actor.
/// Reads distance and activation from the [`ProximityActivator`] on the same
/// entity.
#[derive(Component, Clone, Debug, Default)]
#[require(ProximityActivator)]
pub struct DistanceAttenuatedEmitter {
    pub settings: EmitterSettings,
    pub clip: Option<Handle<AudioSource>>,
    pub state: EmitterState,
}

impl DistanceAttenuatedEmitter {
    pub fn new(settings: EmitterSettings, clip: Option<Handle<AudioSource>>) -> Self {
        Self {
            settings,
            clip,
            state: EmitterState::default(),
        }
    }

    /// Recomputes gain and playback for this tick. `reset` restarts an
    /// audible loop after the actor was teleported home.
    pub fn tick<S: LoopSink + ?Sized>(
        &mut self,
        distance: f32,
        activation: ActivationState,
        reset: bool,
        sink: &mut S,
    ) -> EmitterState {
        let target_gain = self.settings.target_gain(distance);
        let should_play = self.settings.should_play(distance, activation);

        let restarted = should_play && reset;
        if should_play {
            if !sink.is_playing() {
                sink.play();
            }
            sink.set_gain(target_gain);
            if restarted {
                sink.restart();
            }
        } else if sink.is_playing() {
            sink.stop();
        }

        self.state = EmitterState {
            target_gain,
            // A restart leaves the loop audible even while the sink is swapped.
            playing: restarted || sink.is_playing(),
            restarted,
        };
        self.state
    }
}

/// Spawns the looped clip paused and silent; the tick decides when it plays.
fn attach_loops(
    mut commands: Commands,
    query: Query<
        (Entity, &DistanceAttenuatedEmitter),
        (Without<AudioPlayer>, Added<DistanceAttenuatedEmitter>),
    >,
) {
    for (entity, emitter) in &query {
        let Some(clip) = emitter.clip.clone() else {
            continue;
        };
        commands.entity(entity).insert((
            AudioPlayer::new(clip),
            PlaybackSettings::LOOP
                .paused()
                .with_volume(Volume::Linear(0.0)),
        ));
    }
}

fn warn_misconfigured_emitters(
    query: Query<(Entity, &DistanceAttenuatedEmitter), Added<DistanceAttenuatedEmitter>>,
) {
    for (entity, emitter) in &query {
        if let Err(error) = emitter.settings.validate() {
            warn!(?entity, %error, "emitter misconfigured");
        }
    }
}

/// Stand-in sink for emitters whose audio has not started yet.
#[derive(Default)]
struct DetachedSink {
    playing: bool,
}

impl LoopSink for DetachedSink {
    fn play(&mut self) {
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn set_gain(&mut self, _gain: f32) {}

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn restart(&mut self) {
        self.playing = true;
    }
}

pub fn emitter_tick(
    mut commands: Commands,
    mut emitters: Query<(
        Entity,
        &mut DistanceAttenuatedEmitter,
        &ProximityActivator,
        Option<&mut AudioSink>,
    )>,
    mut proximity_events: EventReader<ProximityEvent>,
) {
    let resets: Vec<Entity> = proximity_events
        .read()
        .filter(|event| event.kind == ProximityEventKind::Reset)
        .map(|event| event.actor)
        .collect();

    for (entity, mut emitter, activator, sink) in &mut emitters {
        let Some(distance) = activator.distance else {
            continue;
        };
        let reset = resets.contains(&entity);
        let state = match sink {
            Some(mut sink) => {
                let state = emitter.tick(distance, activator.state, reset, &mut *sink);
                if state.restarted {
                    if let Some(clip) = emitter.clip.clone() {
                        let settings =
                            PlaybackSettings::LOOP.with_volume(Volume::Linear(state.target_gain));
                        commands
                            .entity(entity)
                            .remove::<AudioSink>()
                            .insert((AudioPlayer::new(clip), settings));
                    }
                }
                state
            }
            None => {
                let mut detached = DetachedSink {
                    playing: emitter.state.playing,
                };
                emitter.tick(distance, activator.state, reset, &mut detached)
            }
        };
        if emitter.settings.show_debug_info && state.playing {
            debug!(?entity, distance, gain = state.target_gain, "emitter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[derive(Default)]
    struct RecordingSink {
        playing: bool,
        gain: f32,
        calls: Vec<&'static str>,
    }

    impl LoopSink for RecordingSink {
        fn play(&mut self) {
            self.playing = true;
            self.calls.push("play");
        }

        fn stop(&mut self) {
            self.playing = false;
            self.calls.push("stop");
        }

        fn set_gain(&mut self, gain: f32) {
            self.gain = gain;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn restart(&mut self) {
            self.playing = true;
            self.calls.push("restart");
        }
    }

    fn settings() -> EmitterSettings {
        EmitterSettings {
            max_volume: 0.7,
            min_audio_distance: 5.0,
            max_audio_distance: 100.0,
            ..default()
        }
    }

    #[rstest]
    #[case(0.0, 0.7)]
    #[case(5.0, 0.7)]
    #[case(52.5, 0.35)]
    #[case(100.0, 0.0)]
    #[case(250.0, 0.0)]
    fn linear_falloff(#[case] distance: f32, #[case] gain: f32) {
        assert_relative_eq!(settings().target_gain(distance), gain, epsilon = 1e-5);
    }

    #[test]
    fn gain_never_rises_with_distance() {
        let settings = settings();
        let mut last = settings.target_gain(0.0);
        for step in 1..=240 {
            let gain = settings.target_gain(step as f32 * 0.5);
            assert!(gain <= last);
            last = gain;
        }
    }

    #[test]
    fn degenerate_range_has_no_nan() {
        let settings = EmitterSettings {
            min_audio_distance: 10.0,
            max_audio_distance: 10.0,
            ..default()
        };
        assert!(settings.validate().is_err());
        assert_relative_eq!(settings.target_gain(10.0), 0.7);
        assert_relative_eq!(settings.target_gain(10.5), 0.0);
        assert!(!settings.target_gain(9.0).is_nan());
    }

    #[test]
    fn idle_actor_stays_silent_when_only_moving_plays() {
        let mut emitter = DistanceAttenuatedEmitter::new(settings(), None);
        let mut sink = RecordingSink::default();
        let state = emitter.tick(10.0, ActivationState::Idle, false, &mut sink);
        assert!(!state.playing);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn starts_once_and_tracks_gain() {
        let mut emitter = DistanceAttenuatedEmitter::new(settings(), None);
        let mut sink = RecordingSink::default();
        emitter.tick(52.5, ActivationState::Moving, false, &mut sink);
        emitter.tick(5.0, ActivationState::Moving, false, &mut sink);
        assert_eq!(sink.calls, ["play"]);
        assert_relative_eq!(sink.gain, 0.7);
    }

    #[test]
    fn stops_when_out_of_range_or_idle() {
        let mut emitter = DistanceAttenuatedEmitter::new(settings(), None);
        let mut sink = RecordingSink::default();
        emitter.tick(20.0, ActivationState::Moving, false, &mut sink);
        let state = emitter.tick(100.5, ActivationState::Moving, false, &mut sink);
        assert!(!state.playing);
        emitter.tick(20.0, ActivationState::Moving, false, &mut sink);
        emitter.tick(20.0, ActivationState::Idle, false, &mut sink);
        assert_eq!(sink.calls, ["play", "stop", "play", "stop"]);
    }

    #[test]
    fn plays_while_idle_when_not_restricted() {
        let mut emitter = DistanceAttenuatedEmitter::new(
            EmitterSettings {
                play_only_when_moving: false,
                ..settings()
            },
            None,
        );
        let mut sink = RecordingSink::default();
        let state = emitter.tick(30.0, ActivationState::Idle, false, &mut sink);
        assert!(state.playing);
    }

    #[test]
    fn reset_restarts_an_audible_loop() {
        let mut emitter = DistanceAttenuatedEmitter::new(settings(), None);
        let mut sink = RecordingSink::default();
        emitter.tick(20.0, ActivationState::Moving, false, &mut sink);
        let state = emitter.tick(20.0, ActivationState::Moving, true, &mut sink);
        assert_eq!(sink.calls, ["play", "restart"]);
        assert!(state.restarted);
        assert!(state.playing);

        let state = emitter.tick(20.0, ActivationState::Moving, false, &mut sink);
        assert!(!state.restarted);
    }

    #[test]
    fn restart_on_a_paused_loop_starts_it_once() {
        let mut emitter = DistanceAttenuatedEmitter::new(settings(), None);
        let mut sink = RecordingSink::default();
        let state = emitter.tick(20.0, ActivationState::Moving, true, &mut sink);
        assert_eq!(sink.calls, ["play", "restart"]);
        assert!(state.restarted);
    }

    #[test]
    fn reset_leaves_a_silent_loop_alone() {
        let mut emitter = DistanceAttenuatedEmitter::new(settings(), None);
        let mut sink = RecordingSink::default();
        let state = emitter.tick(20.0, ActivationState::Idle, true, &mut sink);
        assert!(sink.calls.is_empty());
        assert!(!state.restarted);
    }
}
