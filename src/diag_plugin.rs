use bevy::{
    diagnostic::{EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin},
    prelude::*,
};
use iyes_perf_ui::prelude::*;

/// Frame-time overlay for the host window. Press F3 to show or hide it.
pub struct PerfOverlayPlugin;

impl Plugin for PerfOverlayPlugin {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<FrameTimeDiagnosticsPlugin>() {
            app.add_plugins(FrameTimeDiagnosticsPlugin::default());
        }
        if !app.is_plugin_added::<EntityCountDiagnosticsPlugin>() {
            app.add_plugins(EntityCountDiagnosticsPlugin::default());
        }
        app.add_plugins(PerfUiPlugin)
            .add_systems(Startup, spawn_overlay)
            .add_systems(Update, toggle_overlay);
    }
}

fn spawn_overlay(mut commands: Commands) {
    commands.spawn(PerfUiDefaultEntries::default());
}

fn toggle_overlay(
    mut commands: Commands,
    keyboard_input: Res<ButtonInput<KeyCode>>,
    overlays: Query<Entity, With<PerfUiRoot>>,
) {
    if !keyboard_input.just_pressed(KeyCode::F3) {
        return;
    }
    if overlays.is_empty() {
        commands.spawn(PerfUiDefaultEntries::default());
    } else {
        for overlay in &overlays {
            commands.entity(overlay).despawn();
        }
    }
}
