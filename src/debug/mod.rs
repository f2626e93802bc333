use crate::config::GameConfig;
use crate::gameplay::camera::CameraRig;
use crate::gameplay::progression::RaceSummary;
use crate::gameplay::track::{horizontal_unit, RaceTrack};
use crate::gameplay::vehicle::{
    Hitbox, PlayerVehicle, TurnPolicy, Vehicle, VehicleSpec, VehicleTelemetry,
};
use crate::states::GameState;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

const CENTERLINE_COLOR: Color = Color::srgb(0.95, 0.85, 0.2);
const EDGE_COLOR: Color = Color::srgb(0.9, 0.92, 0.95);
const CHECKPOINT_COLOR: Color = Color::srgb(0.2, 0.85, 0.4);
const NEXT_CHECKPOINT_COLOR: Color = Color::srgb(0.2, 0.6, 1.0);
const HITBOX_COLOR: Color = Color::srgb(1.0, 0.35, 0.2);

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugOverlayState>()
            .add_systems(
                Update,
                apply_debug_overlay_default.run_if(resource_added::<GameConfig>),
            )
            .add_systems(Update, toggle_debug_overlay)
            .add_systems(
                Update,
                draw_track_gizmos
                    .run_if(not(in_state(GameState::Boot)))
                    .run_if(resource_exists::<RaceTrack>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                race_telemetry_panel_ui
                    .run_if(in_state(GameState::Racing))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Resource, Debug, Clone)]
pub struct DebugOverlayState {
    pub panel_visible: bool,
    pub draw_track: bool,
    pub draw_hitbox: bool,
}

impl Default for DebugOverlayState {
    fn default() -> Self {
        Self {
            panel_visible: false,
            draw_track: true,
            draw_hitbox: false,
        }
    }
}

fn apply_debug_overlay_default(config: Res<GameConfig>, mut state: ResMut<DebugOverlayState>) {
    state.panel_visible = config.game.app.debug_overlay;
    state.draw_hitbox = config.game.app.debug_overlay;
}

fn toggle_debug_overlay(keyboard: Res<ButtonInput<KeyCode>>, mut state: ResMut<DebugOverlayState>) {
    if keyboard.just_pressed(KeyCode::F1) {
        state.panel_visible = !state.panel_visible;
        info!(
            "Race telemetry panel {}.",
            if state.panel_visible { "shown" } else { "hidden" }
        );
    }
    if keyboard.just_pressed(KeyCode::F2) {
        state.draw_track = !state.draw_track;
    }
}

fn draw_track_gizmos(
    mut gizmos: Gizmos,
    state: Res<DebugOverlayState>,
    track: Res<RaceTrack>,
    player: Query<(&Vehicle, &Hitbox), With<PlayerVehicle>>,
) {
    let next_checkpoint = player.single().ok().map(|(vehicle, _)| {
        (vehicle.current_checkpoint + 1) % track.checkpoints.len().max(1)
    });

    if state.draw_track {
        let half_width = track.surface.half_width();
        for (start, end) in track.surface.segments() {
            gizmos.line(start, end, CENTERLINE_COLOR);
            let Some(forward) = horizontal_unit(end - start) else {
                continue;
            };
            let lateral = Vec3::Y.cross(forward) * half_width;
            gizmos.line(start + lateral, end + lateral, EDGE_COLOR);
            gizmos.line(start - lateral, end - lateral, EDGE_COLOR);
        }

        for checkpoint in &track.checkpoints {
            let bounds = checkpoint.trigger_bounds();
            let center = Vec3::from((bounds.min + bounds.max) * 0.5);
            let size = Vec3::from(bounds.max - bounds.min);
            let color = if Some(checkpoint.index) == next_checkpoint {
                NEXT_CHECKPOINT_COLOR
            } else {
                CHECKPOINT_COLOR
            };
            gizmos.cuboid(Transform::from_translation(center).with_scale(size), color);
        }
    }

    if state.draw_hitbox {
        if let Ok((vehicle, hitbox)) = player.single() {
            let bounds = hitbox.bounds(vehicle);
            let center = Vec3::from((bounds.min + bounds.max) * 0.5);
            let size = Vec3::from(bounds.max - bounds.min);
            gizmos.cuboid(Transform::from_translation(center).with_scale(size), HITBOX_COLOR);
        }
    }
}

fn race_telemetry_panel_ui(
    mut egui_contexts: EguiContexts,
    mut state: ResMut<DebugOverlayState>,
    telemetry: Res<VehicleTelemetry>,
    summary: Res<RaceSummary>,
    cameras: Query<&CameraRig>,
    mut player: Query<&mut VehicleSpec, With<PlayerVehicle>>,
) {
    if !state.panel_visible {
        return;
    }

    let camera_mode = cameras
        .single()
        .map(|rig| rig.mode.label())
        .unwrap_or("n/a");
    let mut window_open = state.panel_visible;
    let mut draw_track = state.draw_track;
    let mut draw_hitbox = state.draw_hitbox;

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Race Telemetry")
        .open(&mut window_open)
        .resizable(true)
        .default_width(360.0)
        .show(ctx, |ui| {
            ui.label(format!(
                "Speed {:.2} m/s | Thrust {:.0}%",
                telemetry.speed_mps,
                telemetry.thrust * 100.0
            ));
            ui.label(format!("Engine {:.1} Hz", telemetry.engine_frequency_hz));
            ui.label(format!(
                "Position ({:.1}, {:.1}, {:.1})",
                telemetry.position.x, telemetry.position.y, telemetry.position.z
            ));
            ui.label(format!(
                "Grounded {} | Alive {}",
                telemetry.grounded, telemetry.is_alive
            ));
            ui.label(format!(
                "Lap {} | Checkpoint {} | {:.2}s",
                telemetry.laps, telemetry.current_checkpoint, summary.elapsed_s
            ));
            ui.label(format!("Camera: {camera_mode}"));
            ui.label(format!(
                "Last collision pass: {}",
                telemetry
                    .last_collision
                    .map_or_else(|| "n/a".to_string(), |outcome| format!("{outcome:?}"))
            ));
            ui.separator();

            ui.checkbox(&mut draw_track, "Draw track (F2)");
            ui.checkbox(&mut draw_hitbox, "Draw hitbox");

            let Ok(mut spec) = player.single_mut() else {
                return;
            };
            ui.separator();
            ui.label("Handling (runtime only; F5 restores config values)");
            let mut steer_while_airborne = spec.turn_policy == TurnPolicy::Always;
            if ui
                .checkbox(&mut steer_while_airborne, "Steer while airborne")
                .changed()
            {
                spec.turn_policy = TurnPolicy::from_steer_while_airborne(steer_while_airborne);
            }
            tuning_slider_row(ui, "Acceleration", &mut spec.acceleration, 0.0..=120.0, 0.5);
            tuning_slider_row(ui, "Deceleration", &mut spec.deceleration, 0.0..=120.0, 0.5);
            tuning_slider_row(ui, "Friction", &mut spec.friction, 0.0..=5.0, 0.01);
            tuning_slider_row(ui, "Turn rate", &mut spec.turn_rate, 0.0..=8.0, 0.05);
            tuning_slider_row(ui, "Max roll", &mut spec.max_roll, 0.0..=1.2, 0.01);
        });

    state.panel_visible = window_open;
    state.draw_track = draw_track;
    state.draw_hitbox = draw_hitbox;
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(value).speed(drag_speed as f64))
            .changed();
    });
    changed
}
