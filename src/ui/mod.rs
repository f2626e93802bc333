use crate::config::GameConfig;
use crate::gameplay::progression::RaceSummary;
use crate::gameplay::track::RaceTrack;
use crate::gameplay::vehicle::{PlayerVehicle, Vehicle, VehicleTelemetry};
use crate::gameplay::RaceStep;
use crate::states::GameState;
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const HUD_PANEL_BG: Color = Color::srgba(0.06, 0.09, 0.12, 0.86);
const HUD_PANEL_BORDER: Color = Color::srgba(0.58, 0.68, 0.76, 0.92);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);
const GAUGE_WIDTH_PX: f32 = 28.0;
const GAUGE_HEIGHT_PX: f32 = 220.0;

pub struct GameHudPlugin;

impl Plugin for GameHudPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ThrottleGauge>()
            .add_systems(OnEnter(GameState::Racing), spawn_game_hud)
            .add_systems(
                Update,
                (update_throttle_gauge, update_game_hud)
                    .chain()
                    .in_set(RaceStep::Presentation),
            );
    }
}

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct ThrottleGauge {
    pub fill_percent: f32,
    pub color: [u8; 3],
}

impl Default for ThrottleGauge {
    fn default() -> Self {
        gauge_readout(0.0)
    }
}

impl ThrottleGauge {
    pub fn bevy_color(&self) -> Color {
        let [red, green, blue] = self.color;
        Color::srgb_u8(red, green, blue)
    }
}

pub fn gauge_readout(thrust: f32) -> ThrottleGauge {
    let thrust = if thrust.is_finite() {
        thrust.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let red = if thrust >= 0.5 {
        255
    } else {
        (thrust * 2.0 * 180.0).floor() as u8 + 75
    };
    let green = if thrust <= 0.5 {
        255
    } else {
        ((1.0 - thrust) * 2.0 * 180.0).floor() as u8 + 75
    };

    ThrottleGauge {
        fill_percent: thrust * 100.0,
        color: [red, green, 0],
    }
}

#[derive(Component)]
struct GameHudRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudTextKind {
    Laps,
    Checkpoint,
    Speed,
    LapTimes,
    Throttle,
    Banner,
}

#[derive(Component)]
struct HudGaugeFill;

#[derive(Component)]
struct HudFinishBanner;

fn hud_text(kind: HudTextKind, value: &str, font_size: f32, color: Color) -> impl Bundle {
    (
        kind,
        Text::new(value),
        TextFont {
            font_size,
            ..default()
        },
        TextColor(color),
    )
}

fn spawn_game_hud(mut commands: Commands, existing_hud: Query<Entity, With<GameHudRoot>>) {
    if !existing_hud.is_empty() {
        return;
    }

    commands
        .spawn((
            Name::new("GameHudRoot"),
            GameHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                right: Val::Px(12.0),
                top: Val::Px(10.0),
                bottom: Val::Px(12.0),
                justify_content: JustifyContent::SpaceBetween,
                align_items: AlignItems::FlexStart,
                ..default()
            },
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|root| {
            root.spawn((
                Name::new("GameHudRacePanel"),
                Node {
                    width: Val::Px(300.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(12.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
                BorderColor::all(HUD_PANEL_BORDER),
            ))
            .with_children(|panel| {
                panel.spawn(hud_text(HudTextKind::Laps, "LAP 0 / 0", 30.0, HUD_TEXT_PRIMARY));
                panel.spawn(hud_text(
                    HudTextKind::Checkpoint,
                    "Checkpoint 0 / 0",
                    18.0,
                    HUD_TEXT_PRIMARY,
                ));
                panel.spawn(hud_text(HudTextKind::Speed, "0.0 m/s", 18.0, HUD_TEXT_PRIMARY));
                panel.spawn(hud_text(HudTextKind::LapTimes, "", 16.0, HUD_TEXT_MUTED));
            });

            root.spawn((
                Name::new("GameHudFinishBanner"),
                HudFinishBanner,
                Node {
                    align_self: AlignSelf::Center,
                    padding: UiRect::all(Val::Px(16.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
                BorderColor::all(HUD_PANEL_BORDER),
                Visibility::Hidden,
            ))
            .with_children(|banner| {
                banner.spawn(hud_text(HudTextKind::Banner, "", 32.0, HUD_TEXT_PRIMARY));
            });

            root.spawn((
                Name::new("GameHudThrottlePanel"),
                Node {
                    align_self: AlignSelf::FlexEnd,
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::Center,
                    row_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(10.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
                BorderColor::all(HUD_PANEL_BORDER),
            ))
            .with_children(|panel| {
                panel
                    .spawn((
                        Name::new("HudThrottleGauge"),
                        Node {
                            width: Val::Px(GAUGE_WIDTH_PX),
                            height: Val::Px(GAUGE_HEIGHT_PX),
                            flex_direction: FlexDirection::Column,
                            justify_content: JustifyContent::FlexEnd,
                            border: UiRect::all(Val::Px(1.0)),
                            ..default()
                        },
                        BackgroundColor(Color::srgba(0.02, 0.03, 0.04, 0.84)),
                        BorderColor::all(Color::srgba(0.56, 0.64, 0.70, 0.9)),
                    ))
                    .with_children(|bar| {
                        bar.spawn((
                            HudGaugeFill,
                            Node {
                                width: Val::Percent(100.0),
                                height: Val::Percent(0.0),
                                ..default()
                            },
                            BackgroundColor(ThrottleGauge::default().bevy_color()),
                        ));
                    });
                panel.spawn(hud_text(HudTextKind::Throttle, "0%", 16.0, HUD_TEXT_MUTED));
            });
        });
}

fn update_throttle_gauge(
    mut gauge: ResMut<ThrottleGauge>,
    player: Query<&Vehicle, With<PlayerVehicle>>,
) {
    let Ok(vehicle) = player.single() else {
        return;
    };

    let readout = gauge_readout(vehicle.thrust);
    if *gauge != readout {
        *gauge = readout;
    }
}

#[allow(clippy::too_many_arguments)]
fn update_game_hud(
    config: Res<GameConfig>,
    track: Res<RaceTrack>,
    gauge: Res<ThrottleGauge>,
    telemetry: Res<VehicleTelemetry>,
    summary: Res<RaceSummary>,
    mut text_query: Query<(&HudTextKind, &mut Text)>,
    mut fill_query: Query<(&mut Node, &mut BackgroundColor), With<HudGaugeFill>>,
    mut banner_query: Query<&mut Visibility, With<HudFinishBanner>>,
) {
    if gauge.is_changed() {
        if let Ok((mut fill_node, mut fill_color)) = fill_query.single_mut() {
            fill_node.height = Val::Percent(gauge.fill_percent);
            *fill_color = BackgroundColor(gauge.bevy_color());
        }
    }

    if let Ok(mut visibility) = banner_query.single_mut() {
        let wanted = if summary.finished {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if *visibility != wanted {
            *visibility = wanted;
        }
    }

    let total_laps = config.game.app.total_laps;
    let shown_lap = (telemetry.laps + 1).min(total_laps);
    let checkpoint_count = track.checkpoints.len();
    let status = if telemetry.is_alive { "" } else { " | RESPAWNING" };
    let lap_times = summary
        .lap_times_s
        .iter()
        .enumerate()
        .map(|(index, lap_s)| format!("Lap {}: {lap_s:.2}s", index + 1))
        .collect::<Vec<_>>()
        .join("\n");

    for (kind, mut text) in &mut text_query {
        match kind {
            HudTextKind::Laps => {
                *text = Text::new(format!("LAP {shown_lap} / {total_laps}"));
            }
            HudTextKind::Checkpoint => {
                *text = Text::new(format!(
                    "Checkpoint {} / {checkpoint_count} | {:.1}s",
                    telemetry.current_checkpoint,
                    summary.current_lap_s()
                ));
            }
            HudTextKind::Speed => {
                *text = Text::new(format!("{:.1} m/s{status}", telemetry.speed_mps));
            }
            HudTextKind::LapTimes => {
                *text = Text::new(lap_times.clone());
            }
            HudTextKind::Throttle => {
                *text = Text::new(format!("{:.0}%", gauge.fill_percent));
            }
            HudTextKind::Banner => {
                let best = summary
                    .best_lap_s()
                    .map_or_else(|| "n/a".to_string(), |best| format!("{best:.2}s"));
                *text = Text::new(format!(
                    "RACE COMPLETE\nTotal {:.2}s | Best lap {best}\nEnter - Race again",
                    summary.elapsed_s
                ));
            }
        }
    }
}
