use crate::config::GameConfig;
use crate::gameplay::camera::CameraRig;
use crate::gameplay::progression::{RaceRestartRequested, RaceSummary};
use crate::gameplay::track::RaceTrack;
use bevy::app::AppExit;
use bevy::prelude::*;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Loading,
    Racing,
    Paused,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_race_scene)
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(Update, boot_to_loading.run_if(in_state(GameState::Boot)))
            .add_systems(OnEnter(GameState::Loading), enter_loading)
            .add_systems(
                Update,
                loading_to_racing.run_if(in_state(GameState::Loading)),
            )
            .add_systems(OnEnter(GameState::Racing), enter_racing)
            .add_systems(Update, racing_controls.run_if(in_state(GameState::Racing)))
            .add_systems(OnEnter(GameState::Paused), enter_paused)
            .add_systems(OnExit(GameState::Paused), cleanup_pause_screen)
            .add_systems(Update, pause_controls.run_if(in_state(GameState::Paused)));
    }
}

#[derive(Component)]
struct PauseScreenRoot;

fn setup_race_scene(mut commands: Commands) {
    commands.spawn((
        Name::new("RaceCamera"),
        Camera3d::default(),
        CameraRig::default(),
        Transform::from_xyz(0.0, 6.0, -10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(30.0, 60.0, -20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.insert_resource(ClearColor(Color::srgb(0.52, 0.68, 0.82)));
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_loading(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::Loading);
}

fn enter_loading() {
    info!("Entered state: Loading");
}

fn loading_to_racing(
    config: Option<Res<GameConfig>>,
    track: Option<Res<RaceTrack>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if config.is_none() || track.is_none() {
        return;
    }
    next_state.set(GameState::Racing);
}

fn enter_racing(summary: Res<RaceSummary>) {
    info!(
        "Entered state: Racing ({:.1}s on the clock)",
        summary.elapsed_s
    );
}

fn racing_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    summary: Res<RaceSummary>,
    mut restart_requests: MessageWriter<RaceRestartRequested>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Paused);
        return;
    }

    if summary.finished && keyboard.just_pressed(KeyCode::Enter) {
        restart_requests.write(RaceRestartRequested);
    }
}

fn enter_paused(mut commands: Commands) {
    commands
        .spawn((
            Name::new("PauseOverlay"),
            PauseScreenRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.01, 0.02, 0.03, 0.72)),
            ZIndex(300),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("PAUSED\n\nEsc - Resume\nQ - Quit"),
                TextFont {
                    font_size: 36.0,
                    ..default()
                },
                TextColor(Color::srgb(0.94, 0.97, 1.00)),
            ));
        });

    info!("Entered state: Paused");
}

fn cleanup_pause_screen(mut commands: Commands, roots: Query<Entity, With<PauseScreenRoot>>) {
    for entity in &roots {
        commands.entity(entity).try_despawn();
    }
}

fn pause_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: MessageWriter<AppExit>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Racing);
    }

    if keyboard.just_pressed(KeyCode::KeyQ) {
        exit.write(AppExit::Success);
    }
}
