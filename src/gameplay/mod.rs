pub mod camera;
pub mod collision;
pub mod controls;
pub mod progression;
pub mod sfx;
pub mod track;
pub mod vehicle;

use crate::config::GameConfig;
use crate::states::GameState;
use bevy::prelude::*;
use camera::RaceCameraPlugin;
use collision::CollisionPlugin;
use controls::ControlsPlugin;
use progression::ProgressionPlugin;
use sfx::RaceSfxPlugin;
use track::{RaceTrack, TrackPlugin};
use vehicle::VehicleGameplayPlugin;

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaceStep {
    Input,
    Dynamics,
    Collision,
    Progression,
    Camera,
    Presentation,
}

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RaceFrame;

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        configure_race_frame(app);
        app.add_plugins(TrackPlugin)
        .add_plugins(ControlsPlugin)
        .add_plugins(VehicleGameplayPlugin)
        .add_plugins(CollisionPlugin)
        .add_plugins(ProgressionPlugin)
        .add_plugins(RaceCameraPlugin)
        .add_plugins(RaceSfxPlugin);
    }
}

fn configure_race_frame(app: &mut App) {
    app.configure_sets(
        Update,
        RaceFrame
            .run_if(in_state(GameState::Racing))
            .run_if(resource_exists::<GameConfig>)
            .run_if(resource_exists::<RaceTrack>),
    )
    .configure_sets(
        Update,
        (
            RaceStep::Input,
            RaceStep::Dynamics,
            RaceStep::Collision,
            RaceStep::Progression,
            RaceStep::Camera,
            RaceStep::Presentation,
        )
            .chain()
            .in_set(RaceFrame),
    );
}

pub fn frame_dt(time: &Time) -> Option<f32> {
    let dt = time.delta_secs();
    (dt.is_finite() && dt > 0.0).then_some(dt)
}
