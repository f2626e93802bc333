use crate::config::GameConfig;
use crate::gameplay::track::{Checkpoint, RaceTrack};
use crate::gameplay::vehicle::{Hitbox, PlayerVehicle, Vehicle};
use crate::gameplay::{frame_dt, RaceStep};
use bevy::math::bounding::{Aabb3d, IntersectsVolume};
use bevy::prelude::*;

pub struct ProgressionPlugin;

impl Plugin for ProgressionPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<RaceSignal>()
            .add_message::<RaceRestartRequested>()
            .init_resource::<RaceSummary>()
            .add_systems(
                Update,
                track_checkpoint_progress.in_set(RaceStep::Progression),
            );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceSignalKind {
    CompleteLap,
    CompleteRace,
    OutOfBounds,
}

impl RaceSignalKind {
    pub fn id(self) -> &'static str {
        match self {
            Self::CompleteLap => "complete-lap",
            Self::CompleteRace => "complete-race",
            Self::OutOfBounds => "out-of-bounds",
        }
    }
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceSignal {
    pub vehicle: Entity,
    pub is_player: bool,
    pub kind: RaceSignalKind,
}

#[derive(Message, Debug, Clone, Copy, Default)]
pub struct RaceRestartRequested;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    CheckpointPassed { index: usize },
    LapCompleted { laps: u32 },
    RaceCompleted { laps: u32 },
}

impl ProgressEvent {
    pub fn signal(self) -> Option<RaceSignalKind> {
        match self {
            Self::CheckpointPassed { .. } => None,
            Self::LapCompleted { .. } => Some(RaceSignalKind::CompleteLap),
            Self::RaceCompleted { .. } => Some(RaceSignalKind::CompleteRace),
        }
    }
}

// Only the successor of `current_checkpoint` counts; wrapping to 0 completes a lap.
pub fn advance_progress(
    vehicle: &mut Vehicle,
    hitbox_bounds: &Aabb3d,
    checkpoints: &[Checkpoint],
    total_laps: u32,
) -> Option<ProgressEvent> {
    let count = checkpoints.len();
    if count < 2 || !vehicle.is_alive || vehicle.laps >= total_laps {
        return None;
    }

    let next = (vehicle.current_checkpoint + 1) % count;
    if !checkpoints[next].trigger_bounds().intersects(hitbox_bounds) {
        return None;
    }

    vehicle.current_checkpoint = next;
    if next != 0 {
        return Some(ProgressEvent::CheckpointPassed { index: next });
    }

    vehicle.laps += 1;
    if vehicle.laps >= total_laps {
        Some(ProgressEvent::RaceCompleted { laps: vehicle.laps })
    } else {
        Some(ProgressEvent::LapCompleted { laps: vehicle.laps })
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct RaceSummary {
    pub elapsed_s: f32,
    pub lap_times_s: Vec<f32>,
    pub finished: bool,
    lap_started_at_s: f32,
}

impl RaceSummary {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current_lap_s(&self) -> f32 {
        self.elapsed_s - self.lap_started_at_s
    }

    pub fn best_lap_s(&self) -> Option<f32> {
        self.lap_times_s.iter().copied().reduce(f32::min)
    }

    fn record_lap(&mut self) -> f32 {
        let lap_s = self.current_lap_s();
        self.lap_times_s.push(lap_s);
        self.lap_started_at_s = self.elapsed_s;
        lap_s
    }
}

pub(super) fn track_checkpoint_progress(
    time: Res<Time>,
    config: Res<GameConfig>,
    track: Res<RaceTrack>,
    mut summary: ResMut<RaceSummary>,
    mut signals: MessageWriter<RaceSignal>,
    mut vehicles: Query<(Entity, &mut Vehicle, &Hitbox, Has<PlayerVehicle>)>,
) {
    let Some(dt) = frame_dt(&time) else {
        return;
    };
    if !summary.finished {
        summary.elapsed_s += dt;
    }

    let total_laps = config.game.app.total_laps;
    for (entity, mut vehicle, hitbox, is_player) in &mut vehicles {
        let bounds = hitbox.swept_bounds(&vehicle);
        let Some(event) = advance_progress(&mut vehicle, &bounds, &track.checkpoints, total_laps)
        else {
            continue;
        };

        match event {
            ProgressEvent::CheckpointPassed { index } => {
                debug!("{entity} passed checkpoint {index}.");
            }
            ProgressEvent::LapCompleted { laps } if is_player => {
                let lap_s = summary.record_lap();
                info!("Lap {laps}/{total_laps} completed in {lap_s:.2}s.");
            }
            ProgressEvent::RaceCompleted { laps } if is_player => {
                let lap_s = summary.record_lap();
                summary.finished = true;
                info!(
                    "Race completed: {laps} laps in {:.2}s (last lap {lap_s:.2}s).",
                    summary.elapsed_s
                );
            }
            _ => {}
        }

        if let Some(kind) = event.signal() {
            signals.write(RaceSignal {
                vehicle: entity,
                is_player,
                kind,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::collision::tests::{
        start_pose, straight_checkpoints, test_spec, FlatStrip,
    };
    use crate::gameplay::collision::{resolve_track_collision, TrackView};
    use crate::gameplay::controls::DriveCommand;
    use crate::gameplay::vehicle::{apply_drive_command, integrate_motion, OutOfBoundsPolicy};

    fn vehicle_at(z: f32, current_checkpoint: usize) -> Vehicle {
        let mut pose = start_pose();
        pose.position.z = z;
        Vehicle::new(pose, current_checkpoint, OutOfBoundsPolicy::Always)
    }

    fn bounds_of(vehicle: &Vehicle) -> Aabb3d {
        test_spec(0.0).hitbox().bounds(vehicle)
    }

    #[test]
    fn only_the_successor_checkpoint_advances() {
        let checkpoints = straight_checkpoints();
        let mut vehicle = vehicle_at(40.0, 0);

        let bounds = bounds_of(&vehicle);
        let event = advance_progress(&mut vehicle, &bounds, &checkpoints, 3);

        assert_eq!(event, None);
        assert_eq!(vehicle.current_checkpoint, 0);

        vehicle.position.z = 20.0;
        let bounds = bounds_of(&vehicle);
        let event = advance_progress(&mut vehicle, &bounds, &checkpoints, 3);
        assert_eq!(event, Some(ProgressEvent::CheckpointPassed { index: 1 }));
    }

    #[test]
    fn lingering_in_a_checkpoint_does_not_advance_twice() {
        let checkpoints = straight_checkpoints();
        let mut vehicle = vehicle_at(20.0, 0);
        let bounds = bounds_of(&vehicle);

        assert!(advance_progress(&mut vehicle, &bounds, &checkpoints, 3).is_some());
        assert_eq!(advance_progress(&mut vehicle, &bounds, &checkpoints, 3), None);
        assert_eq!(vehicle.current_checkpoint, 1);
    }

    #[test]
    fn wrapping_to_zero_completes_a_lap_then_the_race() {
        let checkpoints = straight_checkpoints();
        let mut vehicle = vehicle_at(80.0, 3);
        let bounds = bounds_of(&vehicle);

        assert_eq!(
            advance_progress(&mut vehicle, &bounds, &checkpoints, 2),
            Some(ProgressEvent::LapCompleted { laps: 1 })
        );

        vehicle.current_checkpoint = 3;
        assert_eq!(
            advance_progress(&mut vehicle, &bounds, &checkpoints, 2),
            Some(ProgressEvent::RaceCompleted { laps: 2 })
        );
    }

    #[test]
    fn progression_is_frozen_after_the_race_completes() {
        let checkpoints = straight_checkpoints();
        let mut vehicle = vehicle_at(20.0, 0);
        vehicle.laps = 3;

        let bounds = bounds_of(&vehicle);
        let event = advance_progress(&mut vehicle, &bounds, &checkpoints, 3);

        assert_eq!(event, None);
        assert_eq!((vehicle.laps, vehicle.current_checkpoint), (3, 0));
    }

    #[test]
    fn fast_step_across_a_checkpoint_still_counts() {
        let checkpoints = straight_checkpoints();
        let hitbox = test_spec(0.0).hitbox();
        let mut vehicle = vehicle_at(37.5, 1);
        vehicle.velocity = Vec3::new(0.0, 0.0, 47.0);

        integrate_motion(&mut vehicle, 0.1);

        assert!(!checkpoints[2].trigger_bounds().intersects(&hitbox.bounds(&vehicle)));
        let swept = hitbox.swept_bounds(&vehicle);
        let event = advance_progress(
            &mut vehicle,
            &swept,
            &checkpoints,
            3,
        );
        assert_eq!(event, Some(ProgressEvent::CheckpointPassed { index: 2 }));
    }

    #[test]
    fn dead_vehicle_does_not_trigger_checkpoints() {
        let checkpoints = straight_checkpoints();
        let mut vehicle = vehicle_at(20.0, 0);
        vehicle.is_alive = false;

        let bounds = bounds_of(&vehicle);
        assert_eq!(
            advance_progress(&mut vehicle, &bounds, &checkpoints, 3),
            None
        );
    }

    #[test]
    fn driving_through_four_checkpoints_completes_exactly_one_lap() {
        let surface = FlatStrip { half_width: 10.0 };
        let checkpoints = straight_checkpoints();
        let view = TrackView {
            surface: &surface,
            checkpoints: &checkpoints,
            start: start_pose(),
        };
        let spec = test_spec(0.0);
        let hitbox = spec.hitbox();
        let mut vehicle = Vehicle::new(start_pose(), 0, OutOfBoundsPolicy::SuppressAfterLaps(2));
        let command = DriveCommand {
            throttle_up: true,
            drive: true,
            ..default()
        };
        let dt = 0.016;

        let mut events = Vec::new();
        for _ in 0..600 {
            if vehicle.position.z > 95.0 {
                break;
            }
            apply_drive_command(&mut vehicle, &spec, &command, dt);
            integrate_motion(&mut vehicle, dt);
            resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 1.0, dt);
            let bounds = hitbox.bounds(&vehicle);
            if let Some(event) = advance_progress(&mut vehicle, &bounds, &checkpoints, 3) {
                events.push(event);
            }
        }

        assert_eq!(
            events,
            vec![
                ProgressEvent::CheckpointPassed { index: 1 },
                ProgressEvent::CheckpointPassed { index: 2 },
                ProgressEvent::CheckpointPassed { index: 3 },
                ProgressEvent::LapCompleted { laps: 1 },
            ]
        );
        let lap_signals = events
            .iter()
            .filter(|event| event.signal() == Some(RaceSignalKind::CompleteLap))
            .count();
        assert_eq!(lap_signals, 1);
        assert_eq!((vehicle.laps, vehicle.current_checkpoint), (1, 0));
        assert!(vehicle.is_alive);
    }

    #[test]
    fn summary_records_lap_splits() {
        let mut summary = RaceSummary::default();
        summary.elapsed_s = 31.5;
        assert_eq!(summary.record_lap(), 31.5);

        summary.elapsed_s = 60.0;
        assert_eq!(summary.record_lap(), 28.5);
        assert_eq!(summary.best_lap_s(), Some(28.5));
        assert_eq!(summary.current_lap_s(), 0.0);

        summary.reset();
        assert!(summary.lap_times_s.is_empty());
    }

    #[test]
    fn signal_ids_match_audio_cue_ids() {
        assert_eq!(RaceSignalKind::CompleteLap.id(), "complete-lap");
        assert_eq!(RaceSignalKind::CompleteRace.id(), "complete-race");
        assert_eq!(RaceSignalKind::OutOfBounds.id(), "out-of-bounds");
    }
}
