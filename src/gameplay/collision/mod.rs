use crate::config::GameConfig;
use crate::gameplay::progression::{RaceSignal, RaceSignalKind};
use crate::gameplay::track::{CenterlineTrack, Checkpoint, RaceTrack, ResetPose, TrackSurface};
use crate::gameplay::vehicle::{Hitbox, PlayerVehicle, Vehicle, VehicleSpec, VehicleTelemetry};
use crate::gameplay::{frame_dt, RaceStep};
use bevy::prelude::*;

// Landing window above the surface for an airborne vehicle.
const GROUND_SNAP_TOLERANCE_M: f32 = 0.05;
// Larger window that keeps a grounded vehicle glued to descending slopes.
const GROUND_STICK_TOLERANCE_M: f32 = 0.35;

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            resolve_vehicle_collisions.in_set(RaceStep::Collision),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    Grounded,
    Airborne,
    OutOfBounds,
    Suppressed,
    Respawning,
    Respawned,
    NoCorrection,
}

pub struct TrackView<'a, S: TrackSurface + ?Sized> {
    pub surface: &'a S,
    pub checkpoints: &'a [Checkpoint],
    pub start: ResetPose,
}

impl RaceTrack {
    pub fn view(&self) -> TrackView<'_, CenterlineTrack> {
        TrackView {
            surface: &self.surface,
            checkpoints: &self.checkpoints,
            start: self.start,
        }
    }
}

pub fn resolve_track_collision<S: TrackSurface + ?Sized>(
    vehicle: &mut Vehicle,
    spec: &VehicleSpec,
    hitbox: &Hitbox,
    track: &TrackView<'_, S>,
    respawn_delay_s: f32,
    dt: f32,
) -> CollisionOutcome {
    if !vehicle.is_alive {
        vehicle.respawn_timer_s -= dt;
        if vehicle.respawn_timer_s > 0.0 {
            vehicle.velocity += spec.gravity * dt;
            return CollisionOutcome::Respawning;
        }
        respawn_at_checkpoint(vehicle, track);
        return CollisionOutcome::Respawned;
    }

    let drivable = match track.surface.is_drivable(vehicle.position) {
        Ok(drivable) => drivable,
        Err(_) => return CollisionOutcome::NoCorrection,
    };

    if !drivable {
        vehicle.grounded = false;
        if vehicle.out_of_bounds_policy.suppresses(vehicle.laps) {
            vehicle.velocity += spec.gravity * dt;
            return CollisionOutcome::Suppressed;
        }
        mark_out_of_bounds(vehicle, respawn_delay_s);
        return CollisionOutcome::OutOfBounds;
    }

    match track
        .surface
        .surface_height(vehicle.position.x, vehicle.position.z)
    {
        Ok(height) => settle_on_surface(vehicle, spec, hitbox, height, dt),
        Err(_) => CollisionOutcome::NoCorrection,
    }
}

fn mark_out_of_bounds(vehicle: &mut Vehicle, respawn_delay_s: f32) {
    vehicle.is_alive = false;
    vehicle.grounded = false;
    vehicle.velocity = Vec3::ZERO;
    vehicle.thrust = 0.0;
    vehicle.respawn_timer_s = respawn_delay_s.max(0.0);
}

fn respawn_at_checkpoint<S: TrackSurface + ?Sized>(
    vehicle: &mut Vehicle,
    track: &TrackView<'_, S>,
) {
    let pose = track
        .checkpoints
        .get(vehicle.current_checkpoint)
        .map_or(track.start, Checkpoint::reset_pose);
    vehicle.place_at(pose);
    vehicle.is_alive = true;
    vehicle.respawn_timer_s = 0.0;
}

fn settle_on_surface(
    vehicle: &mut Vehicle,
    spec: &VehicleSpec,
    hitbox: &Hitbox,
    surface_height: f32,
    dt: f32,
) -> CollisionOutcome {
    let rest_height = surface_height + hitbox.half_height();
    let tolerance = if vehicle.grounded {
        GROUND_STICK_TOLERANCE_M
    } else {
        GROUND_SNAP_TOLERANCE_M
    };

    if vehicle.position.y > rest_height + tolerance || vehicle.velocity.y > 0.0 {
        vehicle.grounded = false;
        vehicle.velocity += spec.gravity * dt;
        return CollisionOutcome::Airborne;
    }

    vehicle.position.y = rest_height;
    vehicle.velocity.y = 0.0;
    vehicle.rotation.x = 0.0;
    vehicle.grounded = true;

    let damping = (1.0 - spec.friction * dt).clamp(0.0, 1.0);
    vehicle.velocity.x *= damping;
    vehicle.velocity.z *= damping;
    CollisionOutcome::Grounded
}

pub(super) fn resolve_vehicle_collisions(
    time: Res<Time>,
    config: Res<GameConfig>,
    track: Res<RaceTrack>,
    mut telemetry: ResMut<VehicleTelemetry>,
    mut signals: MessageWriter<RaceSignal>,
    mut vehicles: Query<(Entity, &mut Vehicle, &VehicleSpec, &Hitbox, Has<PlayerVehicle>)>,
) {
    let Some(dt) = frame_dt(&time) else {
        return;
    };

    let view = track.view();
    let respawn_delay_s = config.game.app.respawn_delay_seconds;
    for (entity, mut vehicle, spec, hitbox, is_player) in &mut vehicles {
        let outcome =
            resolve_track_collision(&mut vehicle, spec, hitbox, &view, respawn_delay_s, dt);

        match outcome {
            CollisionOutcome::OutOfBounds => {
                info!(
                    "{entity} left the track; respawning at checkpoint {}.",
                    vehicle.current_checkpoint
                );
                signals.write(RaceSignal {
                    vehicle: entity,
                    is_player,
                    kind: RaceSignalKind::OutOfBounds,
                });
            }
            CollisionOutcome::NoCorrection => {
                debug!("{entity}: surface query failed at {:?}.", vehicle.position);
            }
            _ => {}
        }

        if is_player {
            telemetry.last_collision = Some(outcome);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gameplay::track::SurfaceQueryError;
    use crate::gameplay::vehicle::{OutOfBoundsPolicy, TurnPolicy};

    // Flat ground at height zero, drivable for |x| <= half_width.
    pub(crate) struct FlatStrip {
        pub half_width: f32,
    }

    impl TrackSurface for FlatStrip {
        fn is_drivable(&self, point: Vec3) -> Result<bool, SurfaceQueryError> {
            if !point.is_finite() {
                return Err(SurfaceQueryError::NonFinitePoint);
            }
            Ok(point.x.abs() <= self.half_width)
        }

        fn surface_height(&self, _x: f32, _z: f32) -> Result<f32, SurfaceQueryError> {
            Ok(0.0)
        }
    }

    struct BrokenSurface;

    impl TrackSurface for BrokenSurface {
        fn is_drivable(&self, _point: Vec3) -> Result<bool, SurfaceQueryError> {
            Err(SurfaceQueryError::DegenerateTrack)
        }

        fn surface_height(&self, _x: f32, _z: f32) -> Result<f32, SurfaceQueryError> {
            Err(SurfaceQueryError::DegenerateTrack)
        }
    }

    pub(crate) fn test_spec(friction: f32) -> VehicleSpec {
        VehicleSpec {
            acceleration: 30.0,
            deceleration: 20.0,
            friction,
            turn_rate: 2.0,
            max_roll: 0.3,
            roll_lean_rate: 6.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            width: 1.0,
            height: 0.5,
            length: 2.0,
            turn_policy: TurnPolicy::Always,
        }
    }

    pub(crate) fn straight_checkpoints() -> Vec<Checkpoint> {
        [80.0, 20.0, 40.0, 60.0]
            .into_iter()
            .enumerate()
            .map(|(index, z)| Checkpoint {
                index,
                position: Vec3::new(0.0, 0.0, z),
                reset_direction: Vec3::Z,
                reset_rotation: Vec3::ZERO,
                half_extents: Vec3::new(6.0, 3.0, 1.0),
            })
            .collect()
    }

    pub(crate) fn start_pose() -> ResetPose {
        ResetPose {
            position: Vec3::new(0.0, 0.25, 0.0),
            direction: Vec3::Z,
            rotation: Vec3::ZERO,
        }
    }

    fn player_vehicle() -> Vehicle {
        Vehicle::new(
            start_pose(),
            0,
            OutOfBoundsPolicy::SuppressAfterLaps(2),
        )
    }

    #[test]
    fn vehicle_resting_on_flat_ground_stays_grounded() {
        let surface = FlatStrip { half_width: 10.0 };
        let checkpoints = straight_checkpoints();
        let view = TrackView {
            surface: &surface,
            checkpoints: &checkpoints,
            start: start_pose(),
        };
        let spec = test_spec(0.0);
        let mut vehicle = player_vehicle();

        let outcome =
            resolve_track_collision(&mut vehicle, &spec, &spec.hitbox(), &view, 1.0, 0.016);

        assert_eq!(outcome, CollisionOutcome::Grounded);
        assert!(vehicle.grounded);
        assert_eq!(vehicle.position.y, 0.25);
        assert_eq!(vehicle.velocity, Vec3::ZERO);
    }

    #[test]
    fn airborne_vehicle_falls_then_lands() {
        let surface = FlatStrip { half_width: 10.0 };
        let view = TrackView {
            surface: &surface,
            checkpoints: &[],
            start: start_pose(),
        };
        let spec = test_spec(0.0);
        let hitbox = spec.hitbox();
        let mut vehicle = player_vehicle();
        vehicle.position.y = 3.0;
        vehicle.rotation.x = 0.4;

        let first = resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 1.0, 0.016);
        assert_eq!(first, CollisionOutcome::Airborne);
        assert!(vehicle.velocity.y < 0.0);

        let mut landed = false;
        for _ in 0..200 {
            vehicle.position += vehicle.velocity * 0.016;
            if resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 1.0, 0.016)
                == CollisionOutcome::Grounded
            {
                landed = true;
                break;
            }
        }

        assert!(landed);
        assert_eq!(vehicle.position.y, 0.25);
        assert_eq!(vehicle.velocity.y, 0.0);
        assert_eq!(vehicle.rotation.x, 0.0);
    }

    #[test]
    fn grounded_friction_bleeds_horizontal_speed() {
        let surface = FlatStrip { half_width: 10.0 };
        let view = TrackView {
            surface: &surface,
            checkpoints: &[],
            start: start_pose(),
        };
        let spec = test_spec(0.5);
        let mut vehicle = player_vehicle();
        vehicle.velocity = Vec3::new(0.0, 0.0, 10.0);

        resolve_track_collision(&mut vehicle, &spec, &spec.hitbox(), &view, 1.0, 0.1);

        assert!((vehicle.velocity.z - 9.5).abs() < 1e-4);
    }

    #[test]
    fn leaving_the_track_marks_vehicle_dead_then_respawns_at_checkpoint() {
        let surface = FlatStrip { half_width: 10.0 };
        let checkpoints = straight_checkpoints();
        let view = TrackView {
            surface: &surface,
            checkpoints: &checkpoints,
            start: start_pose(),
        };
        let spec = test_spec(0.0);
        let hitbox = spec.hitbox();
        let mut vehicle = player_vehicle();
        vehicle.current_checkpoint = 2;
        vehicle.thrust = 0.8;
        vehicle.position.x = 20.0;
        vehicle.velocity = Vec3::new(12.0, 0.0, 5.0);

        let outcome = resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 0.5, 0.1);
        assert_eq!(outcome, CollisionOutcome::OutOfBounds);
        assert!(!vehicle.is_alive);
        assert_eq!(vehicle.velocity, Vec3::ZERO);
        assert_eq!(vehicle.thrust, 0.0);

        let mut outcomes = Vec::new();
        while outcomes.last() != Some(&CollisionOutcome::Respawned) && outcomes.len() < 10 {
            outcomes.push(resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 0.5, 0.1));
        }

        assert_eq!(outcomes[0], CollisionOutcome::Respawning);
        assert!(outcomes.len() >= 5);
        assert_eq!(outcomes.last(), Some(&CollisionOutcome::Respawned));
        assert!(vehicle.is_alive);
        assert_eq!(vehicle.position, Vec3::new(0.0, 0.0, 40.0));
        assert_eq!(vehicle.direction, Vec3::Z);
        assert_eq!(vehicle.velocity, Vec3::ZERO);
        assert_eq!(vehicle.current_checkpoint, 2);
    }

    #[test]
    fn zero_respawn_delay_resets_on_the_next_frame() {
        let surface = FlatStrip { half_width: 10.0 };
        let checkpoints = straight_checkpoints();
        let view = TrackView {
            surface: &surface,
            checkpoints: &checkpoints,
            start: start_pose(),
        };
        let spec = test_spec(0.0);
        let hitbox = spec.hitbox();
        let mut vehicle = player_vehicle();
        vehicle.position.x = -30.0;

        assert_eq!(
            resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 0.0, 0.016),
            CollisionOutcome::OutOfBounds
        );
        assert_eq!(
            resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 0.0, 0.016),
            CollisionOutcome::Respawned
        );
        assert_eq!(vehicle.position, checkpoints[0].position);
    }

    #[test]
    fn out_of_bounds_is_ignored_after_the_grace_laps() {
        let surface = FlatStrip { half_width: 10.0 };
        let checkpoints = straight_checkpoints();
        let view = TrackView {
            surface: &surface,
            checkpoints: &checkpoints,
            start: start_pose(),
        };
        let spec = test_spec(0.0);
        let hitbox = spec.hitbox();
        let mut vehicle = player_vehicle();
        vehicle.laps = 3;
        vehicle.current_checkpoint = 1;
        vehicle.position = Vec3::new(50.0, 0.25, 10.0);

        let outcome = resolve_track_collision(&mut vehicle, &spec, &hitbox, &view, 1.0, 0.016);

        assert_eq!(outcome, CollisionOutcome::Suppressed);
        assert!(vehicle.is_alive);
        assert_eq!(vehicle.position, Vec3::new(50.0, 0.25, 10.0));
        assert_eq!(vehicle.current_checkpoint, 1);
    }

    #[test]
    fn out_of_bounds_still_applies_on_the_second_lap() {
        let surface = FlatStrip { half_width: 10.0 };
        let view = TrackView {
            surface: &surface,
            checkpoints: &[],
            start: start_pose(),
        };
        let spec = test_spec(0.0);
        let mut vehicle = player_vehicle();
        vehicle.laps = 2;
        vehicle.position.x = 50.0;

        let outcome =
            resolve_track_collision(&mut vehicle, &spec, &spec.hitbox(), &view, 1.0, 0.016);

        assert_eq!(outcome, CollisionOutcome::OutOfBounds);
    }

    #[test]
    fn failed_surface_query_changes_nothing() {
        let view = TrackView {
            surface: &BrokenSurface,
            checkpoints: &[],
            start: start_pose(),
        };
        let spec = test_spec(0.5);
        let mut vehicle = player_vehicle();
        vehicle.velocity = Vec3::new(1.0, 2.0, 3.0);
        let before = vehicle.clone();

        let outcome =
            resolve_track_collision(&mut vehicle, &spec, &spec.hitbox(), &view, 1.0, 0.016);

        assert_eq!(outcome, CollisionOutcome::NoCorrection);
        assert_eq!(vehicle.position, before.position);
        assert_eq!(vehicle.velocity, before.velocity);
        assert!(vehicle.is_alive);
    }
}
