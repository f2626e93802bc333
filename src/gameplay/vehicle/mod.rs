use crate::config::{GameConfig, VehicleConfig};
use crate::gameplay::collision::CollisionOutcome;
use crate::gameplay::controls::{DriveCommand, FrameCommand};
use crate::gameplay::progression::{RaceRestartRequested, RaceSummary};
use crate::gameplay::track::{oriented_box_bounds, RaceTrack, ResetPose};
use crate::gameplay::{frame_dt, RaceStep};
use crate::states::GameState;
use bevy::math::bounding::Aabb3d;
use bevy::math::Vec3A;
use bevy::prelude::*;

mod dynamics;

pub use dynamics::{apply_drive_command, integrate_motion};

pub const PLAYER_OUT_OF_BOUNDS_GRACE_LAPS: u32 = 2;
const PLAYER_BODY_COLOR: Color = Color::srgb(0.92, 0.38, 0.12);

pub struct VehicleGameplayPlugin;

impl Plugin for VehicleGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<VehicleTelemetry>()
            .add_systems(OnEnter(GameState::Racing), spawn_player_vehicle)
            .add_systems(
                Update,
                (refresh_vehicle_specs, restart_player_vehicle).in_set(RaceStep::Input),
            )
            .add_systems(Update, drive_vehicles.in_set(RaceStep::Dynamics))
            .add_systems(
                Update,
                (sync_vehicle_transforms, update_vehicle_telemetry).in_set(RaceStep::Presentation),
            );
    }
}

#[derive(Component)]
pub struct PlayerVehicle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfBoundsPolicy {
    Always,
    SuppressAfterLaps(u32),
}

impl OutOfBoundsPolicy {
    pub fn suppresses(self, laps: u32) -> bool {
        match self {
            Self::Always => false,
            Self::SuppressAfterLaps(grace_laps) => laps > grace_laps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPolicy {
    Always,
    GroundedOnly,
}

impl TurnPolicy {
    pub fn from_steer_while_airborne(steer_while_airborne: bool) -> Self {
        if steer_while_airborne {
            Self::Always
        } else {
            Self::GroundedOnly
        }
    }
}

// `direction` is kept unit length and horizontal.
#[derive(Component, Debug, Clone)]
pub struct Vehicle {
    pub position: Vec3,
    pub previous_position: Vec3,
    pub velocity: Vec3,
    pub direction: Vec3,
    // Euler angles: x pitch, y yaw, z roll.
    pub rotation: Vec3,
    pub thrust: f32,
    pub laps: u32,
    pub current_checkpoint: usize,
    pub is_alive: bool,
    pub grounded: bool,
    pub respawn_timer_s: f32,
    pub out_of_bounds_policy: OutOfBoundsPolicy,
}

impl Vehicle {
    pub fn new(
        pose: ResetPose,
        current_checkpoint: usize,
        out_of_bounds_policy: OutOfBoundsPolicy,
    ) -> Self {
        let mut vehicle = Self {
            position: Vec3::ZERO,
            previous_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            direction: Vec3::Z,
            rotation: Vec3::ZERO,
            thrust: 0.0,
            laps: 0,
            current_checkpoint,
            is_alive: true,
            grounded: false,
            respawn_timer_s: 0.0,
            out_of_bounds_policy,
        };
        vehicle.place_at(pose);
        vehicle
    }

    // Progress and thrust are untouched.
    pub fn place_at(&mut self, pose: ResetPose) {
        self.position = pose.position;
        self.previous_position = pose.position;
        self.direction = pose.direction;
        self.rotation = pose.rotation;
        self.velocity = Vec3::ZERO;
        self.grounded = false;
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_rotation(Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        ))
    }
}

#[derive(Component, Debug, Clone)]
pub struct VehicleSpec {
    pub acceleration: f32,
    pub deceleration: f32,
    pub friction: f32,
    pub turn_rate: f32,
    pub max_roll: f32,
    pub roll_lean_rate: f32,
    pub gravity: Vec3,
    pub width: f32,
    pub height: f32,
    pub length: f32,
    pub turn_policy: TurnPolicy,
}

impl VehicleSpec {
    pub fn from_config(vehicle: &VehicleConfig, turn_policy: TurnPolicy) -> Self {
        Self {
            acceleration: vehicle.acceleration,
            deceleration: vehicle.deceleration,
            friction: vehicle.friction,
            turn_rate: vehicle.turn_rate,
            max_roll: vehicle.max_roll,
            roll_lean_rate: vehicle.roll_lean_rate,
            gravity: Vec3::from_array(vehicle.gravity),
            width: vehicle.width,
            height: vehicle.height,
            length: vehicle.length,
            turn_policy,
        }
    }

    pub fn hitbox(&self) -> Hitbox {
        Hitbox {
            half_extents: Vec3::new(self.width, self.height, self.length) * 0.5,
        }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    pub half_extents: Vec3,
}

impl Hitbox {
    pub fn bounds(&self, vehicle: &Vehicle) -> Aabb3d {
        oriented_box_bounds(vehicle.position, vehicle.direction, self.half_extents)
    }

    // Covers the ground travelled since the last integration step.
    pub fn swept_bounds(&self, vehicle: &Vehicle) -> Aabb3d {
        let current = self.bounds(vehicle);
        let travelled = Vec3A::from(vehicle.previous_position - vehicle.position);
        Aabb3d {
            min: current.min.min(current.min + travelled),
            max: current.max.max(current.max + travelled),
        }
    }

    pub fn half_height(&self) -> f32 {
        self.half_extents.y
    }
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct EngineTone {
    pub frequency_hz: f32,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct VehicleTelemetry {
    pub speed_mps: f32,
    pub thrust: f32,
    pub engine_frequency_hz: f32,
    pub position: Vec3,
    pub laps: u32,
    pub current_checkpoint: usize,
    pub grounded: bool,
    pub is_alive: bool,
    pub last_collision: Option<CollisionOutcome>,
}

fn spawn_player_vehicle(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Option<Res<GameConfig>>,
    track: Option<Res<RaceTrack>>,
    existing_player: Query<Entity, With<PlayerVehicle>>,
) {
    if !existing_player.is_empty() {
        return;
    }
    let (Some(config), Some(track)) = (config, track) else {
        warn!("Cannot spawn the player vehicle before config and track are ready.");
        return;
    };
    let Some(vehicle_config) = config.active_vehicle() else {
        warn!(
            "Vehicle `{}` is not present in config; no player spawned.",
            config.game.app.default_vehicle
        );
        return;
    };

    let spec = VehicleSpec::from_config(
        vehicle_config,
        TurnPolicy::from_steer_while_airborne(config.game.app.steer_while_airborne),
    );
    let vehicle = Vehicle::new(
        track.start,
        0,
        OutOfBoundsPolicy::SuppressAfterLaps(PLAYER_OUT_OF_BOUNDS_GRACE_LAPS),
    );
    let transform = vehicle.transform();
    let mesh = meshes.add(Cuboid::new(spec.width, spec.height, spec.length));
    let material = materials.add(StandardMaterial {
        base_color: PLAYER_BODY_COLOR,
        perceptual_roughness: 0.6,
        ..default()
    });

    info!(
        "Spawned `{}` at {:?} on track `{}`.",
        vehicle_config.id, vehicle.position, track.id
    );
    commands.spawn((
        Name::new("PlayerVehicle"),
        PlayerVehicle,
        spec.hitbox(),
        spec,
        vehicle,
        EngineTone::default(),
        Mesh3d(mesh),
        MeshMaterial3d(material),
        transform,
    ));
}

fn refresh_vehicle_specs(
    config: Res<GameConfig>,
    mut players: Query<(&mut VehicleSpec, &mut Hitbox), With<PlayerVehicle>>,
) {
    if !config.is_changed() {
        return;
    }
    let Some(vehicle_config) = config.active_vehicle() else {
        return;
    };

    let turn_policy = TurnPolicy::from_steer_while_airborne(config.game.app.steer_while_airborne);
    for (mut spec, mut hitbox) in &mut players {
        *spec = VehicleSpec::from_config(vehicle_config, turn_policy);
        *hitbox = spec.hitbox();
    }
}

fn restart_player_vehicle(
    mut restart_requests: MessageReader<RaceRestartRequested>,
    track: Res<RaceTrack>,
    mut summary: ResMut<RaceSummary>,
    mut players: Query<(&mut Vehicle, Option<&mut EngineTone>), With<PlayerVehicle>>,
) {
    if restart_requests.read().count() == 0 {
        return;
    }

    for (mut vehicle, engine) in &mut players {
        let policy = vehicle.out_of_bounds_policy;
        *vehicle = Vehicle::new(track.start, 0, policy);
        if let Some(mut engine) = engine {
            *engine = EngineTone::default();
        }
    }
    summary.reset();
    info!("Race restarted on `{}`.", track.id);
}

pub(super) fn drive_vehicles(
    time: Res<Time>,
    frame_command: Res<FrameCommand>,
    mut vehicles: Query<
        (&mut Vehicle, &VehicleSpec, Option<&mut EngineTone>, Has<PlayerVehicle>),
        With<Hitbox>,
    >,
) {
    let Some(dt) = frame_dt(&time) else {
        return;
    };

    for (mut vehicle, spec, engine, is_player) in &mut vehicles {
        let command = if is_player {
            frame_command.0
        } else {
            DriveCommand::default()
        };

        apply_drive_command(&mut vehicle, spec, &command, dt);
        if let Some(mut engine) = engine {
            engine.update(command.loads_engine(), vehicle.speed());
        }
        integrate_motion(&mut vehicle, dt);
    }
}

fn sync_vehicle_transforms(mut vehicles: Query<(&Vehicle, &mut Transform), Changed<Vehicle>>) {
    for (vehicle, mut transform) in &mut vehicles {
        *transform = vehicle.transform();
    }
}

fn update_vehicle_telemetry(
    mut telemetry: ResMut<VehicleTelemetry>,
    player: Query<(&Vehicle, Option<&EngineTone>), With<PlayerVehicle>>,
) {
    let Ok((vehicle, engine)) = player.single() else {
        return;
    };

    telemetry.speed_mps = vehicle.speed();
    telemetry.thrust = vehicle.thrust;
    telemetry.engine_frequency_hz = engine.map_or(0.0, |engine| engine.frequency_hz);
    telemetry.position = vehicle.position;
    telemetry.laps = vehicle.laps;
    telemetry.current_checkpoint = vehicle.current_checkpoint;
    telemetry.grounded = vehicle.grounded;
    telemetry.is_alive = vehicle.is_alive;
}
