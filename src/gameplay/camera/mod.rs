use crate::config::{CameraConfig, GameConfig};
use crate::gameplay::controls::FrameCommand;
use crate::gameplay::track::horizontal_unit;
use crate::gameplay::vehicle::{PlayerVehicle, Vehicle};
use crate::gameplay::RaceStep;
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::prelude::*;

const ORBIT_PITCH_LIMIT_RAD: f32 = 1.45;
const ORBIT_ZOOM_STEP: f32 = 0.1;

pub struct RaceCameraPlugin;

impl Plugin for RaceCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, update_race_camera.in_set(RaceStep::Camera));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Follow,
    Manual,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Follow => Self::Manual,
            Self::Manual => Self::Follow,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Manual => "manual orbit",
        }
    }
}

#[derive(Component, Debug, Clone)]
pub struct CameraRig {
    pub mode: CameraMode,
    pub orbit_yaw: f32,
    pub orbit_pitch: f32,
    pub orbit_distance: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            mode: CameraMode::Follow,
            orbit_yaw: std::f32::consts::PI,
            orbit_pitch: 0.45,
            orbit_distance: 9.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn to_transform(self) -> Transform {
        Transform::from_translation(self.position).looking_at(self.target, Vec3::Y)
    }
}

pub fn follow_pose(
    position: Vec3,
    direction: Vec3,
    looking_back: bool,
    camera: &CameraConfig,
) -> CameraPose {
    let mut facing = horizontal_unit(direction).unwrap_or(Vec3::Z);
    if looking_back {
        facing = -facing;
    }

    CameraPose {
        position: position - facing * camera.follow_distance + Vec3::Y * camera.follow_height,
        target: position + facing,
    }
}

pub fn orbit_pose(center: Vec3, yaw: f32, pitch: f32, distance: f32) -> CameraPose {
    let offset = Vec3::new(
        yaw.sin() * pitch.cos(),
        pitch.sin(),
        yaw.cos() * pitch.cos(),
    ) * distance;
    CameraPose {
        position: center + offset,
        target: center,
    }
}

pub fn follow_camera_transform(
    current: &Transform,
    vehicle: &Vehicle,
    looking_back: bool,
    camera: &CameraConfig,
) -> Transform {
    if vehicle.is_alive {
        return follow_pose(vehicle.position, vehicle.direction, looking_back, camera)
            .to_transform();
    }

    let mut transform = *current;
    if transform.translation.distance_squared(vehicle.position) > f32::EPSILON {
        transform.look_at(vehicle.position, Vec3::Y);
    }
    transform
}

fn update_race_camera(
    config: Res<GameConfig>,
    frame_command: Res<FrameCommand>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    player: Query<&Vehicle, With<PlayerVehicle>>,
    mut cameras: Query<(&mut Transform, &mut CameraRig), Without<PlayerVehicle>>,
) {
    let Ok(vehicle) = player.single() else {
        return;
    };
    let Ok((mut transform, mut rig)) = cameras.single_mut() else {
        return;
    };
    let camera = &config.game.camera;

    if frame_command.0.toggle_camera {
        rig.mode = rig.mode.toggled();
        if rig.mode == CameraMode::Manual {
            rig.orbit_distance = camera.orbit_distance;
        }
        info!("Camera mode: {}.", rig.mode.label());
    }

    match rig.mode {
        CameraMode::Follow => {
            *transform =
                follow_camera_transform(&transform, vehicle, frame_command.0.look_back, camera);
        }
        CameraMode::Manual => {
            let dragging = mouse_buttons.pressed(MouseButton::Right)
                || mouse_buttons.pressed(MouseButton::Left);
            if dragging {
                let sensitivity = camera.orbit_sensitivity;
                rig.orbit_yaw -= mouse_motion.delta.x * sensitivity;
                rig.orbit_pitch = (rig.orbit_pitch + mouse_motion.delta.y * sensitivity)
                    .clamp(-ORBIT_PITCH_LIMIT_RAD, ORBIT_PITCH_LIMIT_RAD);
            }
            if mouse_scroll.delta.y != 0.0 {
                rig.orbit_distance *= 1.0 - mouse_scroll.delta.y * ORBIT_ZOOM_STEP;
            }
            rig.orbit_distance = rig
                .orbit_distance
                .clamp(camera.orbit_min_distance, camera.orbit_max_distance);

            *transform = orbit_pose(
                vehicle.position,
                rig.orbit_yaw,
                rig.orbit_pitch,
                rig.orbit_distance,
            )
            .to_transform();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::gameplay::track::ResetPose;
    use crate::gameplay::vehicle::OutOfBoundsPolicy;

    fn vehicle_facing(direction: Vec3) -> Vehicle {
        Vehicle::new(
            ResetPose {
                position: Vec3::new(10.0, 1.0, 5.0),
                direction,
                rotation: Vec3::ZERO,
            },
            0,
            OutOfBoundsPolicy::Always,
        )
    }

    #[test]
    fn follow_pose_sits_behind_and_above() {
        let config = sample_config();
        let pose = follow_pose(Vec3::new(10.0, 1.0, 5.0), Vec3::Z, false, &config.game.camera);

        assert!(pose.position.abs_diff_eq(Vec3::new(10.0, 2.5, 2.0), 1e-5));
        assert!(pose.target.abs_diff_eq(Vec3::new(10.0, 1.0, 6.0), 1e-5));
    }

    #[test]
    fn looking_back_mirrors_the_facing() {
        let config = sample_config();
        let pose = follow_pose(Vec3::ZERO, Vec3::X, true, &config.game.camera);

        assert!(pose.position.abs_diff_eq(Vec3::new(3.0, 1.5, 0.0), 1e-5));
        assert!(pose.target.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn facing_ignores_pitch() {
        let config = sample_config();
        let pose = follow_pose(
            Vec3::ZERO,
            Vec3::new(0.0, 0.8, 0.6),
            false,
            &config.game.camera,
        );

        assert!(pose.target.abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn dead_vehicle_keeps_camera_in_place() {
        let config = sample_config();
        let mut vehicle = vehicle_facing(Vec3::Z);
        vehicle.is_alive = false;
        let current = Transform::from_xyz(0.0, 6.0, -4.0);

        let next = follow_camera_transform(&current, &vehicle, false, &config.game.camera);

        assert_eq!(next.translation, current.translation);
        let to_vehicle = (vehicle.position - next.translation).normalize();
        assert!(next.forward().dot(to_vehicle) > 0.999);
    }

    #[test]
    fn live_vehicle_pulls_camera_to_chase_pose() {
        let config = sample_config();
        let vehicle = vehicle_facing(Vec3::Z);
        let current = Transform::from_xyz(0.0, 6.0, -4.0);

        let next = follow_camera_transform(&current, &vehicle, false, &config.game.camera);

        assert!(next.translation.abs_diff_eq(Vec3::new(10.0, 2.5, 2.0), 1e-5));
    }

    #[test]
    fn orbit_pose_keeps_distance_from_center() {
        let center = Vec3::new(4.0, 0.0, -2.0);
        let pose = orbit_pose(center, 0.7, 0.3, 12.0);

        assert!((pose.position.distance(center) - 12.0).abs() < 1e-4);
        assert_eq!(pose.target, center);
    }

    fn camera_app(vehicle: Vehicle) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(sample_config())
            .init_resource::<FrameCommand>()
            .init_resource::<ButtonInput<MouseButton>>()
            .init_resource::<AccumulatedMouseMotion>()
            .init_resource::<AccumulatedMouseScroll>()
            .add_systems(Update, update_race_camera);
        app.world_mut().spawn((PlayerVehicle, vehicle));
        app.world_mut().spawn((
            CameraRig::default(),
            Transform::from_xyz(0.0, 6.0, -4.0),
        ));
        app
    }

    fn camera_state(app: &mut App) -> (Transform, CameraRig) {
        let mut query = app.world_mut().query::<(&Transform, &CameraRig)>();
        let (transform, rig) = query.single(app.world()).expect("one race camera");
        (*transform, rig.clone())
    }

    fn move_player(app: &mut App, offset: Vec3) -> Vehicle {
        let mut query = app
            .world_mut()
            .query_filtered::<&mut Vehicle, With<PlayerVehicle>>();
        let mut vehicle = query.single_mut(app.world_mut()).expect("one player");
        vehicle.position += offset;
        vehicle.clone()
    }

    fn set_toggle(app: &mut App, toggle_camera: bool) {
        app.world_mut().resource_mut::<FrameCommand>().0.toggle_camera = toggle_camera;
    }

    #[test]
    fn manual_mode_orbits_until_toggled_back_to_follow() {
        let config = sample_config();
        let camera = config.game.camera.clone();
        let mut app = camera_app(vehicle_facing(Vec3::Z));

        set_toggle(&mut app, true);
        app.update();
        let (_, rig) = camera_state(&mut app);
        assert_eq!(rig.mode, CameraMode::Manual);

        set_toggle(&mut app, false);
        let vehicle = move_player(&mut app, Vec3::new(0.0, 0.0, 20.0));
        app.update();

        let (transform, rig) = camera_state(&mut app);
        assert_eq!(rig.mode, CameraMode::Manual);
        let orbit = orbit_pose(
            vehicle.position,
            rig.orbit_yaw,
            rig.orbit_pitch,
            rig.orbit_distance,
        );
        assert!(transform.translation.abs_diff_eq(orbit.position, 1e-4));
        let chase = follow_pose(vehicle.position, vehicle.direction, false, &camera);
        assert!(!transform.translation.abs_diff_eq(chase.position, 1e-2));

        set_toggle(&mut app, true);
        app.update();

        let (transform, rig) = camera_state(&mut app);
        assert_eq!(rig.mode, CameraMode::Follow);
        assert!(transform.translation.abs_diff_eq(chase.position, 1e-4));
    }

    #[test]
    fn camera_mode_toggles_back_and_forth() {
        assert_eq!(CameraMode::Follow.toggled(), CameraMode::Manual);
        assert_eq!(CameraMode::Follow.toggled().toggled(), CameraMode::Follow);
    }
}
