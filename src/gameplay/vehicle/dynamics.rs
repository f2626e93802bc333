use super::*;

pub const THRUST_STEP: f32 = 0.02;
pub const ROLL_DECAY_PER_FRAME: f32 = 0.8;
const ENGINE_IDLE_FREQUENCY_HZ: f32 = 50.0;
const ENGINE_FREQUENCY_PER_MPS: f32 = 100.0;
const ENGINE_FREQUENCY_DECAY_PER_FRAME: f32 = 0.96;

pub fn apply_throttle_ramp(vehicle: &mut Vehicle, command: &DriveCommand) {
    if command.throttle_up {
        vehicle.thrust = (vehicle.thrust + THRUST_STEP).min(1.0);
    }
    if command.throttle_down {
        vehicle.thrust = (vehicle.thrust - THRUST_STEP).max(0.0);
    }
}

// Throttle, drive, brake, turn and roll. Position is left to `integrate_motion`.
pub fn apply_drive_command(
    vehicle: &mut Vehicle,
    spec: &VehicleSpec,
    command: &DriveCommand,
    dt: f32,
) {
    apply_throttle_ramp(vehicle, command);

    if !vehicle.is_alive {
        vehicle.rotation.z *= ROLL_DECAY_PER_FRAME;
        return;
    }

    if command.drive {
        vehicle.velocity += vehicle.direction * (spec.acceleration * vehicle.thrust * dt);
    }
    if command.brake {
        vehicle.velocity -= vehicle.direction * (spec.deceleration * vehicle.thrust * dt);
    }

    let can_turn = match spec.turn_policy {
        TurnPolicy::Always => true,
        TurnPolicy::GroundedOnly => vehicle.grounded,
    };

    if can_turn {
        if command.right {
            turn(vehicle, -spec.turn_rate * dt);
        }
        if command.left {
            turn(vehicle, spec.turn_rate * dt);
        }
    }

    if !command.is_turning() {
        vehicle.rotation.z *= ROLL_DECAY_PER_FRAME;
    } else if can_turn {
        let turn_sign = command.left as i8 - command.right as i8;
        let target_roll = -(turn_sign as f32) * spec.max_roll;
        let blend = (spec.roll_lean_rate * dt).clamp(0.0, 1.0);
        vehicle.rotation.z += (target_roll - vehicle.rotation.z) * blend;
    }
}

pub fn turn(vehicle: &mut Vehicle, angle_rad: f32) {
    let rotated = Quat::from_rotation_y(angle_rad) * vehicle.direction;
    vehicle.direction = rotated.try_normalize().unwrap_or(Vec3::Z);
    vehicle.rotation.y += angle_rad;
}

pub fn integrate_motion(vehicle: &mut Vehicle, dt: f32) {
    vehicle.previous_position = vehicle.position;
    vehicle.position += vehicle.velocity * dt;
}

impl EngineTone {
    pub fn update(&mut self, loads_engine: bool, speed_mps: f32) {
        if loads_engine {
            self.frequency_hz = ENGINE_IDLE_FREQUENCY_HZ + speed_mps * ENGINE_FREQUENCY_PER_MPS;
        } else {
            self.frequency_hz *= ENGINE_FREQUENCY_DECAY_PER_FRAME;
        }
    }
}
