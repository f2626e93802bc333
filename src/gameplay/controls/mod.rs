use super::{frame_dt, RaceStep};
use bevy::input::keyboard::KeyboardInput;
use bevy::prelude::*;

pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControlBindings>()
            .init_resource::<ControlState>()
            .init_resource::<FrameCommand>()
            .add_systems(
                Update,
                (read_control_input, map_frame_command)
                    .chain()
                    .in_set(RaceStep::Input),
            );
    }
}

#[derive(Resource, Debug, Clone)]
pub struct ControlBindings {
    pub drive: Vec<KeyCode>,
    pub brake: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub right: Vec<KeyCode>,
    pub throttle_up: Vec<KeyCode>,
    pub throttle_down: Vec<KeyCode>,
    pub look_back: Vec<KeyCode>,
    pub camera_toggle: Vec<KeyCode>,
}

impl Default for ControlBindings {
    fn default() -> Self {
        Self {
            drive: vec![KeyCode::KeyW],
            brake: vec![KeyCode::KeyS, KeyCode::ShiftLeft, KeyCode::ShiftRight],
            left: vec![KeyCode::KeyA],
            right: vec![KeyCode::KeyD],
            throttle_up: vec![KeyCode::ArrowUp],
            throttle_down: vec![KeyCode::ArrowDown],
            look_back: vec![KeyCode::KeyR],
            camera_toggle: vec![KeyCode::KeyC],
        }
    }
}

// Held inputs mirror the keyboard; the throttle ramps stay latched until a
// simulated frame takes them.
#[derive(Resource, Debug, Clone, Default)]
pub struct ControlState {
    pub drive: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
    pub look_back: bool,
    pub camera_toggle: bool,
    throttle_up_pending: bool,
    throttle_down_pending: bool,
}

impl ControlState {
    pub fn press_throttle_up(&mut self) {
        self.throttle_up_pending = true;
    }

    pub fn press_throttle_down(&mut self) {
        self.throttle_down_pending = true;
    }

    #[cfg(test)]
    pub fn throttle_ramp_pending(&self) -> (bool, bool) {
        (self.throttle_up_pending, self.throttle_down_pending)
    }

    pub fn held_command(&self) -> DriveCommand {
        DriveCommand {
            throttle_up: false,
            throttle_down: false,
            drive: self.drive,
            brake: self.brake,
            left: self.left,
            right: self.right,
            look_back: self.look_back,
            toggle_camera: self.camera_toggle,
        }
    }

    pub fn take_command(&mut self) -> DriveCommand {
        let command = DriveCommand {
            throttle_up: self.throttle_up_pending,
            throttle_down: self.throttle_down_pending,
            ..self.held_command()
        };
        self.throttle_up_pending = false;
        self.throttle_down_pending = false;
        command
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveCommand {
    pub throttle_up: bool,
    pub throttle_down: bool,
    pub drive: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
    pub look_back: bool,
    pub toggle_camera: bool,
}

impl DriveCommand {
    pub fn loads_engine(&self) -> bool {
        self.drive || self.brake
    }

    pub fn is_turning(&self) -> bool {
        self.left || self.right
    }
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct FrameCommand(pub DriveCommand);

fn read_control_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut key_messages: MessageReader<KeyboardInput>,
    bindings: Res<ControlBindings>,
    mut controls: ResMut<ControlState>,
) {
    let held = |keys: &[KeyCode]| keys.iter().any(|key| keyboard.pressed(*key));
    controls.drive = held(&bindings.drive);
    controls.brake = held(&bindings.brake);
    controls.left = held(&bindings.left);
    controls.right = held(&bindings.right);
    controls.look_back = held(&bindings.look_back);
    controls.camera_toggle = bindings
        .camera_toggle
        .iter()
        .any(|key| keyboard.just_pressed(*key));

    for message in key_messages.read() {
        if !message.state.is_pressed() {
            continue;
        }
        if bindings.throttle_up.contains(&message.key_code) {
            controls.press_throttle_up();
        }
        if bindings.throttle_down.contains(&message.key_code) {
            controls.press_throttle_down();
        }
    }
}

pub(super) fn map_frame_command(
    time: Res<Time>,
    mut controls: ResMut<ControlState>,
    mut frame_command: ResMut<FrameCommand>,
) {
    if frame_dt(&time).is_none() {
        // Nothing is simulated this frame; ramps stay latched for the next one.
        frame_command.0 = controls.held_command();
        return;
    }
    frame_command.0 = controls.take_command();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_command_clears_only_the_throttle_ramps() {
        let mut controls = ControlState {
            drive: true,
            left: true,
            look_back: true,
            ..default()
        };
        controls.press_throttle_up();

        let first = controls.take_command();
        assert!(first.throttle_up);
        assert!(first.drive && first.left && first.look_back);

        let second = controls.take_command();
        assert!(!second.throttle_up);
        assert!(second.drive && second.left && second.look_back);
        assert_eq!(controls.throttle_ramp_pending(), (false, false));
    }

    #[test]
    fn both_ramps_in_one_frame_are_delivered_and_cleared() {
        let mut controls = ControlState::default();
        controls.press_throttle_up();
        controls.press_throttle_down();

        let command = controls.take_command();

        assert!(command.throttle_up && command.throttle_down);
        assert_eq!(controls.throttle_ramp_pending(), (false, false));
    }

    #[test]
    fn held_command_leaves_ramps_latched() {
        let mut controls = ControlState {
            brake: true,
            ..default()
        };
        controls.press_throttle_down();

        let held = controls.held_command();

        assert!(held.brake && !held.throttle_down);
        assert_eq!(controls.throttle_ramp_pending(), (false, true));
        assert!(controls.take_command().throttle_down);
    }

    #[test]
    fn repeated_presses_within_a_frame_ramp_once() {
        let mut controls = ControlState::default();
        for _ in 0..5 {
            controls.press_throttle_up();
        }

        assert!(controls.take_command().throttle_up);
        assert!(!controls.take_command().throttle_up);
    }
}
