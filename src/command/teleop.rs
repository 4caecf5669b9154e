// Keyboard teleop: W/S drive, A/D turn, X stop
//
// Stateless: each key maps straight to a command at full configured speed,
// anything unrecognized means stop.

use super::CommandSource;
use crate::config::{MAX_ANGULAR_RATE, MAX_VELOCITY};
use crate::messages::VelocityCommand;

pub const KEY_FORWARD: char = 'w';
pub const KEY_BACKWARD: char = 's';
pub const KEY_LEFT: char = 'a';
pub const KEY_RIGHT: char = 'd';
pub const KEY_STOP: char = 'x';

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Teleop {
    max_vx: f32, // m/s
    max_wz: f32, // rad/s
}

impl Teleop {
    pub fn new(max_vx: f32, max_wz: f32) -> Self {
        Self { max_vx, max_wz }
    }

    pub fn max_linear_velocity(&self) -> f32 {
        self.max_vx
    }

    pub fn max_angular_rate(&self) -> f32 {
        self.max_wz
    }

    /// Pure key mapping behind [`CommandSource::update`]
    pub fn command_for(&self, input: char) -> VelocityCommand {
        match input {
            KEY_FORWARD => VelocityCommand::new(self.max_vx, 0.0),
            KEY_BACKWARD => VelocityCommand::new(-self.max_vx, 0.0),
            KEY_LEFT => VelocityCommand::new(0.0, self.max_wz),
            KEY_RIGHT => VelocityCommand::new(0.0, -self.max_wz),
            KEY_STOP => VelocityCommand::stop(),
            _ => VelocityCommand::stop(),
        }
    }
}

impl Default for Teleop {
    fn default() -> Self {
        Self::new(MAX_VELOCITY, MAX_ANGULAR_RATE)
    }
}

impl CommandSource for Teleop {
    fn update(&mut self, input: char) -> VelocityCommand {
        self.command_for(input)
    }
}
