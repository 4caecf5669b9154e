// Command sources: turn operator input into velocity commands
//
// Every source implements `CommandSource`; the session code only sees the trait,
// so new sources (joystick, planner) do not touch the codec or the link.

pub mod teleop;

pub use teleop::Teleop;

use crate::messages::VelocityCommand;

pub trait CommandSource {
    /// Map one discrete input event to a velocity command
    fn update(&mut self, input: char) -> VelocityCommand;
}

impl<S: CommandSource + ?Sized> CommandSource for Box<S> {
    fn update(&mut self, input: char) -> VelocityCommand {
        (**self).update(input)
    }
}
