// Host side of the locomo robot: keyboard teleop over a serial dongle
//
// input -> command::CommandSource -> messages::VelocityCommand
//       -> protocol (framing) -> link::SerialLink
// and back: link -> protocol::FrameAssembler -> messages::Message

pub mod command;
pub mod config;
pub mod error;
pub mod link;
pub mod messages;
pub mod protocol;
pub mod session;

pub use error::{Error, Result};
