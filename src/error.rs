use crate::config::ConfigError;
use crate::link::LinkError;
use crate::messages::MessageError;
use crate::protocol::EncodeError;

/// Errors surfaced by the sender and receiver loops
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
