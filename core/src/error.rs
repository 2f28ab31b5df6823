use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToneLinkError {
    #[error("Character {0:?} is outside the encodable alphabet")]
    InvalidCharacter(char),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("A capture session is already active on this device")]
    SessionActive,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToneLinkError>;
