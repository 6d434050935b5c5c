use thiserror::Error;

/// Main error type for eISCP operations
#[derive(Error, Debug)]
pub enum EiscpError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),

    #[error("Not connected to device")]
    NotConnected,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Unknown receiver model: {0}")]
    UnknownModel(String),
}

/// Result type alias for eISCP operations
pub type EiscpResult<T> = Result<T, EiscpError>;
