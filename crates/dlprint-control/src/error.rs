//! Error types for print control.

use dlprint_slicer::SlicerError;
use thiserror::Error;

/// Errors from the build-stage actuator.
#[derive(Error, Debug)]
pub enum ActuatorError {
    /// The device replied with something other than `OK`.
    #[error("unexpected reply from actuator: {0:?}")]
    UnexpectedReply(String),

    /// The device closed the connection.
    #[error("actuator disconnected")]
    Disconnected,

    /// The actuator was halted and refuses further moves.
    #[error("actuator is halted")]
    Halted,

    /// Any other device failure.
    #[error("actuator fault: {0}")]
    Fault(String),

    /// IO error talking to the device.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a display sink.
#[derive(Error, Debug)]
pub enum DisplayError {
    /// Timer acknowledgment needs a running tokio runtime.
    #[error("no async runtime available for the acknowledgment timer")]
    NoRuntime,

    /// The sink refused the frame.
    #[error("display rejected frame: {0}")]
    Rejected(String),
}

/// Errors from configuring or starting a print.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed TOML configuration.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Slicing failed.
    #[error(transparent)]
    Slicer(#[from] SlicerError),

    /// Actuator failure.
    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    /// Display failure.
    #[error(transparent)]
    Display(#[from] DisplayError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for control operations.
pub type Result<T> = std::result::Result<T, ControlError>;
