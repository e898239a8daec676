//! Error taxonomy for device resolution and log capture
//!
//! Parse failures are never errors: extractors return `Option` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogscopeError {
    /// No device in `device` state is attached
    #[error("No connected devices found. Connect a device or start an emulator.")]
    NoDevice,

    /// More than one device is attached and none was selected
    #[error("Multiple devices connected ({}). Specify one with --device.", .devices.join(", "))]
    AmbiguousDevice { devices: Vec<String> },

    /// The adb subprocess failed (spawn failure, stderr output, non-zero exit)
    #[error("Capture failed: {0}")]
    Capture(String),

    /// A field required to build a request is absent from the logs
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LogscopeError>;
