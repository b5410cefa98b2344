//! # Error Types
//!
//! Custom error types for Padstream using `thiserror`.

use thiserror::Error;

/// Main error type for Padstream
#[derive(Debug, Error)]
pub enum PadError {
    /// No joystick is connected
    #[error("no joystick found")]
    NoDevice,

    /// Requested device index does not exist
    #[error("device index {index} is invalid ({count} device(s) connected)")]
    InvalidDevice { index: usize, count: usize },

    /// The input subsystem could not be initialized
    #[error("input backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Requested axis index exceeds the device's axis count
    #[error("axis {index} out of range (device reports {count} axes)")]
    AxisOutOfRange { index: usize, count: usize },

    /// Any other failure reported by the input backend
    #[error("{0}")]
    Backend(String),

    /// OS error from the opened device, passed through as reported
    #[error(transparent)]
    Device(std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PadError {
    /// Returns true when the error means no usable device is present.
    pub fn is_no_device(&self) -> bool {
        matches!(self, PadError::NoDevice | PadError::InvalidDevice { .. })
    }
}

/// Result type alias for Padstream
pub type Result<T> = std::result::Result<T, PadError>;
