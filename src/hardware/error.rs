//! GPIO error types

use std::io;
use thiserror::Error;

/// Errors raised by a GPIO backend
#[derive(Debug, Error)]
pub enum HardwareError {
    /// Pin used before `set_pin_mode` was called for it
    #[error("pin {pin} is not configured")]
    PinNotConfigured { pin: u8 },

    /// Pin configured for the other direction (e.g. writing an input)
    #[error("pin {pin} is configured as {configured}, operation needs {required}")]
    WrongDirection {
        pin: u8,
        configured: &'static str,
        required: &'static str,
    },

    /// Value file returned something that is neither `0` nor `1`
    #[error("pin {pin} returned unexpected value {raw:?}")]
    InvalidLevel { pin: u8, raw: String },

    /// Underlying file or device I/O failed
    #[error("I/O error on pin {pin}: {source}")]
    Io {
        pin: u8,
        #[source]
        source: io::Error,
    },
}

impl HardwareError {
    pub fn io(pin: u8, source: io::Error) -> Self {
        HardwareError::Io { pin, source }
    }
}

/// Result type for GPIO operations
pub type HwResult<T> = Result<T, HardwareError>;
