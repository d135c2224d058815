//! Ranging fault types

use crate::hardware::HardwareError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Echo wait phase that can time out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPhase {
    /// Waiting for the echo pin to go high
    RisingEdge,
    /// Waiting for the echo pin to go low again
    FallingEdge,
}

impl fmt::Display for EchoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EchoPhase::RisingEdge => write!(f, "rising edge"),
            EchoPhase::FallingEdge => write!(f, "falling edge"),
        }
    }
}

/// Reasons a single measurement produced no distance
#[derive(Debug, Error)]
pub enum RangingError {
    /// Echo pin did not change within the phase deadline
    #[error("timeout waiting for echo {phase} after {waited:?}")]
    Timeout { phase: EchoPhase, waited: Duration },

    /// Echo pulse was too short to yield a non-zero distance
    #[error("no echo: pulse width rounds to zero")]
    NoEcho,

    /// Pin access failed
    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),
}

impl RangingError {
    /// Whether issuing the measurement again can reasonably succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, RangingError::Hardware(_))
    }
}
