//! Common API types and data structures

use crate::algorithms::{GeometryError, IntersectionResult};
use crate::api::storage::{MeasurementRecord, StorageError};
use crate::hardware::HardwareError;
use crate::ranging::{DistanceSample, RangingError};
use crate::utils::ConfigError;
use crate::validation::GatedReading;
use thiserror::Error;

/// Result type for driving-loop operations
pub type LocatorResult<T> = Result<T, LocatorError>;

/// Errors that stop the driving loop
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("sensor geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("pin setup: {0}")]
    Hardware(#[from] HardwareError),

    /// A sensor failed in a way a retry cannot fix
    #[error("{sensor}: {source}")]
    Sensor {
        sensor: String,
        #[source]
        source: RangingError,
    },

    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

/// Raw and gated reading of one sensor in one round
#[derive(Debug)]
pub struct SensorReading {
    pub raw: DistanceSample,
    pub gated: GatedReading,
}

/// Everything a single measurement round produced
#[derive(Debug)]
pub struct RoundReport {
    /// 1-based round counter
    pub round: u64,
    pub readings: [SensorReading; 2],
    pub record: MeasurementRecord,
    pub intersection: IntersectionResult,
}

impl RoundReport {
    /// Whether either reading was replaced by the sentinel
    pub fn has_substitution(&self) -> bool {
        self.readings.iter().any(|r| r.gated.is_substituted())
    }
}

/// Counters accumulated over the lifetime of a locator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatorStats {
    pub rounds: u64,
    /// Readings replaced by the sentinel (including faults)
    pub substituted_readings: u64,
    /// Timeouts and missing echoes
    pub faults: u64,
    /// Intersections where `h²` had to be clamped
    pub clamped_intersections: u64,
    pub degenerate_intersections: u64,
}
