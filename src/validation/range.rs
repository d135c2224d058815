//! Reliable-range gate applied by the driving loop to raw sensor readings
//!
//! Readings outside the sensor's reliable window, zero readings and faults
//! all collapse to the same sentinel distance before they reach storage and
//! the trilaterator. The status travels alongside so the substitution stays
//! observable.

use crate::core::{MAX_RELIABLE_RANGE_CM, MIN_RELIABLE_RANGE_CM, SENTINEL_DISTANCE_CM};
use crate::ranging::DistanceSample;
use serde::{Deserialize, Serialize};

/// Classification of one raw reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingStatus {
    /// Inside the reliable window, passed through unchanged
    Valid,
    /// Closer than the minimum reliable distance
    TooClose,
    /// Farther than the maximum reliable distance
    TooFar,
    /// Zero or non-finite value
    NoReading,
    /// The sensor reported a fault instead of a distance
    Fault,
}

/// Distance after gating, with the reason for any substitution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatedReading {
    pub distance_cm: f64,
    pub status: ReadingStatus,
}

impl GatedReading {
    /// Whether the sentinel replaced the measured value
    pub fn is_substituted(&self) -> bool {
        self.status != ReadingStatus::Valid
    }
}

/// Maps out-of-range readings and faults to a sentinel distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeGate {
    min_cm: f64,
    max_cm: f64,
    sentinel_cm: f64,
}

impl Default for RangeGate {
    fn default() -> Self {
        Self {
            min_cm: MIN_RELIABLE_RANGE_CM,
            max_cm: MAX_RELIABLE_RANGE_CM,
            sentinel_cm: SENTINEL_DISTANCE_CM,
        }
    }
}

impl RangeGate {
    pub fn new(min_cm: f64, max_cm: f64, sentinel_cm: f64) -> Self {
        Self {
            min_cm,
            max_cm,
            sentinel_cm,
        }
    }

    pub fn min_cm(&self) -> f64 {
        self.min_cm
    }

    pub fn max_cm(&self) -> f64 {
        self.max_cm
    }

    pub fn sentinel_cm(&self) -> f64 {
        self.sentinel_cm
    }

    /// Gate a measured distance; both window bounds are inclusive
    pub fn gate_distance(&self, distance_cm: f64) -> GatedReading {
        let status = if !distance_cm.is_finite() || distance_cm == 0.0 {
            ReadingStatus::NoReading
        } else if distance_cm > self.max_cm {
            ReadingStatus::TooFar
        } else if distance_cm < self.min_cm {
            ReadingStatus::TooClose
        } else {
            ReadingStatus::Valid
        };

        let distance_cm = if status == ReadingStatus::Valid {
            distance_cm
        } else {
            self.sentinel_cm
        };
        GatedReading { distance_cm, status }
    }

    /// Gate a sample straight from [`RangeSensor::measure`](crate::ranging::RangeSensor::measure)
    pub fn gate(&self, sample: &DistanceSample) -> GatedReading {
        match sample {
            Ok(distance_cm) => self.gate_distance(*distance_cm),
            Err(_) => GatedReading {
                distance_cm: self.sentinel_cm,
                status: ReadingStatus::Fault,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranging::{EchoPhase, RangingError};
    use std::time::Duration;

    #[test]
    fn test_too_far_maps_to_sentinel() {
        let reading = RangeGate::default().gate_distance(150.0);
        assert_eq!(reading.distance_cm, 0.0);
        assert_eq!(reading.status, ReadingStatus::TooFar);
        assert!(reading.is_substituted());
    }

    #[test]
    fn test_too_close_maps_to_sentinel() {
        let reading = RangeGate::default().gate_distance(3.99);
        assert_eq!(reading.distance_cm, 0.0);
        assert_eq!(reading.status, ReadingStatus::TooClose);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let gate = RangeGate::default();
        assert_eq!(gate.gate_distance(4.0).status, ReadingStatus::Valid);
        assert_eq!(gate.gate_distance(100.0).status, ReadingStatus::Valid);
        assert_eq!(gate.gate_distance(100.01).status, ReadingStatus::TooFar);
    }

    #[test]
    fn test_valid_reading_passes_through() {
        let reading = RangeGate::default().gate_distance(42.17);
        assert_eq!(reading.distance_cm, 42.17);
        assert!(!reading.is_substituted());
    }

    #[test]
    fn test_zero_and_nan_are_no_reading() {
        let gate = RangeGate::default();
        assert_eq!(gate.gate_distance(0.0).status, ReadingStatus::NoReading);
        assert_eq!(gate.gate_distance(f64::NAN).status, ReadingStatus::NoReading);
        assert_eq!(gate.gate_distance(f64::NAN).distance_cm, 0.0);
    }

    #[test]
    fn test_faults_map_to_sentinel() {
        let gate = RangeGate::default();
        let timeout: DistanceSample = Err(RangingError::Timeout {
            phase: EchoPhase::RisingEdge,
            waited: Duration::from_secs(1),
        });
        let reading = gate.gate(&timeout);
        assert_eq!(reading.distance_cm, 0.0);
        assert_eq!(reading.status, ReadingStatus::Fault);

        assert_eq!(gate.gate(&Ok(55.0)).distance_cm, 55.0);
    }

    #[test]
    fn test_custom_window_and_sentinel() {
        let gate = RangeGate::new(2.0, 400.0, -1.0);
        assert_eq!(gate.gate_distance(150.0).status, ReadingStatus::Valid);
        assert_eq!(gate.gate_distance(401.0).distance_cm, -1.0);
    }
}
