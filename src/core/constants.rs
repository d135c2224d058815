//! Physical constants and system parameters

use std::time::Duration;

/// Speed of sound in air at room temperature (cm/s)
pub const SPEED_OF_SOUND_AIR_CM_S: f64 = 34300.0;

/// Settle time the sensor needs with the trigger held low before a new pulse
pub const TRIGGER_SETTLE: Duration = Duration::from_millis(50);

/// Width of the trigger pulse
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Deadline for each echo wait phase (rising edge, falling edge)
pub const ECHO_PHASE_TIMEOUT: Duration = Duration::from_secs(1);

/// Closest distance the sensor reports reliably (cm)
pub const MIN_RELIABLE_RANGE_CM: f64 = 4.0;

/// Farthest distance the sensor reports reliably (cm)
pub const MAX_RELIABLE_RANGE_CM: f64 = 100.0;

/// Value substituted for readings outside the reliable range
pub const SENTINEL_DISTANCE_CM: f64 = 0.0;

/// Translation from the sensor frame into canvas coordinates (cm)
pub const FRAME_OFFSET_CM: (f64, f64) = (100.0, 100.0);
