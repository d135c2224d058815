//! Time-of-flight ranging with trigger/echo ultrasonic sensors

pub mod error;
pub mod sensor;

pub use error::{EchoPhase, RangingError};
pub use sensor::{DistanceSample, RangeSensor, SensorTiming};
