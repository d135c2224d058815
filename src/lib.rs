//! Ultrasonic 2D Locator
//!
//! Locates an object in a plane from two ultrasonic range sensors by
//! intersecting their distance circles, with range gating, append-only
//! measurement logging and a dot-canvas display.

pub mod core;
pub mod hardware;
pub mod ranging;
pub mod algorithms;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use crate::core::{Point2D, SensorGeometry, PinLevel, PinDirection, SPEED_OF_SOUND_AIR_CM_S};
pub use hardware::{GpioInterface, HardwareError, MockGpio, SysfsGpio, EchoProfile};
pub use ranging::{RangeSensor, RangingError, DistanceSample, SensorTiming};
pub use algorithms::{Trilaterator, IntersectionResult, GeometryError, Fix};
pub use validation::{RangeGate, GatedReading, ReadingStatus};
pub use utils::{ConfigurationManager, SystemConfig, ConfigError};
pub use api::{
    BlockingLocator, LocatorError, LocatorResult, RoundReport,
    DisplaySink, DotCanvas, LogDisplay, PersistenceSink, JsonLinesStore, MemoryStore, MeasurementRecord,
};
