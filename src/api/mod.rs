//! Driving loop and its output sinks
//!
//! The blocking locator ties the range sensors, the range gate and the
//! trilaterator together and hands results to a persistence sink and a
//! display sink.

pub mod blocking;
pub mod display;
pub mod storage;
pub mod types;

pub use blocking::{configure_pins, release_pins, BlockingLocator};
pub use display::{DisplaySink, DotCanvas, LogDisplay};
pub use storage::{JsonLinesStore, MeasurementRecord, MemoryStore, PersistenceSink, StorageError};
pub use types::{LocatorError, LocatorResult, LocatorStats, RoundReport, SensorReading};
