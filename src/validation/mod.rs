//! Data validation applied between the sensors and the rest of the pipeline

pub mod range;

pub use range::{GatedReading, RangeGate, ReadingStatus};
