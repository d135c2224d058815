//! Configuration loading and validation

pub mod config;

pub use config::{
    CanvasConfig, ConfigError, ConfigResult, ConfigurationManager, RangeConfig, SensorConfig,
    SystemConfig, TimingConfig, ValidationResult,
};
