use crate::algorithms::{GeometryError, Trilaterator};
use crate::core::{
    Point2D, SensorGeometry, FRAME_OFFSET_CM, MAX_RELIABLE_RANGE_CM, MIN_RELIABLE_RANGE_CM,
    SENTINEL_DISTANCE_CM, SPEED_OF_SOUND_AIR_CM_S,
};
use crate::ranging::SensorTiming;
use crate::validation::RangeGate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Minimum settle time recommended by the sensor manufacturer (milliseconds)
const RECOMMENDED_SETTLE_MS: u64 = 50;

/// System-wide configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// The two range sensors, in trilateration order
    pub sensors: [SensorConfig; 2],
    /// Output pin lit while a round contains a substituted reading
    pub indicator_led_pin: Option<u8>,
    /// Pulse protocol and loop timing
    pub timing: TimingConfig,
    /// Reliable distance window and sentinel
    pub range: RangeConfig,
    /// Translation from sensor frame to canvas coordinates (cm)
    pub frame_offset: Point2D,
    /// Batch identifier stored with every measurement
    pub batch_id: u32,
    /// Measurement log file (JSON lines)
    pub storage_path: PathBuf,
    /// Canvas used by the graphical display
    pub canvas: CanvasConfig,
}

/// Pin assignment and mounting position of one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Human-readable name used in logs
    pub name: String,
    pub trigger_pin: u8,
    pub echo_pin: u8,
    /// Mounting position (cm)
    pub position_x: f64,
    pub position_y: f64,
}

/// Pulse protocol and loop timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Trigger held low before each pulse (milliseconds)
    pub settle_ms: u64,
    /// Trigger pulse width (microseconds)
    pub trigger_pulse_us: u64,
    /// Deadline for each echo wait phase (milliseconds)
    pub echo_timeout_ms: u64,
    /// Pause between measurement rounds (milliseconds)
    pub round_interval_ms: u64,
    /// Round-trip speed of sound (cm/s)
    pub speed_of_sound_cm_s: f64,
}

/// Reliable distance window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub min_cm: f64,
    pub max_cm: f64,
    /// Value substituted for readings outside the window
    pub sentinel_cm: f64,
}

/// Display canvas dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Dot radius in canvas units
    pub dot_size: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            sensors: [
                SensorConfig {
                    name: "sensor1".to_string(),
                    trigger_pin: 23,
                    echo_pin: 24,
                    position_x: 20.0,
                    position_y: 0.0,
                },
                SensorConfig {
                    name: "sensor2".to_string(),
                    trigger_pin: 26,
                    echo_pin: 22,
                    position_x: 0.0,
                    position_y: 20.0,
                },
            ],
            indicator_led_pin: Some(21),
            timing: TimingConfig::default(),
            range: RangeConfig::default(),
            frame_offset: Point2D::new(FRAME_OFFSET_CM.0, FRAME_OFFSET_CM.1),
            batch_id: 1,
            storage_path: PathBuf::from("measurements.jsonl"),
            canvas: CanvasConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: RECOMMENDED_SETTLE_MS,
            trigger_pulse_us: 10,
            echo_timeout_ms: 1000,
            round_interval_ms: 300,
            speed_of_sound_cm_s: SPEED_OF_SOUND_AIR_CM_S,
        }
    }
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            min_cm: MIN_RELIABLE_RANGE_CM,
            max_cm: MAX_RELIABLE_RANGE_CM,
            sentinel_cm: SENTINEL_DISTANCE_CM,
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            dot_size: 1.0,
        }
    }
}

impl SensorConfig {
    pub fn geometry(&self) -> SensorGeometry {
        SensorGeometry::new(self.trigger_pin, self.echo_pin, self.position_x, self.position_y)
    }
}

impl TimingConfig {
    pub fn sensor_timing(&self) -> SensorTiming {
        SensorTiming {
            settle: Duration::from_millis(self.settle_ms),
            trigger_pulse: Duration::from_micros(self.trigger_pulse_us),
            echo_timeout: Duration::from_millis(self.echo_timeout_ms),
            speed_of_sound_cm_s: self.speed_of_sound_cm_s,
        }
    }

    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }
}

impl RangeConfig {
    pub fn gate(&self) -> RangeGate {
        RangeGate::new(self.min_cm, self.max_cm, self.sentinel_cm)
    }
}

impl SystemConfig {
    /// Geometry of both sensors, in trilateration order
    pub fn geometry(&self) -> [SensorGeometry; 2] {
        [self.sensors[0].geometry(), self.sensors[1].geometry()]
    }

    /// Build the trilaterator for this layout; fails for coincident sensors
    pub fn trilaterator(&self) -> Result<Trilaterator, GeometryError> {
        Trilaterator::with_frame_offset(&self.geometry(), self.frame_offset)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("pin {pin} is assigned to both {first} and {second}")]
    DuplicatePin {
        pin: u8,
        first: String,
        second: String,
    },

    #[error("sensor geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("failed to access config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no file path set for saving configuration")]
    NoFilePath,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that make the configuration unusable
    pub errors: Vec<ConfigError>,
    /// Problems that degrade results without preventing operation
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_first_error(self) -> ConfigResult<()> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ConfigFileData {
    system: SystemConfig,
}

/// Owns the active configuration and its backing file
pub struct ConfigurationManager {
    config: SystemConfig,
    config_file_path: Option<PathBuf>,
    is_modified: bool,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self {
            config: SystemConfig::default(),
            config_file_path: None,
            is_modified: false,
        }
    }

    /// Create configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, config: SystemConfig) -> ConfigResult<()> {
        Self::validate(&config).into_first_error()?;
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        let path = path.as_ref().to_path_buf();

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let data: ConfigFileData =
            serde_json::from_str(&content).map_err(|source| ConfigError::Serialization {
                path: path.clone(),
                source,
            })?;

        let validation = Self::validate(&data.system);
        for warning in &validation.warnings {
            log::warn!("{}: {}", path.display(), warning);
        }
        validation.into_first_error()?;

        self.config = data.system;
        self.config_file_path = Some(path);
        self.is_modified = false;
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        let path = path.as_ref().to_path_buf();
        let data = ConfigFileData {
            system: self.config.clone(),
        };

        let content =
            serde_json::to_string_pretty(&data).map_err(|source| ConfigError::Serialization {
                path: path.clone(),
                source,
            })?;
        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        self.config_file_path = Some(path);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the currently loaded file path
    pub fn save(&mut self) -> ConfigResult<()> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::NoFilePath),
        }
    }

    /// Check if configuration has been modified since last save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Change the batch identifier written with new measurements
    pub fn set_batch_id(&mut self, batch_id: u32) -> u32 {
        let old = self.config.batch_id;
        self.config.batch_id = batch_id;
        self.is_modified = true;
        old
    }

    /// Change the reliable distance window
    pub fn set_range_window(&mut self, min_cm: f64, max_cm: f64) -> ConfigResult<()> {
        let mut candidate = self.config.clone();
        candidate.range.min_cm = min_cm;
        candidate.range.max_cm = max_cm;
        self.update_config(candidate)
    }

    /// Check a configuration without applying it
    pub fn validate(config: &SystemConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        // Coincident sensors cannot be triangulated
        match config.trilaterator() {
            Ok(trilaterator) => {
                let reach = 2.0 * config.range.max_cm;
                if trilaterator.baseline() > reach {
                    result.warnings.push(format!(
                        "sensors are {:.1} cm apart; no target within {} cm of both can exist",
                        trilaterator.baseline(),
                        config.range.max_cm
                    ));
                }
            }
            Err(e) => result.errors.push(ConfigError::Geometry(e)),
        }

        let mut owners: HashMap<u8, String> = HashMap::new();
        let mut claim = |pin: u8, owner: String, errors: &mut Vec<ConfigError>| {
            if let Some(first) = owners.get(&pin) {
                errors.push(ConfigError::DuplicatePin {
                    pin,
                    first: first.clone(),
                    second: owner,
                });
            } else {
                owners.insert(pin, owner);
            }
        };
        for sensor in &config.sensors {
            claim(sensor.trigger_pin, format!("{} trigger", sensor.name), &mut result.errors);
            claim(sensor.echo_pin, format!("{} echo", sensor.name), &mut result.errors);
        }
        if let Some(led) = config.indicator_led_pin {
            claim(led, "indicator LED".to_string(), &mut result.errors);
        }

        let timing = &config.timing;
        if timing.trigger_pulse_us == 0 {
            result.errors.push(invalid("timing.trigger_pulse_us", 0, "must be positive"));
        }
        if timing.echo_timeout_ms == 0 {
            result.errors.push(invalid("timing.echo_timeout_ms", 0, "must be positive"));
        }
        if !(timing.speed_of_sound_cm_s.is_finite() && timing.speed_of_sound_cm_s > 0.0) {
            result.errors.push(invalid(
                "timing.speed_of_sound_cm_s",
                timing.speed_of_sound_cm_s,
                "must be a positive speed",
            ));
        }
        if timing.settle_ms < RECOMMENDED_SETTLE_MS {
            result.warnings.push(format!(
                "settle time {} ms is below the sensor's {} ms recovery window",
                timing.settle_ms, RECOMMENDED_SETTLE_MS
            ));
        }

        let range = &config.range;
        if !(range.min_cm >= 0.0 && range.min_cm < range.max_cm) {
            result.errors.push(invalid(
                "range",
                format!("[{}, {}]", range.min_cm, range.max_cm),
                "min_cm must be non-negative and below max_cm",
            ));
        }

        let canvas = &config.canvas;
        if canvas.width == 0 || canvas.height == 0 {
            result.errors.push(invalid(
                "canvas",
                format!("{}x{}", canvas.width, canvas.height),
                "dimensions must be positive",
            ));
        }
        if canvas.dot_size.is_nan() || canvas.dot_size <= 0.0 {
            result.errors.push(invalid("canvas.dot_size", canvas.dot_size, "must be positive"));
        }

        result
    }
}

fn invalid<V: ToString>(parameter: &str, value: V, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "ultrasonic_locator_{}_{}.json",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn test_default_system_config() {
        let config = SystemConfig::default();
        assert_eq!(config.sensors[0].trigger_pin, 23);
        assert_eq!(config.sensors[1].echo_pin, 22);
        assert_eq!(config.indicator_led_pin, Some(21));
        assert_eq!(config.frame_offset, Point2D::new(100.0, 100.0));
        assert!(ConfigurationManager::validate(&config).is_valid());
    }

    #[test]
    fn test_timing_conversion() {
        let timing = TimingConfig::default().sensor_timing();
        assert_eq!(timing, SensorTiming::default());
        assert_eq!(TimingConfig::default().round_interval(), Duration::from_millis(300));
    }

    #[test]
    fn test_coincident_sensors_are_fatal() {
        let mut config = SystemConfig::default();
        config.sensors[1].position_x = 20.0;
        config.sensors[1].position_y = 0.0;

        let result = ConfigurationManager::validate(&config);
        assert!(!result.is_valid());
        assert!(matches!(
            result.errors[0],
            ConfigError::Geometry(GeometryError::CoincidentSensors { .. })
        ));

        let mut manager = ConfigurationManager::new();
        assert!(manager.update_config(config).is_err());
        assert!(!manager.is_modified());
    }

    #[test]
    fn test_duplicate_pins_are_rejected() {
        let mut config = SystemConfig::default();
        config.indicator_led_pin = Some(24);

        let result = ConfigurationManager::validate(&config);
        assert!(result.errors.iter().any(|e| matches!(
            e,
            ConfigError::DuplicatePin { pin: 24, .. }
        )));
    }

    #[test]
    fn test_invalid_timing_and_range() {
        let mut config = SystemConfig::default();
        config.timing.echo_timeout_ms = 0;
        config.timing.speed_of_sound_cm_s = -1.0;
        config.range.min_cm = 120.0;

        let result = ConfigurationManager::validate(&config);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut config = SystemConfig::default();
        config.timing.settle_ms = 10;
        config.sensors[1].position_x = 500.0;

        let result = ConfigurationManager::validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_range_window_update() {
        let mut manager = ConfigurationManager::new();
        manager.set_range_window(2.0, 400.0).unwrap();
        assert_eq!(manager.config().range.max_cm, 400.0);
        assert!(manager.is_modified());

        assert!(manager.set_range_window(50.0, 10.0).is_err());
        assert_eq!(manager.config().range.min_cm, 2.0);
    }

    #[test]
    fn test_config_serialization() {
        let path = temp_path("roundtrip");
        let mut manager = ConfigurationManager::new();
        manager.set_batch_id(7);
        manager.save_to_file(&path).unwrap();
        assert!(!manager.is_modified());

        let loaded = ConfigurationManager::from_file(&path).unwrap();
        assert_eq!(loaded.config(), manager.config());
        assert_eq!(loaded.config().batch_id, 7);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = temp_path("invalid");
        let mut config = SystemConfig::default();
        config.sensors[1] = config.sensors[0].clone();
        config.sensors[1].name = "copy".to_string();
        fs::write(
            &path,
            serde_json::to_string(&ConfigFileData { system: config }).unwrap(),
        )
        .unwrap();

        let mut manager = ConfigurationManager::new();
        assert!(manager.load_from_file(&path).is_err());
        assert_eq!(manager.config(), &SystemConfig::default());

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            manager.load_from_file(&path),
            Err(ConfigError::Serialization { .. })
        ));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_save_without_path() {
        let mut manager = ConfigurationManager::new();
        assert!(matches!(manager.save(), Err(ConfigError::NoFilePath)));
    }
}
