//! Blocking driving loop
//!
//! Measures both sensors one after the other, gates the readings, stores
//! them, and hands the intersection to a display. All collaborators are
//! passed in; the loop never configures pins itself.

use crate::algorithms::{IntersectionResult, Trilaterator};
use crate::api::display::DisplaySink;
use crate::api::storage::PersistenceSink;
use crate::api::types::{LocatorError, LocatorResult, LocatorStats, RoundReport, SensorReading};
use crate::core::{PinDirection, PinLevel};
use crate::hardware::GpioInterface;
use crate::ranging::RangeSensor;
use crate::utils::SystemConfig;
use crate::validation::{RangeGate, ReadingStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Configure every pin named in `config`: triggers and LED as outputs, echoes as inputs
pub fn configure_pins<G: GpioInterface + ?Sized>(io: &mut G, config: &SystemConfig) -> LocatorResult<()> {
    for sensor in &config.sensors {
        io.set_pin_mode(sensor.trigger_pin, PinDirection::Output)?;
        io.set_pin_mode(sensor.echo_pin, PinDirection::Input)?;
    }
    if let Some(led) = config.indicator_led_pin {
        io.set_pin_mode(led, PinDirection::Output)?;
        io.write_pin(led, PinLevel::Low)?;
    }
    Ok(())
}

/// Release every pin named in `config`, continuing past failures
pub fn release_pins<G: GpioInterface + ?Sized>(io: &mut G, config: &SystemConfig) -> LocatorResult<()> {
    let mut pins = Vec::new();
    for sensor in &config.sensors {
        pins.push(sensor.trigger_pin);
        pins.push(sensor.echo_pin);
    }
    pins.extend(config.indicator_led_pin);

    let mut first_error = None;
    for pin in pins {
        if let Err(e) = io.release_pin(pin) {
            log::warn!("failed to release pin {}: {}", pin, e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Synchronous two-sensor positioning loop
pub struct BlockingLocator<G, P, D> {
    io: G,
    sensors: [RangeSensor; 2],
    names: [String; 2],
    gate: RangeGate,
    trilaterator: Trilaterator,
    store: P,
    display: D,
    batch_id: u32,
    indicator_led: Option<u8>,
    round_interval: Duration,
    stats: LocatorStats,
}

impl<G, P, D> BlockingLocator<G, P, D>
where
    G: GpioInterface,
    P: PersistenceSink,
    D: DisplaySink,
{
    /// Build the loop from a configuration; fails for coincident sensors
    pub fn new(config: &SystemConfig, io: G, store: P, display: D) -> LocatorResult<Self> {
        let trilaterator = config.trilaterator()?;
        let timing = config.timing.sensor_timing();
        let geometry = config.geometry();

        Ok(Self {
            io,
            sensors: [
                RangeSensor::with_timing(geometry[0], timing),
                RangeSensor::with_timing(geometry[1], timing),
            ],
            names: [config.sensors[0].name.clone(), config.sensors[1].name.clone()],
            gate: config.range.gate(),
            trilaterator,
            store,
            display,
            batch_id: config.batch_id,
            indicator_led: config.indicator_led_pin,
            round_interval: config.timing.round_interval(),
            stats: LocatorStats::default(),
        })
    }

    pub fn stats(&self) -> &LocatorStats {
        &self.stats
    }

    pub fn trilaterator(&self) -> &Trilaterator {
        &self.trilaterator
    }

    pub fn io(&self) -> &G {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut G {
        &mut self.io
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn into_parts(self) -> (G, P, D) {
        (self.io, self.store, self.display)
    }

    /// Measure both sensors, store the round and display the result
    pub fn run_round(&mut self) -> LocatorResult<RoundReport> {
        let first = self.read_sensor(0)?;
        let second = self.read_sensor(1)?;

        if first.gated.is_substituted() || second.gated.is_substituted() {
            self.set_indicator(PinLevel::High)?;
        }

        let (dist1, dist2) = (first.gated.distance_cm, second.gated.distance_cm);
        let record = self.store.append(dist1, dist2, self.batch_id)?;

        let intersection = self.trilaterator.intersect(dist1, dist2);
        match &intersection {
            IntersectionResult::Point(fix) => {
                if fix.clamped {
                    self.stats.clamped_intersections += 1;
                    log::debug!(
                        "circles ({:.2}, {:.2}) do not intersect, using tangent point",
                        dist1,
                        dist2
                    );
                }
                self.display.show(&fix.point);
            }
            IntersectionResult::Degenerate(reason) => {
                self.stats.degenerate_intersections += 1;
                log::warn!("no position for round {}: {:?}", record.id, reason);
            }
        }

        self.stats.rounds += 1;
        Ok(RoundReport {
            round: self.stats.rounds,
            readings: [first, second],
            record,
            intersection,
        })
    }

    /// Run rounds until `running` is cleared or `max_rounds` have completed
    ///
    /// The flag is only checked between rounds. Returns the number of rounds run.
    pub fn run(&mut self, running: &AtomicBool, max_rounds: Option<u64>) -> LocatorResult<u64> {
        let mut completed = 0;
        while running.load(Ordering::SeqCst) && max_rounds.map_or(true, |max| completed < max) {
            self.run_round()?;
            completed += 1;

            self.io.delay(self.round_interval);
            self.set_indicator(PinLevel::Low)?;
        }
        log::info!("stopped after {} rounds", completed);
        Ok(completed)
    }

    fn read_sensor(&mut self, index: usize) -> LocatorResult<SensorReading> {
        let name = &self.names[index];
        let raw = match self.sensors[index].measure(&mut self.io) {
            Err(e) if !e.is_transient() => {
                return Err(LocatorError::Sensor {
                    sensor: name.clone(),
                    source: e,
                })
            }
            other => other,
        };

        match &raw {
            Ok(distance) => log::debug!("{}: {:.2} cm", name, distance),
            Err(e) => {
                self.stats.faults += 1;
                log::warn!("{}: {}", name, e);
            }
        }

        let gated = self.gate.gate(&raw);
        if gated.is_substituted() {
            self.stats.substituted_readings += 1;
            if let (Ok(distance), status) = (&raw, gated.status) {
                let reason = match status {
                    ReadingStatus::TooFar => "above",
                    ReadingStatus::TooClose => "below",
                    _ => "outside",
                };
                log::warn!(
                    "{}: {:.2} cm is {} the reliable range [{}, {}], using {}",
                    name,
                    distance,
                    reason,
                    self.gate.min_cm(),
                    self.gate.max_cm(),
                    gated.distance_cm
                );
            }
        }

        Ok(SensorReading { raw, gated })
    }

    fn set_indicator(&mut self, level: PinLevel) -> LocatorResult<()> {
        if let Some(led) = self.indicator_led {
            self.io.write_pin(led, level)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::display::DotCanvas;
    use crate::api::storage::MemoryStore;
    use crate::core::Point2D;
    use crate::hardware::{EchoProfile, MockGpio};
    use crate::ranging::RangingError;

    type TestLocator = BlockingLocator<MockGpio, MemoryStore, DotCanvas>;

    fn speed() -> f64 {
        SystemConfig::default().timing.speed_of_sound_cm_s
    }

    /// Mock whose sensors see a target at `target` (sensor frame)
    fn locator_for(config: &SystemConfig, target: Point2D) -> TestLocator {
        let mut gpio = MockGpio::new();
        configure_pins(&mut gpio, config).unwrap();
        for sensor in &config.sensors {
            let distance = target.distance_to(&sensor.geometry().position());
            gpio.attach_sensor(
                sensor.trigger_pin,
                sensor.echo_pin,
                EchoProfile::for_distance(distance, speed()),
            );
        }
        BlockingLocator::new(config, gpio, MemoryStore::new(), DotCanvas::new(400, 400, 1.0)).unwrap()
    }

    #[test]
    fn test_configure_and_release_pins() {
        let config = SystemConfig::default();
        let mut gpio = MockGpio::new();
        configure_pins(&mut gpio, &config).unwrap();

        assert_eq!(gpio.pin_mode(23), Some(PinDirection::Output));
        assert_eq!(gpio.pin_mode(24), Some(PinDirection::Input));
        assert_eq!(gpio.pin_mode(21), Some(PinDirection::Output));
        assert_eq!(gpio.output_level(21), Some(PinLevel::Low));

        release_pins(&mut gpio, &config).unwrap();
        for pin in [21, 22, 23, 24, 26] {
            assert!(gpio.is_released(pin));
        }
    }

    #[test]
    fn test_round_locates_target() {
        let config = SystemConfig::default();
        let mut locator = locator_for(&config, Point2D::new(13.5355, 13.5355));

        let report = locator.run_round().unwrap();
        assert!(!report.has_substitution());
        assert!((report.record.distance_one_cm - 15.0).abs() < 0.05);
        assert!((report.record.distance_two_cm - 15.0).abs() < 0.05);
        assert_eq!(report.record.batch_id, 1);

        let point = report.intersection.point().unwrap();
        assert!((point.x - 113.54).abs() < 0.2 && (point.y - 113.54).abs() < 0.2);
        assert_eq!(locator.display().dots(), &[point]);
        assert_eq!(locator.io().output_level(21), Some(PinLevel::Low));
    }

    #[test]
    fn test_out_of_range_reading_uses_sentinel() {
        let config = SystemConfig::default();
        let mut locator = locator_for(&config, Point2D::new(13.5355, 13.5355));
        locator
            .io_mut()
            .set_profile(23, EchoProfile::for_distance(150.0, speed()));

        let report = locator.run_round().unwrap();
        assert_eq!(report.readings[0].gated.status, ReadingStatus::TooFar);
        assert!((report.readings[0].raw.as_ref().unwrap() - 150.0).abs() < 0.05);
        assert_eq!(report.record.distance_one_cm, 0.0);
        assert!(report.has_substitution());
        assert_eq!(locator.io().output_level(21), Some(PinLevel::High));
        assert_eq!(locator.stats().substituted_readings, 1);
        assert_eq!(locator.stats().faults, 0);
    }

    #[test]
    fn test_timeout_is_substituted_not_fatal() {
        let config = SystemConfig::default();
        let mut locator = locator_for(&config, Point2D::new(13.5355, 13.5355));
        locator.io_mut().set_profile(26, EchoProfile::silent());

        let report = locator.run_round().unwrap();
        assert!(matches!(
            report.readings[1].raw,
            Err(RangingError::Timeout { .. })
        ));
        assert_eq!(report.readings[1].gated.status, ReadingStatus::Fault);
        assert_eq!(report.record.distance_two_cm, 0.0);
        assert!(report.intersection.point().is_some());
        assert_eq!(locator.stats().faults, 1);
    }

    #[test]
    fn test_both_sentinels_give_clamped_midpoint() {
        let config = SystemConfig::default();
        let mut locator = locator_for(&config, Point2D::new(13.5355, 13.5355));
        locator.io_mut().set_profile(23, EchoProfile::for_distance(2.0, speed()));
        locator.io_mut().set_profile(26, EchoProfile::for_distance(120.0, speed()));

        let report = locator.run_round().unwrap();
        let point = report.intersection.point().unwrap();
        assert!((point.x - 110.0).abs() < 1e-9 && (point.y - 110.0).abs() < 1e-9);
        assert_eq!(locator.stats().clamped_intersections, 1);
    }

    #[test]
    fn test_run_stops_after_max_rounds_and_clears_indicator() {
        let config = SystemConfig::default();
        let mut locator = locator_for(&config, Point2D::new(13.5355, 13.5355));
        locator.io_mut().queue_profile(23, EchoProfile::for_distance(150.0, speed()));

        let running = AtomicBool::new(true);
        let rounds = locator.run(&running, Some(3)).unwrap();
        assert_eq!(rounds, 3);

        let ids: Vec<u64> = locator.store().records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(locator.display().dots().len(), 3);

        let led = locator.io().writes_to(21);
        assert!(led.contains(&PinLevel::High));
        assert_eq!(led.last(), Some(&PinLevel::Low));
    }

    #[test]
    fn test_run_respects_cleared_flag() {
        let config = SystemConfig::default();
        let mut locator = locator_for(&config, Point2D::new(13.5355, 13.5355));
        let running = AtomicBool::new(false);
        assert_eq!(locator.run(&running, None).unwrap(), 0);
        assert!(locator.store().records().is_empty());
    }

    #[test]
    fn test_unconfigured_pins_stop_the_loop() {
        let config = SystemConfig::default();
        let mut locator: TestLocator = BlockingLocator::new(
            &config,
            MockGpio::new(),
            MemoryStore::new(),
            DotCanvas::new(400, 400, 1.0),
        )
        .unwrap();

        match locator.run_round() {
            Err(LocatorError::Sensor { sensor, source }) => {
                assert_eq!(sensor, "sensor1");
                assert!(!source.is_transient());
            }
            other => panic!("expected sensor error, got {:?}", other.map(|r| r.round)),
        }
        assert!(locator.store().records().is_empty());
    }

    #[test]
    fn test_coincident_sensors_rejected_at_construction() {
        let mut config = SystemConfig::default();
        config.sensors[1].position_x = config.sensors[0].position_x;
        config.sensors[1].position_y = config.sensors[0].position_y;

        let result: LocatorResult<TestLocator> = BlockingLocator::new(
            &config,
            MockGpio::new(),
            MemoryStore::new(),
            DotCanvas::new(400, 400, 1.0),
        );
        assert!(matches!(result, Err(LocatorError::Geometry(_))));
    }
}
