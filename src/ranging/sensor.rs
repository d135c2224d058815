//! Trigger/echo pulse timing for one ultrasonic range sensor

use crate::core::{
    PinLevel, SensorGeometry, ECHO_PHASE_TIMEOUT, SPEED_OF_SOUND_AIR_CM_S, TRIGGER_PULSE,
    TRIGGER_SETTLE,
};
use crate::hardware::GpioInterface;
use crate::ranging::{EchoPhase, RangingError};
use std::time::Duration;

/// Distance in centimeters, or the fault that prevented one
pub type DistanceSample = Result<f64, RangingError>;

/// Timing parameters of the trigger/echo protocol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorTiming {
    /// Trigger held low before each pulse
    pub settle: Duration,
    /// Width of the trigger pulse
    pub trigger_pulse: Duration,
    /// Deadline for each echo wait phase
    pub echo_timeout: Duration,
    /// Round-trip speed of sound (cm/s)
    pub speed_of_sound_cm_s: f64,
}

impl Default for SensorTiming {
    fn default() -> Self {
        Self {
            settle: TRIGGER_SETTLE,
            trigger_pulse: TRIGGER_PULSE,
            echo_timeout: ECHO_PHASE_TIMEOUT,
            speed_of_sound_cm_s: SPEED_OF_SOUND_AIR_CM_S,
        }
    }
}

/// One ultrasonic sensor on a trigger/echo pin pair
///
/// Holds no state between measurements. Pins must already be configured
/// (trigger as output, echo as input) on the backend passed to [`measure`].
///
/// [`measure`]: RangeSensor::measure
#[derive(Debug, Clone)]
pub struct RangeSensor {
    geometry: SensorGeometry,
    timing: SensorTiming,
}

impl RangeSensor {
    pub fn new(geometry: SensorGeometry) -> Self {
        Self::with_timing(geometry, SensorTiming::default())
    }

    pub fn with_timing(geometry: SensorGeometry, timing: SensorTiming) -> Self {
        Self { geometry, timing }
    }

    pub fn geometry(&self) -> &SensorGeometry {
        &self.geometry
    }

    pub fn timing(&self) -> &SensorTiming {
        &self.timing
    }

    /// Run one trigger/echo cycle and convert the echo width to centimeters
    ///
    /// Blocks for the settle time plus at most two echo deadlines. The echo
    /// pin is busy-polled; a timeout is returned to the caller, never retried.
    pub fn measure<G: GpioInterface + ?Sized>(&self, io: &mut G) -> DistanceSample {
        let trigger = self.geometry.trigger_pin;
        let echo = self.geometry.echo_pin;

        io.write_pin(trigger, PinLevel::Low)?;
        io.delay(self.timing.settle);

        io.write_pin(trigger, PinLevel::High)?;
        io.delay(self.timing.trigger_pulse);
        io.write_pin(trigger, PinLevel::Low)?;

        let start = self.wait_for_level(io, echo, PinLevel::High, EchoPhase::RisingEdge)?;
        let stop = self.wait_for_level(io, echo, PinLevel::Low, EchoPhase::FallingEdge)?;

        let distance = self.echo_to_distance(stop.saturating_sub(start));
        if distance <= 0.0 {
            return Err(RangingError::NoEcho);
        }
        Ok(distance)
    }

    /// One-way distance for a round-trip echo width, rounded to 0.01 cm
    ///
    /// Halves round to even.
    pub fn echo_to_distance(&self, echo_width: Duration) -> f64 {
        let distance = echo_width.as_secs_f64() * self.timing.speed_of_sound_cm_s / 2.0;
        (distance * 100.0).round_ties_even() / 100.0
    }

    fn wait_for_level<G: GpioInterface + ?Sized>(
        &self,
        io: &mut G,
        pin: u8,
        target: PinLevel,
        phase: EchoPhase,
    ) -> Result<Duration, RangingError> {
        let phase_start = io.now();
        loop {
            if io.read_pin(pin)? == target {
                return Ok(io.now());
            }
            let waited = io.now().saturating_sub(phase_start);
            if waited > self.timing.echo_timeout {
                return Err(RangingError::Timeout { phase, waited });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PinDirection;
    use crate::hardware::{EchoProfile, HardwareError, MockGpio};
    use std::time::Instant;

    const TRIGGER: u8 = 23;
    const ECHO: u8 = 24;

    fn sensor() -> RangeSensor {
        RangeSensor::new(SensorGeometry::new(TRIGGER, ECHO, 20.0, 0.0))
    }

    fn gpio_with(profile: EchoProfile) -> MockGpio {
        let mut gpio = MockGpio::new();
        gpio.set_pin_mode(TRIGGER, PinDirection::Output).unwrap();
        gpio.set_pin_mode(ECHO, PinDirection::Input).unwrap();
        gpio.attach_sensor(TRIGGER, ECHO, profile);
        gpio
    }

    #[test]
    fn test_measures_simulated_distance() {
        let mut gpio = gpio_with(EchoProfile::for_distance(42.0, SPEED_OF_SOUND_AIR_CM_S));
        let distance = sensor().measure(&mut gpio).unwrap();
        assert!((distance - 42.0).abs() < 0.05, "got {}", distance);
    }

    #[test]
    fn test_result_is_rounded_to_two_decimals() {
        let mut gpio = gpio_with(EchoProfile::for_distance(17.123, SPEED_OF_SOUND_AIR_CM_S));
        let distance = sensor().measure(&mut gpio).unwrap();
        assert!(((distance * 100.0).round() - distance * 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_echo_to_distance_conversion() {
        let sensor = sensor();
        // 1 ms round trip at 34300 cm/s is 17.15 cm one way
        assert_eq!(sensor.echo_to_distance(Duration::from_millis(1)), 17.15);
        assert_eq!(sensor.echo_to_distance(Duration::from_micros(5831)), 100.0);
        assert_eq!(sensor.echo_to_distance(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_half_hundredths_round_to_even() {
        let slow = |speed_of_sound_cm_s| {
            RangeSensor::with_timing(
                SensorGeometry::new(TRIGGER, ECHO, 20.0, 0.0),
                SensorTiming {
                    speed_of_sound_cm_s,
                    ..SensorTiming::default()
                },
            )
        };
        // 1 s round trip: exactly 0.125 cm and 0.375 cm one way
        assert_eq!(slow(0.25).echo_to_distance(Duration::from_secs(1)), 0.12);
        assert_eq!(slow(0.75).echo_to_distance(Duration::from_secs(1)), 0.38);
    }

    #[test]
    fn test_trigger_protocol() {
        let mut gpio = gpio_with(EchoProfile::for_distance(10.0, SPEED_OF_SOUND_AIR_CM_S));
        sensor().measure(&mut gpio).unwrap();

        assert_eq!(
            gpio.writes_to(TRIGGER),
            vec![PinLevel::Low, PinLevel::High, PinLevel::Low]
        );
        let times = gpio.write_times(TRIGGER);
        assert!(times[1] - times[0] >= TRIGGER_SETTLE);
        assert_eq!(times[2] - times[1], TRIGGER_PULSE);
    }

    #[test]
    fn test_rising_edge_timeout() {
        let mut gpio = gpio_with(EchoProfile::silent());
        match sensor().measure(&mut gpio) {
            Err(RangingError::Timeout { phase, waited }) => {
                assert_eq!(phase, EchoPhase::RisingEdge);
                assert!(waited > ECHO_PHASE_TIMEOUT);
                assert!(waited < ECHO_PHASE_TIMEOUT + Duration::from_millis(1));
            }
            other => panic!("expected rising edge timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_falling_edge_timeout() {
        let mut gpio = gpio_with(EchoProfile::stuck_high());
        match sensor().measure(&mut gpio) {
            Err(RangingError::Timeout { phase, .. }) => assert_eq!(phase, EchoPhase::FallingEdge),
            other => panic!("expected falling edge timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_each_phase_has_its_own_deadline() {
        // Rise after 0.9 s, fall 0.9 s later: both phases stay under 1 s
        let profile = EchoProfile {
            rise_delay: Some(Duration::from_millis(900)),
            width: Some(Duration::from_millis(900)),
        };
        let mut gpio = gpio_with(profile);
        let distance = sensor().measure(&mut gpio).unwrap();
        assert!((distance - 0.9 * SPEED_OF_SOUND_AIR_CM_S / 2.0).abs() < 0.05);
    }

    #[test]
    fn test_zero_width_pulse_is_no_echo() {
        let profile = EchoProfile {
            rise_delay: Some(Duration::from_micros(100)),
            width: Some(Duration::from_nanos(100)),
        };
        let mut gpio = MockGpio::with_poll_step(Duration::from_nanos(50));
        gpio.set_pin_mode(TRIGGER, PinDirection::Output).unwrap();
        gpio.set_pin_mode(ECHO, PinDirection::Input).unwrap();
        gpio.attach_sensor(TRIGGER, ECHO, profile);

        assert!(matches!(sensor().measure(&mut gpio), Err(RangingError::NoEcho)));
    }

    #[test]
    fn test_unconfigured_pins_surface_hardware_error() {
        let mut gpio = MockGpio::new();
        let result = sensor().measure(&mut gpio);
        assert!(matches!(
            result,
            Err(RangingError::Hardware(HardwareError::PinNotConfigured { pin: TRIGGER }))
        ));
        assert!(!result.unwrap_err().is_transient());
    }

    #[test]
    fn test_consecutive_measurements_are_independent() {
        let mut gpio = gpio_with(EchoProfile::for_distance(30.0, SPEED_OF_SOUND_AIR_CM_S));
        gpio.queue_profile(TRIGGER, EchoProfile::silent());
        let sensor = sensor();

        assert!(sensor.measure(&mut gpio).is_err());
        let distance = sensor.measure(&mut gpio).unwrap();
        assert!((distance - 30.0).abs() < 0.05);
    }

    #[test]
    fn test_timeout_is_bounded_in_wall_clock_time() {
        let timing = SensorTiming {
            settle: Duration::ZERO,
            ..SensorTiming::default()
        };
        let sensor = RangeSensor::with_timing(SensorGeometry::new(TRIGGER, ECHO, 20.0, 0.0), timing);

        let mut gpio = MockGpio::realtime();
        gpio.set_pin_mode(TRIGGER, PinDirection::Output).unwrap();
        gpio.set_pin_mode(ECHO, PinDirection::Input).unwrap();
        gpio.attach_sensor(TRIGGER, ECHO, EchoProfile::silent());

        let started = Instant::now();
        let result = sensor.measure(&mut gpio);
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(RangingError::Timeout { .. })));
        assert!(elapsed >= Duration::from_secs(1), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1050), "returned after {:?}", elapsed);
    }
}
