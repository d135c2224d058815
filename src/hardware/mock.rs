//! Mock GPIO backend for testing and simulation
//!
//! Sensors are attached as trigger/echo pairs with an [`EchoProfile`]. A
//! falling edge on the trigger pin schedules an echo pulse on the paired echo
//! pin, which `read_pin` then reports against the mock's clock.

use crate::core::{PinDirection, PinLevel};
use crate::hardware::gpio::precise_delay;
use crate::hardware::{GpioInterface, HardwareError, HwResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Delay between the trigger falling edge and the echo rising edge
const DEFAULT_ECHO_LATENCY: Duration = Duration::from_micros(100);

/// Shape of the echo pulse a simulated sensor answers with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoProfile {
    /// Time from trigger falling edge to echo rising edge; `None` never rises
    pub rise_delay: Option<Duration>,
    /// Pulse width; `None` stays high forever
    pub width: Option<Duration>,
}

impl EchoProfile {
    /// Echo for an object `distance_cm` away, given the round-trip speed of sound
    pub fn for_distance(distance_cm: f64, speed_of_sound_cm_s: f64) -> Self {
        let seconds = (2.0 * distance_cm.max(0.0)) / speed_of_sound_cm_s;
        Self {
            rise_delay: Some(DEFAULT_ECHO_LATENCY),
            width: Some(Duration::from_secs_f64(seconds)),
        }
    }

    /// Echo pin never goes high
    pub fn silent() -> Self {
        Self {
            rise_delay: None,
            width: None,
        }
    }

    /// Echo pin goes high and never comes back down
    pub fn stuck_high() -> Self {
        Self {
            rise_delay: Some(DEFAULT_ECHO_LATENCY),
            width: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MockClock {
    /// Deterministic clock advanced by polls and delays
    Virtual { now: Duration, poll_step: Duration },
    /// Wall-clock time
    RealTime { origin: Instant },
}

#[derive(Debug)]
struct AttachedSensor {
    echo_pin: u8,
    default_profile: EchoProfile,
    queued: VecDeque<EchoProfile>,
}

#[derive(Debug, Clone, Copy)]
struct EchoWindow {
    rise_at: Option<Duration>,
    fall_at: Option<Duration>,
}

impl EchoWindow {
    fn level_at(&self, t: Duration) -> PinLevel {
        let risen = self.rise_at.map_or(false, |rise| t >= rise);
        let fallen = self.fall_at.map_or(false, |fall| t >= fall);
        PinLevel::from(risen && !fallen)
    }
}

/// Mock GPIO backend
pub struct MockGpio {
    clock: MockClock,
    modes: HashMap<u8, PinDirection>,
    outputs: HashMap<u8, PinLevel>,
    input_levels: HashMap<u8, PinLevel>,
    writes: Vec<(Duration, u8, PinLevel)>,
    sensors: HashMap<u8, AttachedSensor>,
    windows: HashMap<u8, EchoWindow>,
    released: HashSet<u8>,
    reads: u64,
}

impl MockGpio {
    /// Mock with a virtual clock advancing 1 µs per pin read
    pub fn new() -> Self {
        Self::with_clock(MockClock::Virtual {
            now: Duration::ZERO,
            poll_step: Duration::from_micros(1),
        })
    }

    /// Mock with a virtual clock advancing `poll_step` per pin read
    pub fn with_poll_step(poll_step: Duration) -> Self {
        Self::with_clock(MockClock::Virtual {
            now: Duration::ZERO,
            poll_step,
        })
    }

    /// Mock driven by the wall clock; delays really block
    pub fn realtime() -> Self {
        Self::with_clock(MockClock::RealTime {
            origin: Instant::now(),
        })
    }

    fn with_clock(clock: MockClock) -> Self {
        Self {
            clock,
            modes: HashMap::new(),
            outputs: HashMap::new(),
            input_levels: HashMap::new(),
            writes: Vec::new(),
            sensors: HashMap::new(),
            windows: HashMap::new(),
            released: HashSet::new(),
            reads: 0,
        }
    }

    /// Pair a trigger pin with an echo pin answering with `profile`
    pub fn attach_sensor(&mut self, trigger_pin: u8, echo_pin: u8, profile: EchoProfile) {
        self.sensors.insert(
            trigger_pin,
            AttachedSensor {
                echo_pin,
                default_profile: profile,
                queued: VecDeque::new(),
            },
        );
    }

    /// Replace the profile used by every following trigger cycle
    pub fn set_profile(&mut self, trigger_pin: u8, profile: EchoProfile) {
        if let Some(sensor) = self.sensors.get_mut(&trigger_pin) {
            sensor.default_profile = profile;
        }
    }

    /// Answer the next trigger cycle with `profile`, then fall back to the default
    pub fn queue_profile(&mut self, trigger_pin: u8, profile: EchoProfile) {
        if let Some(sensor) = self.sensors.get_mut(&trigger_pin) {
            sensor.queued.push_back(profile);
        }
    }

    /// Fix the level of an input pin that has no sensor attached
    pub fn set_input_level(&mut self, pin: u8, level: PinLevel) {
        self.input_levels.insert(pin, level);
    }

    pub fn pin_mode(&self, pin: u8) -> Option<PinDirection> {
        self.modes.get(&pin).copied()
    }

    /// Last level written to an output pin
    pub fn output_level(&self, pin: u8) -> Option<PinLevel> {
        self.outputs.get(&pin).copied()
    }

    /// Every level written to `pin`, in order
    pub fn writes_to(&self, pin: u8) -> Vec<PinLevel> {
        self.writes
            .iter()
            .filter(|(_, p, _)| *p == pin)
            .map(|(_, _, level)| *level)
            .collect()
    }

    /// Timestamps of every write to `pin`, in order
    pub fn write_times(&self, pin: u8) -> Vec<Duration> {
        self.writes
            .iter()
            .filter(|(_, p, _)| *p == pin)
            .map(|(t, _, _)| *t)
            .collect()
    }

    pub fn is_released(&self, pin: u8) -> bool {
        self.released.contains(&pin)
    }

    /// Number of `read_pin` calls so far
    pub fn read_count(&self) -> u64 {
        self.reads
    }

    fn advance(&mut self, by: Duration) {
        if let MockClock::Virtual { now, .. } = &mut self.clock {
            *now += by;
        }
    }

    fn require_mode(&self, pin: u8, required: PinDirection) -> HwResult<()> {
        match self.modes.get(&pin) {
            None => Err(HardwareError::PinNotConfigured { pin }),
            Some(mode) if *mode != required => Err(HardwareError::WrongDirection {
                pin,
                configured: direction_name(*mode),
                required: direction_name(required),
            }),
            Some(_) => Ok(()),
        }
    }

    fn on_trigger_edge(&mut self, trigger_pin: u8, previous: PinLevel, level: PinLevel) {
        let now = self.now();
        let Some(sensor) = self.sensors.get_mut(&trigger_pin) else {
            return;
        };

        match (previous, level) {
            (PinLevel::Low, PinLevel::High) => {
                self.windows.remove(&sensor.echo_pin);
            }
            (PinLevel::High, PinLevel::Low) => {
                let profile = sensor.queued.pop_front().unwrap_or(sensor.default_profile);
                let rise_at = profile.rise_delay.map(|delay| now + delay);
                let fall_at = match (rise_at, profile.width) {
                    (Some(rise), Some(width)) => Some(rise + width),
                    _ => None,
                };
                self.windows.insert(sensor.echo_pin, EchoWindow { rise_at, fall_at });
            }
            _ => {}
        }
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new()
    }
}

fn direction_name(direction: PinDirection) -> &'static str {
    match direction {
        PinDirection::Input => "input",
        PinDirection::Output => "output",
    }
}

impl GpioInterface for MockGpio {
    fn set_pin_mode(&mut self, pin: u8, direction: PinDirection) -> HwResult<()> {
        self.modes.insert(pin, direction);
        self.released.remove(&pin);
        if direction == PinDirection::Output {
            self.outputs.entry(pin).or_insert(PinLevel::Low);
        }
        Ok(())
    }

    fn write_pin(&mut self, pin: u8, level: PinLevel) -> HwResult<()> {
        self.require_mode(pin, PinDirection::Output)?;

        let previous = self.outputs.insert(pin, level).unwrap_or(PinLevel::Low);
        let now = self.now();
        self.writes.push((now, pin, level));
        self.on_trigger_edge(pin, previous, level);
        Ok(())
    }

    fn read_pin(&mut self, pin: u8) -> HwResult<PinLevel> {
        self.require_mode(pin, PinDirection::Input)?;

        if let MockClock::Virtual { poll_step, .. } = self.clock {
            self.advance(poll_step);
        }
        self.reads += 1;

        let now = self.now();
        let level = match self.windows.get(&pin) {
            Some(window) => window.level_at(now),
            None => self.input_levels.get(&pin).copied().unwrap_or(PinLevel::Low),
        };
        Ok(level)
    }

    fn now(&self) -> Duration {
        match self.clock {
            MockClock::Virtual { now, .. } => now,
            MockClock::RealTime { origin } => origin.elapsed(),
        }
    }

    fn delay(&mut self, duration: Duration) {
        match self.clock {
            MockClock::Virtual { .. } => self.advance(duration),
            MockClock::RealTime { .. } => precise_delay(duration),
        }
    }

    fn release_pin(&mut self, pin: u8) -> HwResult<()> {
        self.modes.remove(&pin);
        self.outputs.remove(&pin);
        self.released.insert(pin);
        Ok(())
    }
}
