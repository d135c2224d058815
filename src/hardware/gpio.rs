//! Digital I/O interface the ranging code is written against

use crate::core::{PinDirection, PinLevel};
use crate::hardware::HwResult;
use std::time::{Duration, Instant};

/// Hardware abstraction for digital pins plus a monotonic clock
///
/// Range sensors only toggle and sample pins; configuring them is a one-time
/// setup step done by the owner of the backend.
pub trait GpioInterface {
    /// Configure a pin as input or output
    fn set_pin_mode(&mut self, pin: u8, direction: PinDirection) -> HwResult<()>;

    /// Drive an output pin
    fn write_pin(&mut self, pin: u8, level: PinLevel) -> HwResult<()>;

    /// Sample an input pin
    fn read_pin(&mut self, pin: u8) -> HwResult<PinLevel>;

    /// Monotonic time since an arbitrary, fixed origin
    fn now(&self) -> Duration;

    /// Block for at least `duration`
    fn delay(&mut self, duration: Duration);

    /// Return a pin to its unconfigured state
    fn release_pin(&mut self, _pin: u8) -> HwResult<()> {
        Ok(())
    }
}

impl<G: GpioInterface + ?Sized> GpioInterface for &mut G {
    fn set_pin_mode(&mut self, pin: u8, direction: PinDirection) -> HwResult<()> {
        (**self).set_pin_mode(pin, direction)
    }

    fn write_pin(&mut self, pin: u8, level: PinLevel) -> HwResult<()> {
        (**self).write_pin(pin, level)
    }

    fn read_pin(&mut self, pin: u8) -> HwResult<PinLevel> {
        (**self).read_pin(pin)
    }

    fn now(&self) -> Duration {
        (**self).now()
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }

    fn release_pin(&mut self, pin: u8) -> HwResult<()> {
        (**self).release_pin(pin)
    }
}

impl<G: GpioInterface + ?Sized> GpioInterface for Box<G> {
    fn set_pin_mode(&mut self, pin: u8, direction: PinDirection) -> HwResult<()> {
        (**self).set_pin_mode(pin, direction)
    }

    fn write_pin(&mut self, pin: u8, level: PinLevel) -> HwResult<()> {
        (**self).write_pin(pin, level)
    }

    fn read_pin(&mut self, pin: u8) -> HwResult<PinLevel> {
        (**self).read_pin(pin)
    }

    fn now(&self) -> Duration {
        (**self).now()
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }

    fn release_pin(&mut self, pin: u8) -> HwResult<()> {
        (**self).release_pin(pin)
    }
}

/// Sleep for `duration`, spinning instead when it is too short for the scheduler
pub(crate) fn precise_delay(duration: Duration) {
    if duration >= Duration::from_millis(2) {
        std::thread::sleep(duration);
        return;
    }
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
