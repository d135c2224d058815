//! Linux sysfs GPIO backend (`/sys/class/gpio`)
//!
//! Pins are exported on `set_pin_mode` and unexported on `release_pin` or
//! drop. Value files stay open so that polling an echo pin is a seek and a
//! one-byte read.

use crate::core::{PinDirection, PinLevel};
use crate::hardware::gpio::precise_delay;
use crate::hardware::{GpioInterface, HardwareError, HwResult};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default sysfs GPIO root
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Time udev may need to fix permissions on a freshly exported pin
const EXPORT_SETTLE: Duration = Duration::from_millis(100);

struct ExportedPin {
    direction: PinDirection,
    value: File,
}

/// GPIO backend on top of the sysfs interface
pub struct SysfsGpio {
    root: PathBuf,
    pins: HashMap<u8, ExportedPin>,
    origin: Instant,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO_ROOT)
    }

    /// Backend rooted somewhere other than `/sys/class/gpio`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            pins: HashMap::new(),
            origin: Instant::now(),
        }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn export(&self, pin: u8) -> HwResult<()> {
        if self.pin_dir(pin).exists() {
            return Ok(());
        }
        fs::write(self.root.join("export"), pin.to_string())
            .map_err(|e| HardwareError::io(pin, e))?;
        std::thread::sleep(EXPORT_SETTLE);
        Ok(())
    }

    fn unexport(&self, pin: u8) -> HwResult<()> {
        if !self.pin_dir(pin).exists() {
            return Ok(());
        }
        match fs::write(self.root.join("unexport"), pin.to_string()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HardwareError::io(pin, e)),
        }
    }

    fn exported(&mut self, pin: u8, required: PinDirection) -> HwResult<&mut ExportedPin> {
        let exported = self
            .pins
            .get_mut(&pin)
            .ok_or(HardwareError::PinNotConfigured { pin })?;
        if exported.direction != required {
            return Err(HardwareError::WrongDirection {
                pin,
                configured: direction_name(exported.direction),
                required: direction_name(required),
            });
        }
        Ok(exported)
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

fn direction_name(direction: PinDirection) -> &'static str {
    match direction {
        PinDirection::Input => "in",
        PinDirection::Output => "out",
    }
}

impl GpioInterface for SysfsGpio {
    fn set_pin_mode(&mut self, pin: u8, direction: PinDirection) -> HwResult<()> {
        self.export(pin)?;

        let dir = self.pin_dir(pin);
        fs::write(dir.join("direction"), direction_name(direction))
            .map_err(|e| HardwareError::io(pin, e))?;

        let value = OpenOptions::new()
            .read(true)
            .write(direction == PinDirection::Output)
            .open(dir.join("value"))
            .map_err(|e| HardwareError::io(pin, e))?;

        log::debug!("gpio{} exported as {}", pin, direction_name(direction));
        self.pins.insert(pin, ExportedPin { direction, value });
        Ok(())
    }

    fn write_pin(&mut self, pin: u8, level: PinLevel) -> HwResult<()> {
        let exported = self.exported(pin, PinDirection::Output)?;
        let byte: &[u8] = if level.is_high() { b"1" } else { b"0" };
        exported
            .value
            .seek(SeekFrom::Start(0))
            .and_then(|_| exported.value.write_all(byte))
            .map_err(|e| HardwareError::io(pin, e))
    }

    fn read_pin(&mut self, pin: u8) -> HwResult<PinLevel> {
        let exported = self.exported(pin, PinDirection::Input)?;
        let mut buf = [0u8; 1];
        exported
            .value
            .seek(SeekFrom::Start(0))
            .and_then(|_| exported.value.read_exact(&mut buf))
            .map_err(|e| HardwareError::io(pin, e))?;

        match buf[0] {
            b'0' => Ok(PinLevel::Low),
            b'1' => Ok(PinLevel::High),
            other => Err(HardwareError::InvalidLevel {
                pin,
                raw: String::from_utf8_lossy(&[other]).into_owned(),
            }),
        }
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn delay(&mut self, duration: Duration) {
        precise_delay(duration);
    }

    fn release_pin(&mut self, pin: u8) -> HwResult<()> {
        if self.pins.remove(&pin).is_some() {
            log::debug!("gpio{} released", pin);
        }
        self.unexport(pin)
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        let pins: Vec<u8> = self.pins.keys().copied().collect();
        for pin in pins {
            if let Err(e) = self.release_pin(pin) {
                log::warn!("failed to release gpio{}: {}", pin, e);
            }
        }
    }
}
