//! Hardware abstraction layer for digital pin access
//!
//! The ranging code only sees [`GpioInterface`]. Backends: Linux sysfs for
//! real boards and a scripted mock for tests and simulation.

pub mod error;
pub mod gpio;
pub mod mock;
pub mod sysfs;

pub use error::{HardwareError, HwResult};
pub use gpio::GpioInterface;
pub use mock::{EchoProfile, MockGpio};
pub use sysfs::SysfsGpio;
