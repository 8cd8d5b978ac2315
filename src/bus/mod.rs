pub mod clock;
pub mod i2c;
pub mod resource;
pub mod spi;

use std::fmt;

use crate::errors::Result;

pub use clock::{elapsed_ms, Clock, SystemClock};
pub use i2c::I2cTransport;
pub use resource::{BusProvider, BusResource, Session};
pub use spi::SpiTransport;

/// Bus protocol used to reach the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    I2c,
    Spi,
}

impl Protocol {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "i2c" => Some(Protocol::I2c),
            "spi" => Some(Protocol::Spi),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::I2c => f.write_str("I2C"),
            Protocol::Spi => f.write_str("SPI"),
        }
    }
}

/// Register-level framing over one bus protocol.
///
/// Implemented once per protocol; the active strategy is chosen when the
/// interface is initialised and never changes for the life of the session.
pub trait RegisterBus {
    /// Read `buf.len()` bytes starting at register `reg`
    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<()>;
    /// Write `data` starting at register `reg`
    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<()>;
}

/// Callback set the sensor-driver core uses for every register access.
pub trait Interface {
    fn read(&mut self, reg: u8, buf: &mut [u8]) -> Result<()>;
    fn write(&mut self, reg: u8, data: &[u8]) -> Result<()>;
    /// Blocks for at least `period` microseconds
    fn delay_us(&mut self, period: u32);
    /// Millisecond clock, wraps at `u32::MAX`
    fn millis(&self) -> u32;
    /// Ambient temperature (°C) used to compute the heater resistance
    fn amb_temp(&self) -> i8;
    /// Protocol wired in at initialisation, if any
    fn protocol(&self) -> Option<Protocol>;
}
