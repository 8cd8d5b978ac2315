use embedded_hal::i2c::{Error as _, I2c};

use super::RegisterBus;
use crate::errors::{BusError, Result};

/// I2C register framing.
///
/// Reads are a one-byte address write followed by a separate read
/// transaction; writes send the address byte and payload in one transfer.
pub struct I2cTransport<I> {
    device: I,
    address: u8,
}

impl<I: I2c> I2cTransport<I> {
    pub fn new(device: I, address: u8) -> Self {
        Self { device, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Consume the transport and return the underlying bus handle
    pub fn release(self) -> I {
        self.device
    }
}

impl<I: I2c> RegisterBus for I2cTransport<I> {
    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.device
            .write(self.address, &[reg])
            .map_err(|e| BusError::I2c(e.kind()))?;
        self.device
            .read(self.address, buf)
            .map_err(|e| BusError::I2c(e.kind()))?;
        Ok(())
    }

    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(reg);
        frame.extend_from_slice(data);
        self.device
            .write(self.address, &frame)
            .map_err(|e| BusError::I2c(e.kind()))?;
        Ok(())
    }
}
