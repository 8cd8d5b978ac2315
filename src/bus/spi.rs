use embedded_hal::spi::{Error as _, SpiDevice};

use super::RegisterBus;
use crate::errors::{BusError, Result};

/// Register address bit 7 marks a read on the SPI bus.
pub const SPI_READ_BIT: u8 = 0x80;

/// SPI register framing.
///
/// Every access is a single chip-select frame of `len + 1` bytes whose first
/// byte is the register address with bit 7 set for reads and cleared for
/// writes. The byte clocked in alongside the address is discarded.
pub struct SpiTransport<S> {
    device: S,
}

impl<S: SpiDevice> SpiTransport<S> {
    pub fn new(device: S) -> Self {
        Self { device }
    }

    /// Consume the transport and return the underlying bus handle
    pub fn release(self) -> S {
        self.device
    }
}

impl<S: SpiDevice> RegisterBus for SpiTransport<S> {
    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        let mut tx = vec![0u8; buf.len() + 1];
        tx[0] = reg | SPI_READ_BIT;
        let mut rx = vec![0u8; buf.len() + 1];

        self.device
            .transfer(&mut rx, &tx)
            .map_err(|e| BusError::Spi(e.kind()))?;

        buf.copy_from_slice(&rx[1..]);
        Ok(())
    }

    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        let mut tx = Vec::with_capacity(data.len() + 1);
        tx.push(reg & !SPI_READ_BIT);
        tx.extend_from_slice(data);

        self.device
            .write(&tx)
            .map_err(|e| BusError::Spi(e.kind()))?;
        Ok(())
    }
}
