use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::{self, I2c};
use embedded_hal::spi::{self, SpiDevice};

use crate::bus::BusProvider;
use crate::bus::spi::SPI_READ_BIT;
use crate::config::{I2cConfig, SpiConfig};
use crate::errors::{BusError, BusResult};

/// Byte the fake SPI device clocks out while it receives the address
pub const SPI_TURNAROUND: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cOp {
    Write,
    Read,
}

/// One I2C transfer as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cFrame {
    pub address: u8,
    pub op: I2cOp,
    pub bytes: Vec<u8>,
}

/// One chip-select frame as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpiFrame {
    Transfer { tx: Vec<u8>, rx: Vec<u8> },
    Write { tx: Vec<u8> },
}

struct I2cState {
    regs: [u8; 256],
    pointer: u8,
    frames: Vec<I2cFrame>,
    fail_next: Option<i2c::ErrorKind>,
}

/// I2C register file with an auto-incrementing register pointer.
///
/// Clones share state, so a test can keep one clone for inspection while
/// the transport owns another.
#[derive(Clone)]
pub struct FakeI2c {
    state: Rc<RefCell<I2cState>>,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(I2cState {
                regs: [0; 256],
                pointer: 0,
                frames: Vec::new(),
                fail_next: None,
            })),
        }
    }

    pub fn load(&self, reg: u8, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        for (i, &byte) in data.iter().enumerate() {
            state.regs[reg.wrapping_add(i as u8) as usize] = byte;
        }
    }

    pub fn peek(&self, reg: u8, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        (0..len)
            .map(|i| state.regs[reg.wrapping_add(i as u8) as usize])
            .collect()
    }

    pub fn frames(&self) -> Vec<I2cFrame> {
        self.state.borrow().frames.clone()
    }

    /// Make the next transaction fail with `kind`
    pub fn fail_next(&self, kind: i2c::ErrorKind) {
        self.state.borrow_mut().fail_next = Some(kind);
    }
}

impl Default for FakeI2c {
    fn default() -> Self {
        Self::new()
    }
}

impl i2c::ErrorType for FakeI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if let Some(kind) = state.fail_next.take() {
            return Err(kind);
        }

        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => {
                    let bytes: &[u8] = bytes;
                    if let Some((&reg, data)) = bytes.split_first() {
                        state.pointer = reg;
                        for (i, &byte) in data.iter().enumerate() {
                            state.regs[reg.wrapping_add(i as u8) as usize] = byte;
                        }
                    }
                    state.frames.push(I2cFrame {
                        address,
                        op: I2cOp::Write,
                        bytes: bytes.to_vec(),
                    });
                }
                i2c::Operation::Read(buf) => {
                    let buf: &mut [u8] = buf;
                    let pointer = state.pointer;
                    for (i, byte) in buf.iter_mut().enumerate() {
                        *byte = state.regs[pointer.wrapping_add(i as u8) as usize];
                    }
                    state.frames.push(I2cFrame {
                        address,
                        op: I2cOp::Read,
                        bytes: buf.to_vec(),
                    });
                }
            }
        }
        Ok(())
    }
}

struct SpiState {
    regs: [u8; 128],
    frames: Vec<SpiFrame>,
    fail_next: Option<spi::ErrorKind>,
}

impl SpiState {
    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) {
        let Some((&header, payload)) = tx.split_first() else {
            return;
        };
        let reg = (header & !SPI_READ_BIT) as usize;

        if header & SPI_READ_BIT != 0 {
            if let Some((first, rest)) = rx.split_first_mut() {
                *first = SPI_TURNAROUND;
                for (i, byte) in rest.iter_mut().enumerate() {
                    *byte = self.regs[(reg + i) & 0x7F];
                }
            }
        } else {
            for (i, &byte) in payload.iter().enumerate() {
                self.regs[(reg + i) & 0x7F] = byte;
            }
        }
    }
}

/// SPI register file addressed by the low seven bits of the first byte.
#[derive(Clone)]
pub struct FakeSpi {
    state: Rc<RefCell<SpiState>>,
}

impl FakeSpi {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SpiState {
                regs: [0; 128],
                frames: Vec::new(),
                fail_next: None,
            })),
        }
    }

    pub fn load(&self, reg: u8, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let reg = (reg & !SPI_READ_BIT) as usize;
        for (i, &byte) in data.iter().enumerate() {
            state.regs[(reg + i) & 0x7F] = byte;
        }
    }

    pub fn peek(&self, reg: u8, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        let reg = (reg & !SPI_READ_BIT) as usize;
        (0..len).map(|i| state.regs[(reg + i) & 0x7F]).collect()
    }

    pub fn frames(&self) -> Vec<SpiFrame> {
        self.state.borrow().frames.clone()
    }

    /// Make the next transaction fail with `kind`
    pub fn fail_next(&self, kind: spi::ErrorKind) {
        self.state.borrow_mut().fail_next = Some(kind);
    }
}

impl Default for FakeSpi {
    fn default() -> Self {
        Self::new()
    }
}

impl spi::ErrorType for FakeSpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if let Some(kind) = state.fail_next.take() {
            return Err(kind);
        }

        for op in operations.iter_mut() {
            match op {
                spi::Operation::Transfer(rx, tx) => {
                    let rx: &mut [u8] = rx;
                    let tx: &[u8] = tx;
                    state.exchange(tx, rx);
                    state.frames.push(SpiFrame::Transfer {
                        tx: tx.to_vec(),
                        rx: rx.to_vec(),
                    });
                }
                spi::Operation::Write(tx) => {
                    let tx: &[u8] = tx;
                    state.exchange(tx, &mut []);
                    state.frames.push(SpiFrame::Write { tx: tx.to_vec() });
                }
                _ => return Err(spi::ErrorKind::Other),
            }
        }
        Ok(())
    }
}

/// Which provider step should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailure {
    Gpio,
    I2cOpen,
    SpiOpen,
}

/// Lifecycle counters recorded by [`FakeProvider`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderStats {
    pub gpio_claims: u32,
    pub gpio_releases: u32,
    pub i2c_opens: u32,
    pub i2c_closes: u32,
    pub spi_opens: u32,
    pub spi_closes: u32,
}

/// Marker handed out for a successful fake GPIO claim
pub struct FakeGpioClaim;

struct ProviderState {
    failure: Option<ProviderFailure>,
    stats: ProviderStats,
}

/// Bus provider handing out shared [`FakeI2c`] / [`FakeSpi`] devices.
#[derive(Clone)]
pub struct FakeProvider {
    i2c: FakeI2c,
    spi: FakeSpi,
    state: Rc<RefCell<ProviderState>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            i2c: FakeI2c::new(),
            spi: FakeSpi::new(),
            state: Rc::new(RefCell::new(ProviderState {
                failure: None,
                stats: ProviderStats::default(),
            })),
        }
    }

    pub fn failing(failure: ProviderFailure) -> Self {
        let provider = Self::new();
        provider.state.borrow_mut().failure = Some(failure);
        provider
    }

    pub fn i2c(&self) -> FakeI2c {
        self.i2c.clone()
    }

    pub fn spi(&self) -> FakeSpi {
        self.spi.clone()
    }

    /// Preload `data` at `reg` on both fake buses
    pub fn load(&self, reg: u8, data: &[u8]) {
        self.i2c.load(reg, data);
        self.spi.load(reg, data);
    }

    pub fn stats(&self) -> ProviderStats {
        self.state.borrow().stats
    }

    fn fails(&self, step: ProviderFailure) -> bool {
        self.state.borrow().failure == Some(step)
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BusProvider for FakeProvider {
    type Gpio = FakeGpioClaim;
    type I2c = FakeI2c;
    type Spi = FakeSpi;

    fn claim_gpio(&mut self) -> BusResult<FakeGpioClaim> {
        if self.fails(ProviderFailure::Gpio) {
            return Err(BusError::GpioClaim {
                path: "fake".to_string(),
                reason: "held by another process".to_string(),
            });
        }
        self.state.borrow_mut().stats.gpio_claims += 1;
        Ok(FakeGpioClaim)
    }

    fn open_i2c(&mut self, config: &I2cConfig) -> BusResult<FakeI2c> {
        if self.fails(ProviderFailure::I2cOpen) {
            return Err(BusError::I2cOpen {
                bus: config.bus,
                address: config.address,
                reason: "no such device".to_string(),
            });
        }
        self.state.borrow_mut().stats.i2c_opens += 1;
        Ok(self.i2c.clone())
    }

    fn open_spi(&mut self, config: &SpiConfig) -> BusResult<FakeSpi> {
        if self.fails(ProviderFailure::SpiOpen) {
            return Err(BusError::SpiOpen {
                bus: config.bus,
                chip_select: config.chip_select,
                reason: "no such device".to_string(),
            });
        }
        self.state.borrow_mut().stats.spi_opens += 1;
        Ok(self.spi.clone())
    }

    fn close_i2c(&mut self, _handle: FakeI2c) {
        self.state.borrow_mut().stats.i2c_closes += 1;
    }

    fn close_spi(&mut self, _handle: FakeSpi) {
        self.state.borrow_mut().stats.spi_closes += 1;
    }

    fn release_gpio(&mut self, _claim: FakeGpioClaim) {
        self.state.borrow_mut().stats.gpio_releases += 1;
    }
}
