use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;
use tracing::{debug, error, info};

use super::{I2cTransport, Protocol, RegisterBus, SpiTransport};
use crate::config::{BusConfig, I2cConfig, SpiConfig};
use crate::errors::{BusError, BusResult, Result};

/// Platform hook that claims the GPIO subsystem and opens bus handles.
///
/// Closing is expressed by handing a value back; the default implementations
/// just drop it, which closes file-descriptor backed handles.
pub trait BusProvider {
    /// Proof that the GPIO subsystem is claimed; dropping it releases the claim
    type Gpio;
    type I2c: I2c;
    type Spi: SpiDevice;

    fn claim_gpio(&mut self) -> BusResult<Self::Gpio>;
    fn open_i2c(&mut self, config: &I2cConfig) -> BusResult<Self::I2c>;
    fn open_spi(&mut self, config: &SpiConfig) -> BusResult<Self::Spi>;

    fn close_i2c(&mut self, handle: Self::I2c) {
        drop(handle);
    }

    fn close_spi(&mut self, handle: Self::Spi) {
        drop(handle);
    }

    fn release_gpio(&mut self, claim: Self::Gpio) {
        drop(claim);
    }
}

/// Open-handle state. At most one protocol is live at a time.
pub enum Session<I, S> {
    Closed,
    I2c(I2cTransport<I>),
    Spi(SpiTransport<S>),
}

impl<I, S> Session<I, S> {
    pub fn protocol(&self) -> Option<Protocol> {
        match self {
            Session::Closed => None,
            Session::I2c(_) => Some(Protocol::I2c),
            Session::Spi(_) => Some(Protocol::Spi),
        }
    }
}

/// Owner of the single bus session: GPIO claim plus one I2C or SPI handle.
///
/// Dropping the resource releases everything it holds, so the hardware
/// claim cannot outlive an early return.
pub struct BusResource<P: BusProvider> {
    provider: P,
    config: BusConfig,
    gpio: Option<P::Gpio>,
    session: Session<P::I2c, P::Spi>,
}

impl<P: BusProvider> BusResource<P> {
    pub fn new(provider: P, config: BusConfig) -> Self {
        Self {
            provider,
            config,
            gpio: None,
            session: Session::Closed,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.session.protocol()
    }

    pub fn is_open(&self) -> bool {
        self.session.protocol().is_some()
    }

    pub fn gpio_claimed(&self) -> bool {
        self.gpio.is_some()
    }

    /// Claim the GPIO subsystem (once) and open one handle for `protocol`.
    ///
    /// If the handle cannot be opened the GPIO claim is dropped again before
    /// the error is returned.
    pub fn acquire(&mut self, protocol: Protocol) -> BusResult<()> {
        if let Some(open) = self.session.protocol() {
            return Err(BusError::AlreadyOpen { protocol: open });
        }

        if self.gpio.is_none() {
            let claim = self.provider.claim_gpio().map_err(|e| {
                error!("[bus] Failed to claim GPIO subsystem: {}", e);
                e
            })?;
            info!("[bus] GPIO subsystem claimed");
            self.gpio = Some(claim);
        }

        let opened = match protocol {
            Protocol::I2c => self.provider.open_i2c(&self.config.i2c).map(|handle| {
                info!(
                    "[bus] I2C connection opened (bus {}, device {:#04x})",
                    self.config.i2c.bus, self.config.i2c.address
                );
                Session::I2c(I2cTransport::new(handle, self.config.i2c.address))
            }),
            Protocol::Spi => self.provider.open_spi(&self.config.spi).map(|handle| {
                info!(
                    "[bus] SPI connection opened (bus {}.{}, {} Hz)",
                    self.config.spi.bus, self.config.spi.chip_select, self.config.spi.speed_hz
                );
                Session::Spi(SpiTransport::new(handle))
            }),
        };

        match opened {
            Ok(session) => {
                self.session = session;
                Ok(())
            }
            Err(e) => {
                error!("[bus] {}", e);
                self.release_gpio();
                Err(e)
            }
        }
    }

    /// Close whichever handle is open and release the GPIO claim.
    ///
    /// Each step is a no-op when there is nothing to close, so this may be
    /// called any number of times.
    pub fn release(&mut self) {
        match std::mem::replace(&mut self.session, Session::Closed) {
            Session::I2c(transport) => {
                self.provider.close_i2c(transport.release());
                debug!("[bus] I2C handle closed");
            }
            Session::Spi(transport) => {
                self.provider.close_spi(transport.release());
                debug!("[bus] SPI handle closed");
            }
            Session::Closed => {}
        }
        self.release_gpio();
    }

    fn release_gpio(&mut self) {
        if let Some(claim) = self.gpio.take() {
            self.provider.release_gpio(claim);
            debug!("[bus] GPIO subsystem released");
        }
    }
}

impl<P: BusProvider> RegisterBus for BusResource<P> {
    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        match &mut self.session {
            Session::I2c(transport) => transport.read_regs(reg, buf),
            Session::Spi(transport) => transport.read_regs(reg, buf),
            Session::Closed => Err(BusError::NotOpen.into()),
        }
    }

    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        match &mut self.session {
            Session::I2c(transport) => transport.write_regs(reg, data),
            Session::Spi(transport) => transport.write_regs(reg, data),
            Session::Closed => Err(BusError::NotOpen.into()),
        }
    }
}

impl<P: BusProvider> Drop for BusResource<P> {
    fn drop(&mut self) {
        self.release();
    }
}
