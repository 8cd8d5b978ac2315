use std::io::Write as _;

use embedded_hal::delay::DelayNs;
use tracing::info;

use crate::bus::{BusProvider, BusResource, Clock, Interface, Protocol, RegisterBus};
use crate::config::BusConfig;
use crate::errors::{Error, Result};

/// Ambient temperature (°C) assumed when computing the heater setpoint
pub const AMBIENT_TEMP_DEFAULT: i8 = 25;

/// Device descriptor handed to the sensor-driver core.
///
/// Owns the bus resource (the callbacks' context), the delay and the clock.
/// Register access fails with a communication fault until
/// [`interface_init`] has wired a protocol in, and again after
/// [`interface_deinit`].
pub struct Device<P: BusProvider, D, C> {
    bus: BusResource<P>,
    intf: Option<Protocol>,
    delay: D,
    clock: C,
    amb_temp: i8,
}

impl<P: BusProvider, D: DelayNs, C: Clock> Device<P, D, C> {
    pub fn new(provider: P, config: BusConfig, delay: D, clock: C) -> Self {
        Self {
            bus: BusResource::new(provider, config),
            intf: None,
            delay,
            clock,
            amb_temp: 0,
        }
    }

    pub fn bus(&self) -> &BusResource<P> {
        &self.bus
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn set_amb_temp(&mut self, amb_temp: i8) {
        self.amb_temp = amb_temp;
    }

    /// See [`interface_init`]
    pub fn init(&mut self, intf: Protocol) -> Result<()> {
        interface_init(Some(self), intf)
    }

    /// See [`interface_deinit`]
    pub fn deinit(&mut self) {
        interface_deinit(self)
    }
}

impl<P: BusProvider, D: DelayNs, C: Clock> Interface for Device<P, D, C> {
    fn read(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.bus.read_regs(reg, buf)
    }

    fn write(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        self.bus.write_regs(reg, data)
    }

    fn delay_us(&mut self, period: u32) {
        self.delay.delay_us(period);
    }

    fn millis(&self) -> u32 {
        self.clock.millis()
    }

    fn amb_temp(&self) -> i8 {
        self.amb_temp
    }

    fn protocol(&self) -> Option<Protocol> {
        self.intf
    }
}

/// Acquire the bus for `intf` and wire the matching transport into `dev`.
///
/// Fails with [`Error::NullPtr`] before touching any hardware when `dev` is
/// absent. Bus failures are passed through as communication faults.
pub fn interface_init<P, D, C>(dev: Option<&mut Device<P, D, C>>, intf: Protocol) -> Result<()>
where
    P: BusProvider,
    D: DelayNs,
    C: Clock,
{
    let dev = dev.ok_or(Error::NullPtr("device descriptor"))?;

    dev.bus.acquire(intf)?;
    info!("[interface] {} interface selected", intf);

    dev.intf = Some(intf);
    dev.amb_temp = AMBIENT_TEMP_DEFAULT;
    Ok(())
}

/// Flush pending diagnostics and release every bus resource `dev` holds.
pub fn interface_deinit<P, D, C>(dev: &mut Device<P, D, C>)
where
    P: BusProvider,
{
    let _ = std::io::stdout().flush();

    dev.bus.release();
    dev.intf = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BusError;
    use crate::mock::{FakeClock, FakeProvider, ProviderFailure, RecordingDelay};

    type FakeDevice = Device<FakeProvider, RecordingDelay, FakeClock>;

    fn device(provider: FakeProvider) -> FakeDevice {
        Device::new(provider, BusConfig::default(), RecordingDelay::new(), FakeClock::new(0))
    }

    #[test]
    fn missing_descriptor_is_a_null_reference() {
        let err = interface_init::<FakeProvider, RecordingDelay, FakeClock>(None, Protocol::I2c)
            .unwrap_err();
        assert_eq!(err, Error::NullPtr("device descriptor"));
    }

    #[test]
    fn init_records_protocol_and_ambient_temperature() {
        let mut dev = device(FakeProvider::new());
        assert_eq!(dev.amb_temp(), 0);

        dev.init(Protocol::Spi).unwrap();

        assert_eq!(dev.protocol(), Some(Protocol::Spi));
        assert_eq!(dev.amb_temp(), AMBIENT_TEMP_DEFAULT);
        assert_eq!(dev.bus().protocol(), Some(Protocol::Spi));
    }

    #[test]
    fn bus_failure_propagates_unchanged() {
        let mut dev = device(FakeProvider::failing(ProviderFailure::SpiOpen));
        let err = dev.init(Protocol::Spi).unwrap_err();
        assert!(matches!(err, Error::ComFail(BusError::SpiOpen { bus: 0, chip_select: 0, .. })));
        assert_eq!(dev.protocol(), None);
        assert!(!dev.bus().gpio_claimed());
    }

    #[test]
    fn i2c_write_then_read_round_trips() {
        let provider = FakeProvider::new();
        let mut dev = device(provider.clone());
        dev.init(Protocol::I2c).unwrap();

        dev.write(0x5A, &[0x7D, 0x80, 0x3F]).unwrap();
        let mut buf = [0u8; 3];
        dev.read(0x5A, &mut buf).unwrap();
        assert_eq!(buf, [0x7D, 0x80, 0x3F]);
    }

    #[test]
    fn spi_write_then_read_round_trips() {
        let provider = FakeProvider::new();
        let mut dev = device(provider.clone());
        dev.init(Protocol::Spi).unwrap();

        dev.write(0x74, &[0x55]).unwrap();
        let mut buf = [0u8; 1];
        dev.read(0x74, &mut buf).unwrap();
        assert_eq!(buf, [0x55]);
        assert!(provider.i2c().frames().is_empty());
    }

    #[test]
    fn i2c_write_frame_carries_address_first() {
        let provider = FakeProvider::new();
        let mut dev = device(provider.clone());
        dev.init(Protocol::I2c).unwrap();

        for len in 1..=4usize {
            let data: Vec<u8> = (0..len as u8).collect();
            dev.write(0x71, &data).unwrap();
            let frames = provider.i2c().frames();
            let frame = frames.last().unwrap();
            assert_eq!(frame.address, 0x77);
            assert_eq!(frame.bytes.len(), len + 1);
            assert_eq!(frame.bytes[0], 0x71);
            assert_eq!(&frame.bytes[1..], &data[..]);
        }
    }

    #[test]
    fn delay_and_clock_reach_injected_sources() {
        let mut dev = Device::new(
            FakeProvider::new(),
            BusConfig::default(),
            RecordingDelay::new(),
            FakeClock::new(1234),
        );
        dev.delay_us(100_500);
        assert_eq!(dev.delay().total_us(), 100_500);
        assert_eq!(dev.millis(), 1234);
    }

    #[test]
    fn deinit_invalidates_the_descriptor() {
        let provider = FakeProvider::new();
        let mut dev = device(provider.clone());
        dev.init(Protocol::I2c).unwrap();

        dev.deinit();
        dev.deinit();

        assert_eq!(dev.protocol(), None);
        let mut buf = [0u8; 1];
        assert_eq!(
            dev.read(0xD0, &mut buf).unwrap_err(),
            Error::ComFail(BusError::NotOpen)
        );
        assert_eq!(provider.stats().gpio_releases, 1);
    }
}
