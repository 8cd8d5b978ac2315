/// Hardware Abstraction Layer (HAL) for platform-specific bus access
///
/// The transport binding is written against the embedded-hal 1.0 traits, so
/// any platform that can hand out an `I2c` bus and an `SpiDevice` can host
/// it. This module supplies the Linux implementation used on Raspberry Pi
/// class boards.

#[cfg(feature = "linux-hal")]
pub mod linux {
    use std::fs::{File, OpenOptions};
    use std::path::PathBuf;

    use i2cdev::linux::LinuxI2CError;
    use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
    use nix::fcntl::{Flock, FlockArg};
    use tracing::debug;

    // Re-export linux-embedded-hal types directly
    pub use linux_embedded_hal::{Delay, I2cdev, SpidevDevice};

    use crate::bus::{BusProvider, SystemClock};
    use crate::config::{BusConfig, I2cConfig, SpiConfig};
    use crate::device::Device;
    use crate::errors::{BusError, BusResult};

    /// Exclusive hold on the GPIO subsystem, released when dropped.
    pub struct GpioClaim {
        _lock: Flock<File>,
        path: PathBuf,
    }

    impl GpioClaim {
        pub fn path(&self) -> &PathBuf {
            &self.path
        }
    }

    /// Opens `/dev/i2c-*` and `/dev/spidev*.*` character devices.
    ///
    /// The GPIO claim is an exclusive, non-blocking `flock` on the configured
    /// lock file: a second process running the same HAL fails to acquire
    /// instead of interleaving transfers with the first.
    pub struct LinuxBusProvider {
        lock_path: PathBuf,
    }

    impl LinuxBusProvider {
        pub fn new(config: &BusConfig) -> Self {
            Self {
                lock_path: config.gpio_lock.clone(),
            }
        }

        fn claim_error(&self, reason: String) -> BusError {
            BusError::GpioClaim {
                path: self.lock_path.display().to_string(),
                reason,
            }
        }
    }

    impl BusProvider for LinuxBusProvider {
        type Gpio = GpioClaim;
        type I2c = I2cdev;
        type Spi = SpidevDevice;

        fn claim_gpio(&mut self) -> BusResult<GpioClaim> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&self.lock_path)
                .map_err(|e| self.claim_error(e.to_string()))?;

            let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
                self.claim_error(format!("held by another process ({})", errno))
            })?;

            debug!("[hal] GPIO lock {} taken", self.lock_path.display());
            Ok(GpioClaim {
                _lock: lock,
                path: self.lock_path.clone(),
            })
        }

        fn open_i2c(&mut self, config: &I2cConfig) -> BusResult<I2cdev> {
            I2cdev::new(config.device_path()).map_err(|e: LinuxI2CError| BusError::I2cOpen {
                bus: config.bus,
                address: config.address,
                reason: e.to_string(),
            })
        }

        fn open_spi(&mut self, config: &SpiConfig) -> BusResult<SpidevDevice> {
            let open_error = |reason: String| BusError::SpiOpen {
                bus: config.bus,
                chip_select: config.chip_select,
                reason,
            };

            let mut spi =
                SpidevDevice::open(config.device_path()).map_err(|e| open_error(e.to_string()))?;

            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(config.speed_hz)
                .mode(SpiModeFlags::SPI_MODE_0)
                .build();
            spi.configure(&options)
                .map_err(|e| open_error(e.to_string()))?;

            Ok(spi)
        }
    }

    /// Device descriptor wired to the Linux provider, sleep-based delay and system clock.
    pub fn linux_device(config: BusConfig) -> Device<LinuxBusProvider, Delay, SystemClock> {
        let provider = LinuxBusProvider::new(&config);
        Device::new(provider, config, Delay, SystemClock::new())
    }

}

#[cfg(feature = "linux-hal")]
pub use linux::*;
