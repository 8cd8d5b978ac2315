use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::errors::{ConfigError, ConfigResult};
use crate::sensor::I2C_ADDR_HIGH;

/// Default I2C bus for Raspberry Pi
pub const DEFAULT_I2C_BUS: u8 = 1;
/// Default SPI bus for Raspberry Pi
pub const DEFAULT_SPI_BUS: u8 = 0;
/// Default SPI speed (1 MHz)
pub const DEFAULT_SPI_SPEED_HZ: u32 = 1_000_000;
/// Lock file standing in for the exclusive GPIO subsystem claim
pub const DEFAULT_GPIO_LOCK: &str = "/var/lock/bme69x-gpio.lock";

/// Root structure for the optional `bus.toml` override file.
///
/// Every field falls back to the board defaults, so an empty file (or no
/// file at all, via [`BusConfig::default`]) yields the stock wiring.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub i2c: I2cConfig,
    pub spi: SpiConfig,
    /// Path of the lock file taken while the GPIO subsystem is claimed
    pub gpio_lock: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct I2cConfig {
    pub bus: u8,
    /// 7-bit device address
    pub address: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    pub bus: u8,
    pub chip_select: u8,
    pub speed_hz: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            i2c: I2cConfig::default(),
            spi: SpiConfig::default(),
            gpio_lock: PathBuf::from(DEFAULT_GPIO_LOCK),
        }
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            bus: DEFAULT_I2C_BUS,
            address: I2C_ADDR_HIGH,
        }
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            bus: DEFAULT_SPI_BUS,
            chip_select: 0,
            speed_hz: DEFAULT_SPI_SPEED_HZ,
        }
    }
}

impl I2cConfig {
    pub fn device_path(&self) -> String {
        format!("/dev/i2c-{}", self.bus)
    }
}

impl SpiConfig {
    pub fn device_path(&self) -> String {
        format!("/dev/spidev{}.{}", self.bus, self.chip_select)
    }
}

/// Parse a bus config from TOML text
pub fn parse_bus_config(content: &str) -> ConfigResult<BusConfig> {
    Ok(toml::from_str(content)?)
}

/// Load bus config file
pub fn load_bus_config(path: &str) -> ConfigResult<BusConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    parse_bus_config(&content)
}
