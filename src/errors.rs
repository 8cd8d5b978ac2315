use thiserror::Error;

use crate::bus::Protocol;

/// Bus-level failures. Every variant surfaces to the driver as a communication fault.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    #[error("GPIO subsystem claim on '{path}' failed: {reason}")]
    GpioClaim { path: String, reason: String },

    #[error("failed to open I2C bus {bus}, device {address:#04x}: {reason}")]
    I2cOpen { bus: u8, address: u8, reason: String },

    #[error("failed to open SPI bus {bus}.{chip_select}: {reason}")]
    SpiOpen { bus: u8, chip_select: u8, reason: String },

    #[error("no bus handle is open")]
    NotOpen,

    #[error("a {protocol} session is already open")]
    AlreadyOpen { protocol: Protocol },

    #[error("I2C transfer failed: {0:?}")]
    I2c(embedded_hal::i2c::ErrorKind),

    #[error("SPI transfer failed: {0:?}")]
    Spi(embedded_hal::spi::ErrorKind),
}

/// Errors shared by the transport binding, the external sensor-driver core and the self-test.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("null reference: {0}")]
    NullPtr(&'static str),

    #[error("communication failure: {0}")]
    ComFail(#[from] BusError),

    #[error("incorrect length parameter")]
    InvalidLength,

    #[error("device not found: expected chip ID {expected:#04x}, got {actual:#04x}")]
    DevNotFound { expected: u8, actual: u8 },

    #[error("self-test failed: {quantity} {value:.2} {unit} outside [{min}, {max}]")]
    SelfTest {
        quantity: &'static str,
        value: f32,
        unit: &'static str,
        min: f32,
        max: f32,
    },

    #[error("no new measurement data")]
    NoNewData,

    #[error("sensor driver '{api}' failed: {reason}")]
    Driver { api: &'static str, reason: String },
}

impl Error {
    /// Human-readable category used when reporting a result.
    pub fn category(&self) -> &'static str {
        match self {
            Error::NullPtr(_) => "Null pointer",
            Error::ComFail(_) => "Communication failure",
            Error::InvalidLength => "Incorrect length parameter",
            Error::DevNotFound { .. } => "Device not found",
            Error::SelfTest { .. } => "Self test error",
            Error::NoNewData => "No new data found",
            Error::Driver { .. } => "Sensor driver error",
        }
    }

    /// Warning-class results never abort a caller that chooses to continue.
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::NoNewData)
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format: {0}")]
    FormatError(#[from] toml::de::Error),
}

/// Result type aliases for convenience
pub type Result<T> = std::result::Result<T, Error>;
pub type BusResult<T> = std::result::Result<T, BusError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
