//! Fake platform for exercising the HAL without hardware.
//!
//! Available during test builds and when the `mock` feature is enabled.
//! The fake buses are register files that honour the same framing as the
//! BME69x, so whatever the transport writes can be read back.

#![cfg(any(test, feature = "mock"))]

mod bus;
mod sensor;
mod timing;

pub use bus::{
    FakeGpioClaim, FakeI2c, FakeProvider, FakeSpi, I2cFrame, I2cOp, ProviderFailure, ProviderStats,
    SpiFrame,
};
pub use sensor::FakeSensor;
pub use timing::{FakeClock, RecordingDelay};
