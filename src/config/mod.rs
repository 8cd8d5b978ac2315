pub mod bus_config;

pub use bus_config::{load_bus_config, BusConfig, I2cConfig, SpiConfig};
