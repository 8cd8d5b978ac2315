// Public modules
pub mod bus;
pub mod config;
pub mod device;
pub mod errors;
pub mod hal;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod selftest;
pub mod sensor;
pub mod session;

// Re-export commonly used types
pub use bus::{Interface, Protocol};
pub use config::{load_bus_config, BusConfig};
pub use device::{interface_deinit, interface_init, Device};
pub use errors::{BusError, Error, Result};
pub use selftest::{run_self_test, SelfTestReport, SelfTestWarning, Verdict};
pub use sensor::SensorApi;
pub use session::{check_rslt, exit_code, run_session};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with default configuration
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}
