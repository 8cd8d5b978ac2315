use embedded_hal::delay::DelayNs;
use tracing::{error, info, warn};

use crate::bus::{BusProvider, Clock, Protocol};
use crate::device::{interface_deinit, interface_init, Device};
use crate::errors::Result;
use crate::selftest::{run_self_test, SelfTestReport};
use crate::sensor::SensorApi;

/// Log the outcome of one API call under its category.
pub fn check_rslt<T>(api_name: &str, result: &Result<T>) {
    match result {
        Ok(_) => {}
        Err(e) if e.is_warning() => {
            warn!("[{}] Warning: {} ({})", api_name, e.category(), e)
        }
        Err(e) => error!("[{}] Error: {} ({})", api_name, e.category(), e),
    }
}

/// Process exit status for a self-test result: 0 for any pass, 1 otherwise.
pub fn exit_code(result: &Result<SelfTestReport>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Bring the interface up, initialise the sensor core, run the self-test
/// and release the bus again, whichever step fails.
pub fn run_session<P, D, C, S>(
    dev: &mut Device<P, D, C>,
    intf: Protocol,
    sensor: &mut S,
) -> Result<SelfTestReport>
where
    P: BusProvider,
    D: DelayNs,
    C: Clock,
    S: SensorApi,
{
    let result = bring_up_and_test(dev, intf, sensor);

    match &result {
        Ok(report) => {
            for warning in &report.warnings {
                warn!("[session] {}", warning);
            }
            info!("[session] Overall self-test SUCCESSFUL, sensor ready (T/P/H confirmed working)");
        }
        Err(e) => error!("[session] Self-test FAILED: {}", e),
    }

    interface_deinit(dev);
    result
}

fn bring_up_and_test<P, D, C, S>(
    dev: &mut Device<P, D, C>,
    intf: Protocol,
    sensor: &mut S,
) -> Result<SelfTestReport>
where
    P: BusProvider,
    D: DelayNs,
    C: Clock,
    S: SensorApi,
{
    let rslt = interface_init(Some(&mut *dev), intf);
    check_rslt("interface_init", &rslt);
    rslt?;

    let rslt = sensor.init(dev);
    check_rslt("sensor_init", &rslt);
    rslt?;

    run_self_test(sensor, dev)
}
