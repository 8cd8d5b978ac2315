//! End-to-end self-test: configure, arm the heater, take one forced
//! measurement and check the result against plausible bounds.
//!
//! Hard failures end the run with an [`Error`]. Gas-sensor problems are
//! collected as [`SelfTestWarning`]s and only downgrade the verdict.

use std::fmt;
use std::ops::RangeInclusive;

use tracing::{error, info, warn};

use crate::bus::Interface;
use crate::errors::{Error, Result};
use crate::sensor::{
    Conf, FieldData, Filter, HeaterConf, Odr, OpMode, Oversampling, SensorApi, Status, CHIP_ID,
};

/// Heater target for the self-test measurement (°C)
pub const HEATER_TEMP_C: u16 = 300;
/// Heater hold time for the self-test measurement (ms)
pub const HEATER_DUR_MS: u16 = 100;

pub const TEMPERATURE_RANGE_C: RangeInclusive<f32> = 0.0..=60.0;
pub const PRESSURE_RANGE_HPA: RangeInclusive<f32> = 300.0..=1200.0;
pub const HUMIDITY_RANGE_PCT: RangeInclusive<f32> = 0.0..=100.0;

/// IDAC readback meaning the heater current never settled
const IDAC_SATURATED: u8 = 0xFF;

/// Non-terminal findings recorded during a run
#[derive(Debug, Clone, PartialEq)]
pub enum SelfTestWarning {
    /// Heater setup was rejected; T/P/H may still be fine
    HeaterConfig(Error),
    /// Heater did not reach a stable temperature
    HeaterUnstable { idac: u8 },
    /// Field carried no valid gas measurement
    GasMeasurementInvalid { status: Status },
}

impl fmt::Display for SelfTestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfTestWarning::HeaterConfig(e) => write!(f, "heater configuration failed: {}", e),
            SelfTestWarning::HeaterUnstable { idac } => {
                write!(f, "heater not stable (IDAC: {:#04x}), gas readings may be inaccurate", idac)
            }
            SelfTestWarning::GasMeasurementInvalid { status } => {
                write!(f, "gas measurement not valid (status: {:#04x})", status.bits())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    PassWithWarnings,
}

/// Outcome of a run that cleared every terminal check
#[derive(Debug, Clone, PartialEq)]
pub struct SelfTestReport {
    pub data: FieldData,
    /// Wait inserted between triggering and fetching the measurement (µs)
    pub settle_us: u32,
    pub warnings: Vec<SelfTestWarning>,
}

impl SelfTestReport {
    pub fn verdict(&self) -> Verdict {
        if self.warnings.is_empty() {
            Verdict::Pass
        } else {
            Verdict::PassWithWarnings
        }
    }

    pub fn is_clean(&self) -> bool {
        self.verdict() == Verdict::Pass
    }

    /// Pressure converted from Pa to hPa
    pub fn pressure_hpa(&self) -> f32 {
        self.data.pressure / 100.0
    }
}

/// Register settings the self-test measures with
pub fn self_test_conf(current: Conf) -> Conf {
    Conf {
        filter: Filter::Off,
        odr: Odr::None,
        os_hum: Oversampling::X16,
        os_pres: Oversampling::X1,
        os_temp: Oversampling::X2,
        ..current
    }
}

/// Run the self-test against an initialised sensor.
pub fn run_self_test<S, I>(sensor: &mut S, dev: &mut I) -> Result<SelfTestReport>
where
    S: SensorApi,
    I: Interface,
{
    info!("[selftest] === BME69x self-test ===");
    let mut warnings = Vec::new();

    info!("[selftest] Step 1: checking sensor identity");
    check_chip_id(sensor.chip_id())?;

    info!("[selftest] Step 2: configuring sensor for measurement");
    let conf = configure(sensor, dev)?;

    info!("[selftest] Step 3: arming heater");
    let heatr_conf = HeaterConf {
        enable: true,
        heatr_temp: HEATER_TEMP_C,
        heatr_dur: HEATER_DUR_MS,
    };
    match sensor.set_heatr_conf(OpMode::Forced, &heatr_conf, dev) {
        Ok(()) => info!("[selftest] Heater configuration successful"),
        Err(e) => {
            warn!("[selftest] Heater configuration failed ({}), other sensors may still work", e);
            warnings.push(SelfTestWarning::HeaterConfig(e));
        }
    }

    info!("[selftest] Step 4: performing forced measurement");
    let (data, settle_us) = measure(sensor, &conf, &heatr_conf, dev)?;

    info!("[selftest] Step 5: validating measurement ranges");
    validate_ranges(&data)?;

    info!("[selftest] Step 6: checking gas sensor status");
    check_gas_status(&data, &mut warnings);

    summarize(&data, &mut warnings);

    let report = SelfTestReport {
        data,
        settle_us,
        warnings,
    };
    match report.verdict() {
        Verdict::Pass => info!("[selftest] Self-test PASSED"),
        Verdict::PassWithWarnings => info!(
            "[selftest] Self-test PASSED with {} warning(s)",
            report.warnings.len()
        ),
    }
    Ok(report)
}

fn check_chip_id(actual: u8) -> Result<()> {
    if actual != CHIP_ID {
        error!(
            "[selftest] Chip ID mismatch: expected {:#04x}, got {:#04x}",
            CHIP_ID, actual
        );
        return Err(Error::DevNotFound {
            expected: CHIP_ID,
            actual,
        });
    }
    info!("[selftest] Chip ID correct: {:#04x}", actual);
    Ok(())
}

fn configure<S: SensorApi, I: Interface>(sensor: &mut S, dev: &mut I) -> Result<Conf> {
    let current = sensor.get_conf(dev).map_err(|e| {
        error!("[selftest] Failed to get configuration: {}", e);
        e
    })?;

    let conf = self_test_conf(current);
    sensor.set_conf(&conf, dev).map_err(|e| {
        error!("[selftest] Failed to set configuration: {}", e);
        e
    })?;

    info!("[selftest] Sensor configuration successful");
    Ok(conf)
}

fn measure<S: SensorApi, I: Interface>(
    sensor: &mut S,
    conf: &Conf,
    heatr_conf: &HeaterConf,
    dev: &mut I,
) -> Result<(FieldData, u32)> {
    sensor.set_op_mode(OpMode::Forced, dev).map_err(|e| {
        error!("[selftest] Failed to set forced mode: {}", e);
        e
    })?;

    let settle_us = sensor
        .get_meas_dur(OpMode::Forced, conf, dev)
        .saturating_add(heatr_conf.heatr_dur as u32 * 1000);
    dev.delay_us(settle_us);

    match sensor.get_data(OpMode::Forced, dev) {
        Ok(Some(data)) => {
            info!("[selftest] Measurement data retrieved");
            Ok((data, settle_us))
        }
        Ok(None) => {
            error!("[selftest] Measurement returned no valid fields");
            Err(Error::NoNewData)
        }
        Err(e) => {
            error!("[selftest] Failed to get measurement data: {}", e);
            Err(e)
        }
    }
}

fn check_range(
    quantity: &'static str,
    value: f32,
    unit: &'static str,
    range: RangeInclusive<f32>,
) -> Result<()> {
    // NaN fails `contains`, which is what we want for a broken conversion.
    if !range.contains(&value) {
        error!("[selftest] {} out of valid range: {:.2} {}", quantity, value, unit);
        return Err(Error::SelfTest {
            quantity,
            value,
            unit,
            min: *range.start(),
            max: *range.end(),
        });
    }
    info!("[selftest] {} in valid range: {:.2} {}", quantity, value, unit);
    Ok(())
}

fn validate_ranges(data: &FieldData) -> Result<()> {
    check_range("temperature", data.temperature, "°C", TEMPERATURE_RANGE_C)?;
    check_range("pressure", data.pressure / 100.0, "hPa", PRESSURE_RANGE_HPA)?;
    check_range("humidity", data.humidity, "%", HUMIDITY_RANGE_PCT)?;
    Ok(())
}

fn check_gas_status(data: &FieldData, warnings: &mut Vec<SelfTestWarning>) {
    if !data.status.contains(Status::NEW_DATA | Status::GASM_VALID) {
        warn!("[selftest] Gas measurement issues detected; T/P/H sensors are working");
        warnings.push(SelfTestWarning::GasMeasurementInvalid {
            status: data.status,
        });
        return;
    }

    if data.status.contains(Status::HEAT_STAB) {
        info!(
            "[selftest] Gas sensor working correctly (resistance: {:.0} ohm)",
            data.gas_resistance
        );
    } else {
        warn!(
            "[selftest] Heater not stable (IDAC: {:#04x}), gas readings may be inaccurate",
            data.idac
        );
        warnings.push(SelfTestWarning::HeaterUnstable { idac: data.idac });
    }
}

fn summarize(data: &FieldData, warnings: &mut Vec<SelfTestWarning>) {
    info!("[selftest] === Self-test summary ===");
    info!("[selftest] Basic sensors (T/P/H) are functional");

    let unstable = !data.status.contains(Status::HEAT_STAB) || data.idac == IDAC_SATURATED;
    if !unstable {
        info!("[selftest] All sensors including gas sensor working correctly");
        return;
    }

    let already_reported = warnings
        .iter()
        .any(|w| matches!(w, SelfTestWarning::HeaterUnstable { .. }));
    if !already_reported {
        warn!(
            "[selftest] Heater not stable (IDAC: {:#04x}), gas readings may be inaccurate",
            data.idac
        );
        warnings.push(SelfTestWarning::HeaterUnstable { idac: data.idac });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Protocol;
    use crate::config::BusConfig;
    use crate::device::Device;
    use crate::errors::BusError;
    use crate::mock::{FakeClock, FakeProvider, FakeSensor, RecordingDelay};

    type FakeDevice = Device<FakeProvider, RecordingDelay, FakeClock>;

    fn healthy_sample() -> FieldData {
        FieldData {
            status: Status::NEW_DATA | Status::GASM_VALID | Status::HEAT_STAB,
            idac: 0x2A,
            temperature: 25.0,
            pressure: 101_325.0,
            humidity: 45.0,
            gas_resistance: 52_000.0,
            ..FieldData::default()
        }
    }

    fn ready_device(protocol: Protocol) -> (FakeDevice, FakeProvider) {
        let provider = FakeProvider::new();
        provider.load(0xD0, &[CHIP_ID]);
        let mut dev = Device::new(
            provider.clone(),
            BusConfig::default(),
            RecordingDelay::new(),
            FakeClock::new(0),
        );
        dev.init(protocol).unwrap();
        (dev, provider)
    }

    fn run(sensor: &mut FakeSensor, protocol: Protocol) -> (Result<SelfTestReport>, FakeDevice) {
        let (mut dev, _) = ready_device(protocol);
        sensor.init(&mut dev).unwrap();
        let result = run_self_test(sensor, &mut dev);
        (result, dev)
    }

    #[test]
    fn healthy_sensor_passes_cleanly() {
        for protocol in [Protocol::I2c, Protocol::Spi] {
            let mut sensor = FakeSensor::new(healthy_sample());
            let (result, _) = run(&mut sensor, protocol);
            let report = result.unwrap();
            assert_eq!(report.verdict(), Verdict::Pass);
            assert!(report.warnings.is_empty());
            assert!((report.pressure_hpa() - 1013.25).abs() < 0.01);
        }
    }

    #[test]
    fn steps_run_in_order() {
        let mut sensor = FakeSensor::new(healthy_sample());
        let (result, _) = run(&mut sensor, Protocol::I2c);
        result.unwrap();
        assert_eq!(
            sensor.calls(),
            &[
                "init",
                "get_conf",
                "set_conf",
                "set_heatr_conf",
                "set_op_mode",
                "get_meas_dur",
                "get_data"
            ]
        );
    }

    #[test]
    fn configuration_overrides_are_pushed() {
        let mut sensor = FakeSensor::new(healthy_sample());
        let (result, _) = run(&mut sensor, Protocol::Spi);
        result.unwrap();

        let conf = sensor.conf();
        assert_eq!(conf.filter, Filter::Off);
        assert_eq!(conf.odr, Odr::None);
        assert_eq!(conf.os_hum, Oversampling::X16);
        assert_eq!(conf.os_pres, Oversampling::X1);
        assert_eq!(conf.os_temp, Oversampling::X2);
        assert_eq!(
            sensor.heater(),
            Some(HeaterConf {
                enable: true,
                heatr_temp: 300,
                heatr_dur: 100
            })
        );
        assert_eq!(sensor.mode(), OpMode::Forced);
    }

    #[test]
    fn settling_delay_adds_heater_duration() {
        let mut sensor = FakeSensor::new(healthy_sample()).with_meas_dur(4_321);
        let (result, dev) = run(&mut sensor, Protocol::I2c);
        let report = result.unwrap();
        assert_eq!(report.settle_us, 4_321 + 100_000);
        assert_eq!(dev.delay().calls_us(), &[104_321]);
    }

    #[test]
    fn wrong_chip_id_is_device_not_found() {
        let (mut dev, _) = ready_device(Protocol::I2c);
        let mut sensor = FakeSensor::new(healthy_sample()).with_chip_id(0x55);
        let err = run_self_test(&mut sensor, &mut dev).unwrap_err();
        assert_eq!(
            err,
            Error::DevNotFound {
                expected: 0x61,
                actual: 0x55
            }
        );
        assert!(sensor.calls().is_empty());
    }

    #[test]
    fn configuration_failures_are_terminal() {
        for api in ["get_conf", "set_conf"] {
            let mut sensor = FakeSensor::new(healthy_sample()).failing_at(api);
            let (result, _) = run(&mut sensor, Protocol::I2c);
            assert!(matches!(result, Err(Error::Driver { api: failed, .. }) if failed == api));
            assert_eq!(sensor.calls().last(), Some(&api));
        }
    }

    #[test]
    fn heater_failure_is_only_a_warning() {
        let mut sensor = FakeSensor::new(healthy_sample()).failing_at("set_heatr_conf");
        let (result, _) = run(&mut sensor, Protocol::I2c);
        let report = result.unwrap();
        assert_eq!(report.verdict(), Verdict::PassWithWarnings);
        assert!(matches!(
            report.warnings.as_slice(),
            [SelfTestWarning::HeaterConfig(Error::Driver { api: "set_heatr_conf", .. })]
        ));
        assert_eq!(sensor.calls().last(), Some(&"get_data"));
    }

    #[test]
    fn forced_mode_rejection_is_terminal() {
        let mut sensor = FakeSensor::new(healthy_sample()).failing_at("set_op_mode");
        let (result, dev) = run(&mut sensor, Protocol::I2c);
        assert!(matches!(result, Err(Error::Driver { api: "set_op_mode", .. })));
        assert!(dev.delay().calls_us().is_empty());
    }

    #[test]
    fn zero_fields_is_terminal() {
        let mut sensor = FakeSensor::without_data();
        let (result, _) = run(&mut sensor, Protocol::Spi);
        assert_eq!(result.unwrap_err(), Error::NoNewData);
    }

    #[test]
    fn data_fetch_error_propagates_unchanged() {
        let mut sensor = FakeSensor::new(healthy_sample()).failing_at("get_data");
        let (result, _) = run(&mut sensor, Protocol::I2c);
        assert!(matches!(result, Err(Error::Driver { api: "get_data", .. })));
    }

    #[test]
    fn hot_temperature_is_a_validation_fault() {
        let mut sensor = FakeSensor::new(FieldData {
            temperature: 65.0,
            ..healthy_sample()
        });
        let (result, _) = run(&mut sensor, Protocol::I2c);
        assert!(matches!(
            result,
            Err(Error::SelfTest { quantity: "temperature", .. })
        ));
    }

    #[test]
    fn each_range_is_checked_independently() {
        let cases = [
            (FieldData { temperature: -0.5, ..healthy_sample() }, "temperature"),
            (FieldData { pressure: 29_999.0, ..healthy_sample() }, "pressure"),
            (FieldData { pressure: 120_001.0, ..healthy_sample() }, "pressure"),
            (FieldData { humidity: 100.5, ..healthy_sample() }, "humidity"),
            (FieldData { humidity: f32::NAN, ..healthy_sample() }, "humidity"),
        ];
        for (sample, expected) in cases {
            let mut sensor = FakeSensor::new(sample);
            let (result, _) = run(&mut sensor, Protocol::I2c);
            match result {
                Err(Error::SelfTest { quantity, .. }) => assert_eq!(quantity, expected),
                other => panic!("expected {} fault, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let mut sensor = FakeSensor::new(FieldData {
            temperature: 60.0,
            pressure: 30_000.0,
            humidity: 0.0,
            ..healthy_sample()
        });
        let (result, _) = run(&mut sensor, Protocol::I2c);
        assert!(result.unwrap().is_clean());
    }

    #[test]
    fn invalid_gas_measurement_passes_with_warning() {
        let mut sensor = FakeSensor::new(FieldData {
            status: Status::NEW_DATA | Status::HEAT_STAB,
            ..healthy_sample()
        });
        let (result, _) = run(&mut sensor, Protocol::I2c);
        let report = result.unwrap();
        assert_eq!(report.verdict(), Verdict::PassWithWarnings);
        assert_eq!(
            report.warnings,
            vec![SelfTestWarning::GasMeasurementInvalid {
                status: Status::NEW_DATA | Status::HEAT_STAB
            }]
        );
    }

    #[test]
    fn unstable_heater_is_reported_once() {
        let mut sensor = FakeSensor::new(FieldData {
            status: Status::NEW_DATA | Status::GASM_VALID,
            idac: 0x11,
            ..healthy_sample()
        });
        let (result, _) = run(&mut sensor, Protocol::I2c);
        let report = result.unwrap();
        assert_eq!(
            report.warnings,
            vec![SelfTestWarning::HeaterUnstable { idac: 0x11 }]
        );
    }

    #[test]
    fn saturated_idac_downgrades_verdict() {
        let mut sensor = FakeSensor::new(FieldData {
            idac: 0xFF,
            ..healthy_sample()
        });
        let (result, _) = run(&mut sensor, Protocol::I2c);
        let report = result.unwrap();
        assert_eq!(
            report.warnings,
            vec![SelfTestWarning::HeaterUnstable { idac: 0xFF }]
        );
    }

    #[test]
    fn no_gas_and_no_heater_records_both_warnings() {
        let mut sensor = FakeSensor::new(FieldData {
            status: Status::NEW_DATA,
            ..healthy_sample()
        });
        let (result, _) = run(&mut sensor, Protocol::I2c);
        let report = result.unwrap();
        assert_eq!(report.warnings.len(), 2);
        assert!(matches!(
            report.warnings[0],
            SelfTestWarning::GasMeasurementInvalid { .. }
        ));
        assert!(matches!(
            report.warnings[1],
            SelfTestWarning::HeaterUnstable { .. }
        ));
    }

    #[test]
    fn bus_fault_mid_run_aborts() {
        let (mut dev, provider) = ready_device(Protocol::I2c);
        let mut sensor = FakeSensor::new(healthy_sample());
        sensor.init(&mut dev).unwrap();
        provider
            .i2c()
            .fail_next(embedded_hal::i2c::ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Address,
            ));

        let err = run_self_test(&mut sensor, &mut dev).unwrap_err();
        assert!(matches!(err, Error::ComFail(BusError::I2c(_))));
    }

    #[test]
    fn warnings_render_for_operators() {
        let warning = SelfTestWarning::HeaterUnstable { idac: 0x0A };
        assert_eq!(
            warning.to_string(),
            "heater not stable (IDAC: 0x0a), gas readings may be inaccurate"
        );
    }
}
