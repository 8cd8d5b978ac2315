//! Boundary to the BME69x sensor-driver core.
//!
//! The driver core owns the register map, compensation math and heater
//! encoding. This crate only fixes the shape of the calls it makes and the
//! values it hands back; every call receives the device descriptor so the
//! core can reach the bus through [`Interface`].

use bitflags::bitflags;

use crate::bus::Interface;
use crate::errors::Result;

/// Chip identifier reported by every BME69x variant
pub const CHIP_ID: u8 = 0x61;
/// I2C address with SDO tied to ground
pub const I2C_ADDR_LOW: u8 = 0x76;
/// I2C address with SDO tied to VDDIO
pub const I2C_ADDR_HIGH: u8 = 0x77;

bitflags! {
    /// Measurement status byte of one data field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Status: u8 {
        /// Field holds a measurement not yet read.
        const NEW_DATA   = 0x80;
        /// Gas conversion finished and is valid.
        const GASM_VALID = 0x20;
        /// Heater reached its target temperature.
        const HEAT_STAB  = 0x10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Oversampling {
    #[default]
    None,
    X1,
    X2,
    X4,
    X8,
    X16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    Off,
    Size1,
    Size3,
    Size7,
    Size15,
    Size31,
    Size63,
    Size127,
}

/// Standby time between measurements in sequential mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Odr {
    Ms0_59,
    Ms62_5,
    Ms125,
    Ms250,
    Ms500,
    Ms1000,
    Ms10,
    Ms20,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpMode {
    #[default]
    Sleep,
    Forced,
    Parallel,
    Sequential,
}

/// Oversampling, filter and output-data-rate settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conf {
    pub os_hum: Oversampling,
    pub os_temp: Oversampling,
    pub os_pres: Oversampling,
    pub filter: Filter,
    pub odr: Odr,
}

/// Gas-sensor hot plate setpoint for forced mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaterConf {
    pub enable: bool,
    /// Target temperature (°C)
    pub heatr_temp: u16,
    /// Hold duration (ms)
    pub heatr_dur: u16,
}

/// One compensated data field
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldData {
    pub status: Status,
    pub gas_index: u8,
    pub meas_index: u8,
    /// Heater current DAC readback
    pub idac: u8,
    /// Temperature (°C)
    pub temperature: f32,
    /// Pressure (Pa)
    pub pressure: f32,
    /// Relative humidity (%)
    pub humidity: f32,
    /// Gas resistance (Ω)
    pub gas_resistance: f32,
}

/// Public operations of the sensor-driver core.
pub trait SensorApi {
    /// Identify the chip and load its calibration
    fn init<I: Interface>(&mut self, dev: &mut I) -> Result<()>;

    /// Chip identifier read during [`SensorApi::init`]
    fn chip_id(&self) -> u8;

    fn get_conf<I: Interface>(&mut self, dev: &mut I) -> Result<Conf>;

    fn set_conf<I: Interface>(&mut self, conf: &Conf, dev: &mut I) -> Result<()>;

    fn set_heatr_conf<I: Interface>(
        &mut self,
        mode: OpMode,
        conf: &HeaterConf,
        dev: &mut I,
    ) -> Result<()>;

    fn set_op_mode<I: Interface>(&mut self, mode: OpMode, dev: &mut I) -> Result<()>;

    /// Measurement duration (µs) for `conf`, heater time excluded
    fn get_meas_dur<I: Interface>(&mut self, mode: OpMode, conf: &Conf, dev: &mut I) -> u32;

    /// Fetch the latest field; `None` when no valid field is available
    fn get_data<I: Interface>(&mut self, mode: OpMode, dev: &mut I) -> Result<Option<FieldData>>;
}
