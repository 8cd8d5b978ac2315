use crate::bus::Interface;
use crate::errors::{Error, Result};
use crate::sensor::{Conf, FieldData, HeaterConf, OpMode, SensorApi};

const REG_FIELD0: u8 = 0x1D;
const REG_RES_HEAT0: u8 = 0x5A;
const REG_GAS_WAIT0: u8 = 0x64;
const REG_CTRL_HUM: u8 = 0x72;
const REG_CTRL_MEAS: u8 = 0x74;
const REG_CONFIG: u8 = 0x75;
const REG_CHIP_ID: u8 = 0xD0;

/// Scripted stand-in for the sensor-driver core.
///
/// Each call performs a little real register traffic through the
/// [`Interface`] so bus faults surface exactly where the real core would
/// see them, then answers from its script.
#[derive(Debug, Clone)]
pub struct FakeSensor {
    chip_id: u8,
    conf: Conf,
    heater: Option<HeaterConf>,
    mode: OpMode,
    meas_dur_us: u32,
    sample: Option<FieldData>,
    fail_api: Option<&'static str>,
    calls: Vec<&'static str>,
}

impl FakeSensor {
    pub fn new(sample: FieldData) -> Self {
        Self {
            chip_id: 0,
            conf: Conf::default(),
            heater: None,
            mode: OpMode::Sleep,
            meas_dur_us: 1_500,
            sample: Some(sample),
            fail_api: None,
            calls: Vec::new(),
        }
    }

    /// Core that reports zero valid fields
    pub fn without_data() -> Self {
        Self {
            sample: None,
            ..Self::new(FieldData::default())
        }
    }

    pub fn with_meas_dur(mut self, meas_dur_us: u32) -> Self {
        self.meas_dur_us = meas_dur_us;
        self
    }

    /// Make `api` return a driver error
    pub fn failing_at(mut self, api: &'static str) -> Self {
        self.fail_api = Some(api);
        self
    }

    /// Pretend `init` already ran and read `chip_id`
    pub fn with_chip_id(mut self, chip_id: u8) -> Self {
        self.chip_id = chip_id;
        self
    }

    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    pub fn conf(&self) -> Conf {
        self.conf
    }

    pub fn heater(&self) -> Option<HeaterConf> {
        self.heater
    }

    pub fn mode(&self) -> OpMode {
        self.mode
    }

    fn enter(&mut self, api: &'static str) -> Result<()> {
        self.calls.push(api);
        if self.fail_api == Some(api) {
            return Err(Error::Driver {
                api,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn ctrl_meas(&self, mode: OpMode) -> u8 {
        ((self.conf.os_temp as u8) << 5) | ((self.conf.os_pres as u8) << 2) | mode as u8
    }
}

impl SensorApi for FakeSensor {
    fn init<I: Interface>(&mut self, dev: &mut I) -> Result<()> {
        self.enter("init")?;
        let mut id = [0u8; 1];
        dev.read(REG_CHIP_ID, &mut id)?;
        self.chip_id = id[0];
        Ok(())
    }

    fn chip_id(&self) -> u8 {
        self.chip_id
    }

    fn get_conf<I: Interface>(&mut self, dev: &mut I) -> Result<Conf> {
        self.enter("get_conf")?;
        let mut regs = [0u8; 4];
        dev.read(REG_CTRL_HUM, &mut regs)?;
        Ok(self.conf)
    }

    fn set_conf<I: Interface>(&mut self, conf: &Conf, dev: &mut I) -> Result<()> {
        self.enter("set_conf")?;
        dev.write(REG_CTRL_HUM, &[conf.os_hum as u8])?;
        dev.write(REG_CONFIG, &[(conf.filter as u8) << 2])?;
        self.conf = *conf;
        dev.write(REG_CTRL_MEAS, &[self.ctrl_meas(OpMode::Sleep)])?;
        Ok(())
    }

    fn set_heatr_conf<I: Interface>(
        &mut self,
        _mode: OpMode,
        conf: &HeaterConf,
        dev: &mut I,
    ) -> Result<()> {
        self.enter("set_heatr_conf")?;
        let target = conf.heatr_temp.saturating_sub(dev.amb_temp().max(0) as u16);
        dev.write(REG_RES_HEAT0, &[target.min(u8::MAX as u16) as u8])?;
        dev.write(REG_GAS_WAIT0, &[conf.heatr_dur.min(u8::MAX as u16) as u8])?;
        self.heater = Some(*conf);
        Ok(())
    }

    fn set_op_mode<I: Interface>(&mut self, mode: OpMode, dev: &mut I) -> Result<()> {
        self.enter("set_op_mode")?;
        dev.write(REG_CTRL_MEAS, &[self.ctrl_meas(mode)])?;
        self.mode = mode;
        Ok(())
    }

    fn get_meas_dur<I: Interface>(&mut self, _mode: OpMode, _conf: &Conf, _dev: &mut I) -> u32 {
        self.calls.push("get_meas_dur");
        self.meas_dur_us
    }

    fn get_data<I: Interface>(&mut self, _mode: OpMode, dev: &mut I) -> Result<Option<FieldData>> {
        self.enter("get_data")?;
        let mut status = [0u8; 1];
        dev.read(REG_FIELD0, &mut status)?;
        Ok(self.sample)
    }
}
