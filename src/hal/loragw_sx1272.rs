use anyhow::Result;
use tracing::{debug, error};

use super::{error::Error, loragw_com::LoragwComTrait, loragw_reg::LoragwRegTrait, Hal, LGW_XTAL_FREQU};

pub const SX1272_REG_OPMODE: u8 = 0x01;
pub const SX1272_REG_FRF_MSB: u8 = 0x06;
pub const SX1272_REG_FRF_MID: u8 = 0x07;
pub const SX1272_REG_FRF_LSB: u8 = 0x08;
pub const SX1272_REG_LNA: u8 = 0x0C;
pub const SX1272_REG_MODEM_CONFIG1: u8 = 0x1D;
pub const SX1272_REG_MODEM_CONFIG2: u8 = 0x1E;
pub const SX1272_REG_VERSION: u8 = 0x42;
pub const SX1272_REG_LOW_ZIN: u8 = 0x50;
pub const SX1272_REG_ADC_BW: u8 = 0x68;
pub const SX1272_REG_ADC_TRIM: u8 = 0x69;

pub const SX1272_VERSION: u8 = 0x22;

const OPMODE_LONG_RANGE: u8 = 1 << 7;
const OPMODE_SLEEP: u8 = 0x00;
const OPMODE_STANDBY: u8 = 0x01;
const OPMODE_RX_CONTINUOUS: u8 = 0x05;

/* hardware settle time after every operating mode change */
const SX1272_MODE_SETTLE_MS: u64 = 100;

/// Receive-chain settings written to the SX1272 before every RSSI acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sx1272RxConfig {
    pub bw: u8,
    pub low_zin: u8,
    pub sf: u8,
    pub agc_auto: u8,
    pub lna_gain: u8,
    pub trim_rx_cr_fo: u8,
    pub lna_boost: u8,
    pub adc_bw_auto: u8,
    pub adc_bw: u8,
    pub adc_low_pwr: u8,
    pub adc_trim: u8,
    pub adc_test: u8,
}

impl Sx1272RxConfig {
    pub const SPECTRAL_SCAN: Sx1272RxConfig = Sx1272RxConfig {
        bw: 0,
        low_zin: 1,
        sf: 7,
        agc_auto: 1,
        lna_gain: 1,
        trim_rx_cr_fo: 0,
        lna_boost: 3,
        adc_bw_auto: 0,
        adc_bw: 7,
        adc_low_pwr: 0,
        adc_trim: 6,
        adc_test: 0,
    };

    /// Register/value pairs in write order.
    pub fn registers(&self) -> [(u8, u8); 6] {
        [
            (SX1272_REG_MODEM_CONFIG1, self.bw << 6),
            (SX1272_REG_LOW_ZIN, self.low_zin),
            (SX1272_REG_MODEM_CONFIG2, (self.sf << 4) | (self.agc_auto << 2)),
            (SX1272_REG_LNA, self.lna_boost | (self.trim_rx_cr_fo << 3) | (self.lna_gain << 5)),
            (SX1272_REG_ADC_BW, self.adc_bw | (self.adc_bw_auto << 3)),
            (SX1272_REG_ADC_TRIM, self.adc_test | (self.adc_trim << 4) | (self.adc_low_pwr << 7)),
        ]
    }
}

impl Default for Sx1272RxConfig {
    fn default() -> Self {
        Self::SPECTRAL_SCAN
    }
}

/// PLL register value for `freq_hz`: `freq * 2^19 / 32 MHz`, truncated.
pub fn sx1272_freq_to_reg(freq_hz: u32) -> u32 {
    (((freq_hz as u64) << 19) / LGW_XTAL_FREQU as u64) as u32
}

pub fn sx1272_reg_to_freq(freq_reg: u32) -> u32 {
    ((freq_reg as u64 * LGW_XTAL_FREQU as u64) >> 19) as u32
}

/// Keeps the first error of a write sequence while letting the sequence run to the end.
fn first_err(status: &mut Result<()>, r: Result<()>) {
    if status.is_ok() {
        *status = r;
    }
}

pub trait LoragwSx1272Trait {
    fn sx1272_setup(&mut self, freq_hz: u32, conf: &Sx1272RxConfig) -> Result<()>;
    fn sx1272_set_mode(&mut self, mode: u8) -> Result<()>;
}

impl<C: LoragwComTrait> LoragwSx1272Trait for Hal<C> {
    fn sx1272_set_mode(&mut self, mode: u8) -> Result<()> {
        let r = self.lgw_sx1272_reg_w(SX1272_REG_OPMODE, mode);
        self.wait(SX1272_MODE_SETTLE_MS);
        r
    }

    fn sx1272_setup(&mut self, freq_hz: u32, conf: &Sx1272RxConfig) -> Result<()> {
        let version = match self.lgw_sx1272_reg_r(SX1272_REG_VERSION) {
            Ok(v) => v,
            Err(e) => {
                error!("ERROR: Failed to read SX1272 version register");
                return Err(e);
            }
        };
        if version != SX1272_VERSION {
            error!("ERROR: Unexpected SX1272 version 0x{:02X}", version);
            return Err(Error::DeviceIdentityMismatch(version).into());
        }

        let mut status: Result<()> = Ok(());

        /* Set in LoRa mode */
        let r = self.sx1272_set_mode(OPMODE_SLEEP);
        first_err(&mut status, r);
        let r = self.sx1272_set_mode(OPMODE_SLEEP | OPMODE_LONG_RANGE);
        first_err(&mut status, r);
        let r = self.sx1272_set_mode(OPMODE_STANDBY | OPMODE_LONG_RANGE);
        first_err(&mut status, r);

        /* Set PLL freq */
        let freq_reg = sx1272_freq_to_reg(freq_hz);
        debug!(freq_hz, "INFO: SX1272 PLL register 0x{:06X}", freq_reg);
        let r = self.lgw_sx1272_reg_w(SX1272_REG_FRF_MSB, (freq_reg >> 16) as u8);
        first_err(&mut status, r);
        let r = self.lgw_sx1272_reg_w(SX1272_REG_FRF_MID, (freq_reg >> 8) as u8);
        first_err(&mut status, r);
        let r = self.lgw_sx1272_reg_w(SX1272_REG_FRF_LSB, freq_reg as u8);
        first_err(&mut status, r);

        for (address, value) in conf.registers() {
            let r = self.lgw_sx1272_reg_w(address, value);
            first_err(&mut status, r);
        }

        if let Err(e) = status {
            error!("ERROR: Failed to configure SX1272");
            return Err(e);
        }

        /* Set in Rx continuous mode */
        let rx_mode = OPMODE_RX_CONTINUOUS | OPMODE_LONG_RANGE;
        self.sx1272_set_mode(rx_mode)?;
        let mode = self.lgw_sx1272_reg_r(SX1272_REG_OPMODE)?;
        if mode != rx_mode {
            error!("ERROR: SX1272 failed to enter RX continuous mode");
            return Err(Error::ModeTransitionFailed { expected: rx_mode, got: mode }.into());
        }

        debug!("INFO: Successfully configured SX1272 at {} Hz", freq_hz);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::test_utils::RegisterFile;

    #[test]
    fn pll_register_for_868_1_mhz() {
        let freq: u32 = 868_100_000;
        let reg = sx1272_freq_to_reg(freq);
        assert_eq!(reg as u64, ((freq as u64) << 19) / 32_000_000);
        assert_eq!(reg, 0xD9_06_66);

        let msb = (reg >> 16) as u8 as u32;
        let mid = (reg >> 8) as u8 as u32;
        let lsb = reg as u8 as u32;
        let back = ((msb << 16) | (mid << 8) | lsb) as f64 * 32_000_000.0 / (1u64 << 19) as f64;
        let err = freq as f64 - back;
        assert!((0.0..32_000_000.0 / (1u64 << 19) as f64).contains(&err));
    }

    #[test]
    fn pll_register_near_one_ghz_does_not_overflow() {
        let reg = sx1272_freq_to_reg(1_000_000_000);
        assert_eq!(reg, 16_384_000);
        assert_eq!(sx1272_reg_to_freq(reg), 1_000_000_000);
    }

    #[test]
    fn setup_writes_expected_sequence() {
        let mut hal = Hal::with_wait(RegisterFile::default(), |_| {});
        hal.sx1272_setup(868_000_000, &Sx1272RxConfig::SPECTRAL_SCAN).unwrap();

        let reg = sx1272_freq_to_reg(868_000_000);
        let writes = hal.com.sx127x_writes();
        assert_eq!(writes, vec![
            (0x01, 0x00), (0x01, 0x80), (0x01, 0x81),
            (0x06, (reg >> 16) as u8), (0x07, (reg >> 8) as u8), (0x08, reg as u8),
            (0x1D, 0x00), (0x50, 0x01), (0x1E, 0x74), (0x0C, 0x23), (0x68, 0x07), (0x69, 0x60),
            (0x01, 0x85),
        ]);
    }

    #[test]
    fn setup_waits_after_each_mode_change() {
        use std::sync::atomic::{AtomicU64, Ordering};
        static WAITED: AtomicU64 = AtomicU64::new(0);
        let mut hal = Hal::with_wait(RegisterFile::default(), |ms| { WAITED.fetch_add(ms, Ordering::SeqCst); });
        hal.sx1272_setup(915_000_000, &Sx1272RxConfig::default()).unwrap();
        assert_eq!(WAITED.load(Ordering::SeqCst), 4 * SX1272_MODE_SETTLE_MS);
    }

    #[test]
    fn wrong_version_is_rejected_before_any_write() {
        let mut com = RegisterFile::default();
        com.sx127x[0x42] = 0x12;
        let mut hal = Hal::with_wait(com, |_| {});
        let err = hal.sx1272_setup(868_000_000, &Sx1272RxConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DeviceIdentityMismatch(0x12))));
        assert!(hal.com.sx127x_writes().is_empty());
    }

    #[test]
    fn mode_readback_mismatch() {
        let mut com = RegisterFile::default();
        com.frozen_sx127x.push(SX1272_REG_OPMODE);
        let mut hal = Hal::with_wait(com, |_| {});
        let err = hal.sx1272_setup(868_000_000, &Sx1272RxConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ModeTransitionFailed { expected: 0x85, got: 0x00 })));
    }

    #[test]
    fn transport_failure_during_configuration() {
        let mut com = RegisterFile::default();
        /* version read + 3 mode writes succeed, PLL writes fail */
        com.fail_after = Some(4);
        let mut hal = Hal::with_wait(com, |_| {});
        let err = hal.sx1272_setup(868_000_000, &Sx1272RxConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::TransportFailure(_))));
        assert_eq!(hal.com.sx127x_writes().len(), 3);
    }
}
