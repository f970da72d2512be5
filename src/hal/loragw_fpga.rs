use anyhow::Result;
use tracing::{debug, error, info, trace, warn};

use super::{error::Error, loragw_com::LoragwComTrait, loragw_reg::*, Hal};

/* histogram accumulator protocol, fixed by the FPGA firmware */
pub const RSSI_RANGE: usize = 256;
pub const FPGA_HISTO_BURST_SIZE: usize = RSSI_RANGE * 2;
pub const FPGA_HISTO_POLL_MS: u64 = 1000;
const FPGA_STATUS_HISTO_MASK: i32 = 0x0F;
const FPGA_STATUS_HISTO_DONE: i32 = 8;
const FPGA_CTRL_HISTO_START: i32 = 1;
const FPGA_CTRL_HISTO_STOP: i32 = 0;

/// RSSI sampling clock of the accumulator: 32 MHz / (divisor + 1030).
pub const FPGA_RSSI_CLOCK_HZ: f64 = 32e6;
pub const FPGA_RSSI_RATE_DIV_OFFSET: f64 = 1030.0;

/// Static bits of the FPGA_CTRL register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FpgaCtrl {
    pub filt_on: bool,
    pub input_sync_edge: bool,
    pub output_sync_edge: bool,
    pub radio_reset: bool,
}

impl FpgaCtrl {
    pub const SPECTRAL_SCAN: FpgaCtrl = FpgaCtrl {
        filt_on: true,
        input_sync_edge: false,
        output_sync_edge: false,
        radio_reset: false,
    };

    pub fn value(&self) -> i32 {
        ((self.filt_on as i32) << 4)
            | ((self.input_sync_edge as i32) << 2)
            | ((self.output_sync_edge as i32) << 3)
            | ((self.radio_reset as i32) << 1)
    }
}

/// One RSSI histogram as read back from the accumulator RAM, bin `i` holding the number of
/// samples measured at `i + RSSI_OFFSET` dBm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHistogram(pub [u16; RSSI_RANGE]);

impl RawHistogram {
    pub fn from_le_bytes(bytes: &[u8; FPGA_HISTO_BURST_SIZE]) -> Self {
        let mut bins = [0u16; RSSI_RANGE];
        for (bin, pair) in bins.iter_mut().zip(bytes.chunks_exact(2)) {
            *bin = u16::from_le_bytes([pair[0], pair[1]]);
        }
        RawHistogram(bins)
    }

    pub fn bins(&self) -> &[u16; RSSI_RANGE] {
        &self.0
    }
}

impl Default for RawHistogram {
    fn default() -> Self {
        RawHistogram([0; RSSI_RANGE])
    }
}

/// Expected time for the accumulator to collect `nb_read` samples at divisor `rate_div`, in ms.
pub fn fpga_histo_duration_ms(rate_div: u16, nb_read: u16) -> u64 {
    let rate = FPGA_RSSI_CLOCK_HZ / (rate_div as f64 + FPGA_RSSI_RATE_DIV_OFFSET);
    (nb_read as f64 / rate * 1000.0).ceil() as u64
}

/// Number of status polls fitting in `timeout_ms`, at least one.
pub fn fpga_histo_max_polls(timeout_ms: u64) -> u32 {
    timeout_ms.div_ceil(FPGA_HISTO_POLL_MS).clamp(1, u32::MAX as u64) as u32
}

pub trait LoragwFpgaTrait {
    fn lgw_fpga_soft_reset(&mut self) -> Result<()>;
    fn lgw_fpga_get_version(&mut self) -> Result<u8>;
    fn lgw_fpga_ctrl_setup(&mut self, ctrl: FpgaCtrl) -> Result<()>;
    fn lgw_fpga_histo_init(&mut self, rate_div: u16, nb_read: u16) -> Result<()>;
    fn lgw_fpga_histo_acquire(&mut self, max_polls: u32) -> Result<RawHistogram>;
}

impl<C: LoragwComTrait> LoragwFpgaTrait for Hal<C> {
    fn lgw_fpga_soft_reset(&mut self) -> Result<()> {
        let e1 = self.lgw_fpga_reg_w(LGW_FPGA_SOFT_RESET, 1);
        let e2 = self.lgw_fpga_reg_w(LGW_FPGA_SOFT_RESET, 0);
        if let Err(e) = e1.and(e2) {
            error!("ERROR: FPGA soft reset failed");
            return Err(e);
        }
        debug!("INFO: FPGA soft reset done");
        Ok(())
    }

    fn lgw_fpga_get_version(&mut self) -> Result<u8> {
        let version = self.lgw_fpga_reg_r(LGW_FPGA_VERSION)?;
        info!("INFO: FPGA version {}", version);
        Ok(version as u8)
    }

    fn lgw_fpga_ctrl_setup(&mut self, ctrl: FpgaCtrl) -> Result<()> {
        /* pulse the radio reset while setting the static control bits */
        let pulse = FpgaCtrl { radio_reset: true, ..ctrl };
        let e1 = self.lgw_fpga_reg_w(LGW_FPGA_FPGA_CTRL, pulse.value());
        let e2 = self.lgw_fpga_reg_w(LGW_FPGA_FPGA_CTRL, FpgaCtrl { radio_reset: false, ..ctrl }.value());
        e1.and(e2)
    }

    fn lgw_fpga_histo_init(&mut self, rate_div: u16, nb_read: u16) -> Result<()> {
        let e1 = self.lgw_fpga_reg_w(LGW_FPGA_HISTO_TEMPO, rate_div as i32);
        let e2 = self.lgw_fpga_reg_w(LGW_FPGA_HISTO_NB_READ, nb_read as i32);
        if let Err(e) = e1.and(e2) {
            error!(e=?e, "ERROR: Failed to configure FPGA histogram");
            return Err(Error::FpgaConfigFailed(e.into()).into());
        }
        debug!(rate_div, nb_read, "INFO: FPGA histogram configured");
        Ok(())
    }

    fn lgw_fpga_histo_acquire(&mut self, max_polls: u32) -> Result<RawHistogram> {
        /* Start histogram */
        self.lgw_fpga_reg_w(LGW_FPGA_FPGA_CTRL, FPGA_CTRL_HISTO_START)?;

        /* Wait until all RSSI points have been processed */
        let mut polls = 0u32;
        loop {
            self.wait(FPGA_HISTO_POLL_MS);
            let status = self.lgw_fpga_reg_r(LGW_FPGA_FPGA_STATUS)?;
            polls += 1;
            trace!(polls, "FPGA status 0x{:02X}", status);
            if (status & FPGA_STATUS_HISTO_MASK) == FPGA_STATUS_HISTO_DONE {
                break;
            }
            if polls >= max_polls {
                error!("ERROR: histogram not ready after {} polls", polls);
                if let Err(e) = self.lgw_fpga_reg_w(LGW_FPGA_FPGA_CTRL, FPGA_CTRL_HISTO_STOP) {
                    warn!(e=?e, "WARNING: failed to stop histogram");
                }
                return Err(Error::AcquisitionTimeout(polls).into());
            }
        }

        /* Stop histogram */
        self.lgw_fpga_reg_w(LGW_FPGA_FPGA_CTRL, FPGA_CTRL_HISTO_STOP)?;

        /* Read histogram */
        let mut read_burst = [0u8; FPGA_HISTO_BURST_SIZE];
        self.lgw_fpga_reg_w(LGW_FPGA_HISTO_RAM_ADDR, 0)?;
        self.lgw_fpga_reg_rb(LGW_FPGA_HISTO_RAM_DATA, &mut read_burst)?;

        Ok(RawHistogram::from_le_bytes(&read_burst))
    }
}
