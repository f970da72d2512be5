//! Frequency sweep driving the SX1272 and the FPGA RSSI histogram accumulator.

pub mod conf;
pub mod histogram;

use std::{
    fs::File,
    io::{BufWriter, Write},
    ops::{Deref, DerefMut},
};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::hal::{
    error::Error,
    loragw_com::LoragwComTrait,
    loragw_fpga::{fpga_histo_duration_ms, fpga_histo_max_polls, FpgaCtrl, LoragwFpgaTrait},
    loragw_sx1272::{LoragwSx1272Trait, Sx1272RxConfig},
    Hal,
};
use conf::ScanConf;

pub const DEFAULT_START_FREQ: u32 = 863_000_000;
pub const DEFAULT_STOP_FREQ: u32 = 870_000_000;
pub const DEFAULT_STEP_FREQ: u32 = 200_000;
pub const DEFAULT_RSSI_PTS: u16 = 65535;
pub const DEFAULT_RSSI_RATE_DIV: u16 = 1;
pub const DEFAULT_LOG_NAME: &str = "rssi_histogram";

pub const MIN_FREQ: u32 = 800_000_000;
pub const MAX_FREQ: u32 = 1_000_000_000;
pub const MIN_STEP_FREQ: u32 = 5_000;

const ACQUISITION_TIMEOUT_MARGIN_MS: u64 = 10_000;

/// Validated parameters of one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanParameters {
    start_freq: u32,
    stop_freq: u32,
    step_freq: u32,
    rssi_sample_count: u16,
    rssi_rate_divisor: u16,
    log_path: String,
    acquisition_timeout_ms: Option<u64>,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            start_freq: DEFAULT_START_FREQ,
            stop_freq: DEFAULT_STOP_FREQ,
            step_freq: DEFAULT_STEP_FREQ,
            rssi_sample_count: DEFAULT_RSSI_PTS,
            rssi_rate_divisor: DEFAULT_RSSI_RATE_DIV,
            log_path: DEFAULT_LOG_NAME.to_string(),
            acquisition_timeout_ms: None,
        }
    }
}

fn invalid(msg: String) -> anyhow::Error {
    Error::ValidationError(msg).into()
}

impl ScanParameters {
    pub fn new(
        start_freq: u32,
        step_freq: u32,
        stop_freq: u32,
        rssi_sample_count: u16,
        rssi_rate_divisor: u16,
        log_path: &str,
    ) -> Result<Self> {
        let params = Self {
            start_freq,
            stop_freq,
            step_freq,
            rssi_sample_count,
            rssi_rate_divisor,
            log_path: log_path.to_string(),
            acquisition_timeout_ms: None,
        };
        params.check()?;
        Ok(params)
    }

    /// Overlays the configured values on top of the built-in defaults.
    pub fn from_conf(conf: &ScanConf) -> Result<Self> {
        let d = Self::default();
        let mut params = Self::new(
            conf.freq_start.unwrap_or(d.start_freq),
            conf.freq_step.unwrap_or(d.step_freq),
            conf.freq_stop.unwrap_or(d.stop_freq),
            conf.nb_samples.unwrap_or(d.rssi_sample_count),
            conf.rate_divisor.unwrap_or(d.rssi_rate_divisor),
            conf.log_name.as_deref().unwrap_or(&d.log_path),
        )?;
        if let Some(ms) = conf.acquisition_timeout_ms {
            params = params.with_acquisition_timeout_ms(ms)?;
        }
        Ok(params)
    }

    pub fn with_acquisition_timeout_ms(mut self, timeout_ms: u64) -> Result<Self> {
        if timeout_ms == 0 {
            return Err(invalid("acquisition timeout must be strictly positive".to_string()));
        }
        self.acquisition_timeout_ms = Some(timeout_ms);
        Ok(self)
    }

    fn check(&self) -> Result<()> {
        for (name, freq) in [("start", self.start_freq), ("stop", self.stop_freq)] {
            if !(MIN_FREQ..=MAX_FREQ).contains(&freq) {
                return Err(invalid(format!("{} frequency {} Hz out of [{}, {}] Hz", name, freq, MIN_FREQ, MAX_FREQ)));
            }
        }
        if self.step_freq < MIN_STEP_FREQ {
            return Err(invalid(format!("step frequency {} Hz below {} Hz", self.step_freq, MIN_STEP_FREQ)));
        }
        if self.stop_freq < self.start_freq {
            return Err(invalid(format!("stop frequency {} Hz below start frequency {} Hz", self.stop_freq, self.start_freq)));
        }
        if self.rssi_sample_count == 0 {
            return Err(invalid("number of RSSI points must be in [1,65535]".to_string()));
        }
        if self.rssi_rate_divisor == 0 {
            return Err(invalid("RSSI rate divisor must be in [1,65535]".to_string()));
        }
        if self.log_path.is_empty() {
            return Err(invalid("empty log file name".to_string()));
        }
        Ok(())
    }

    pub fn start_freq(&self) -> u32 {
        self.start_freq
    }

    pub fn stop_freq(&self) -> u32 {
        self.stop_freq
    }

    pub fn step_freq(&self) -> u32 {
        self.step_freq
    }

    pub fn rssi_sample_count(&self) -> u16 {
        self.rssi_sample_count
    }

    pub fn rssi_rate_divisor(&self) -> u16 {
        self.rssi_rate_divisor
    }

    pub fn log_file_name(&self) -> String {
        format!("{}.csv", self.log_path)
    }

    /// Configured timeout, or twice the expected accumulation time plus a fixed margin.
    pub fn acquisition_timeout_ms(&self) -> u64 {
        self.acquisition_timeout_ms.unwrap_or_else(|| {
            2 * fpga_histo_duration_ms(self.rssi_rate_divisor, self.rssi_sample_count) + ACQUISITION_TIMEOUT_MARGIN_MS
        })
    }

    pub fn frequency_plan(&self) -> FrequencyPlan {
        FrequencyPlan {
            start_freq: self.start_freq,
            step_freq: self.step_freq,
            freq_nb: (self.stop_freq - self.start_freq) / self.step_freq + 1,
        }
    }
}

/// `start + i * step` for `i` in `0..freq_nb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyPlan {
    start_freq: u32,
    step_freq: u32,
    freq_nb: u32,
}

impl FrequencyPlan {
    pub fn len(&self) -> usize {
        self.freq_nb as usize
    }

    pub fn is_empty(&self) -> bool {
        self.freq_nb == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.freq_nb).map(move |i| self.start_freq + i * self.step_freq)
    }
}

/// Connected gateway owned by one sweep. Dropping it without [`ScanSession::close`] still
/// soft-resets the FPGA and releases the link.
struct ScanSession<'a, C: LoragwComTrait> {
    hal: &'a mut Hal<C>,
    closed: bool,
}

impl<'a, C: LoragwComTrait> ScanSession<'a, C> {
    fn open(hal: &'a mut Hal<C>) -> Result<Self> {
        hal.lgw_connect()
            .map_err(|e| Error::setup_failed("Failed to connect to FPGA", e))?;
        Ok(Self { hal, closed: false })
    }

    fn close(mut self) -> Result<()> {
        self.closed = true;
        let e1 = self.hal.lgw_fpga_soft_reset();
        let e2 = self.hal.lgw_disconnect();
        if let Err(e) = e1.and(e2) {
            error!(e=?e, "ERROR: Failed to disconnect FPGA");
            return Err(Error::DisconnectFailed(e.into()).into());
        }
        Ok(())
    }
}

impl<C: LoragwComTrait> Deref for ScanSession<'_, C> {
    type Target = Hal<C>;

    fn deref(&self) -> &Hal<C> {
        self.hal
    }
}

impl<C: LoragwComTrait> DerefMut for ScanSession<'_, C> {
    fn deref_mut(&mut self) -> &mut Hal<C> {
        self.hal
    }
}

impl<C: LoragwComTrait> Drop for ScanSession<'_, C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!("WARNING: scan aborted, resetting FPGA and disconnecting");
        if let Err(e) = self.hal.lgw_fpga_soft_reset() {
            warn!(e=?e, "WARNING: FPGA soft reset failed during cleanup");
        }
        if let Err(e) = self.hal.lgw_disconnect() {
            warn!(e=?e, "WARNING: disconnect failed during cleanup");
        }
    }
}

fn setup_fpga<C: LoragwComTrait>(hal: &mut Hal<C>, params: &ScanParameters) -> Result<()> {
    hal.lgw_fpga_soft_reset()?;
    hal.lgw_fpga_get_version()?;
    hal.lgw_fpga_ctrl_setup(FpgaCtrl::SPECTRAL_SCAN)?;
    hal.lgw_fpga_histo_init(params.rssi_rate_divisor, params.rssi_sample_count)
}

/// Runs one full sweep: FPGA setup, then for every frequency of the plan SX1272 setup,
/// histogram acquisition and logging, then FPGA reset and disconnection.
///
/// CSV rows go to `<log_path>.csv`; banners and per-frequency summaries go to `console`.
pub fn run<C: LoragwComTrait, O: Write>(
    hal: &mut Hal<C>,
    params: &ScanParameters,
    radio_conf: &Sx1272RxConfig,
    console: &mut O,
) -> Result<()> {
    writeln!(console, "+++ Start spectral scan of LoRa gateway channels +++")?;

    let mut session = ScanSession::open(hal)?;

    setup_fpga(&mut *session, params)
        .map_err(|e| Error::setup_failed("Failed to configure FPGA", e))?;

    let log_file_name = params.log_file_name();
    let file = File::create(&log_file_name).map_err(|e| {
        error!(e=%e, "ERROR: impossible to create log file {}", log_file_name);
        Error::LogOpenFailed(log_file_name.clone())
    })?;
    let mut log = BufWriter::new(file);
    writeln!(console, "Writing to file: {}", log_file_name)?;

    let plan = params.frequency_plan();
    writeln!(
        console,
        "Scanning frequencies:\nstart: {} Hz\nstop : {} Hz\nstep : {} Hz\nnb   : {}",
        params.start_freq, params.stop_freq, params.step_freq, plan.len()
    )?;

    let max_polls = fpga_histo_max_polls(params.acquisition_timeout_ms());
    debug!(max_polls, "INFO: histogram acquisition timeout {} ms", params.acquisition_timeout_ms());

    for freq in plan.iter() {
        session
            .sx1272_setup(freq, radio_conf)
            .map_err(|e| Error::setup_failed(format!("SX1272 setup failed at {} Hz", freq), e))?;

        let histogram = session.lgw_fpga_histo_acquire(max_polls)?;

        histogram::reduce_and_log(freq, &histogram, params.rssi_sample_count, &mut log, console)?;
    }

    log.into_inner()
        .map_err(|e| e.into_error())
        .and_then(|f| f.sync_all())
        .with_context(|| format!("failed to write log file {}", log_file_name))?;

    session.close()?;
    info!("INFO: Successfully disconnected FPGA");
    writeln!(console, "INFO: Successfully disconnected FPGA")?;
    writeln!(console, "+++  Exiting Spectral scan program +++")?;

    Ok(())
}
