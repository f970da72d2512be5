//! Argument parsing for running from the command line

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::hal::LgwConfigBoard;
use crate::spectral_scan::{conf::ScanConf, ScanParameters, MAX_FREQ, MIN_FREQ, MIN_STEP_FREQ};

/// Frequency vector given as `start:step:stop` in MHz, stored in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqVector {
    pub start: u32,
    pub step: u32,
    pub stop: u32,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Spectral scan of LoRa gateway channels", long_about = None)]
pub struct Args {
    /// Frequency vector to scan in MHz (start:step:stop), start>800.000 step>0.005 stop<1000.000
    #[arg(short, long = "freq", value_parser = parse_freq_vector)]
    pub freq: Option<FreqVector>,
    /// Total number of RSSI points, [1,65535]
    #[arg(short = 'n', long = "nb-samples", value_parser = clap::value_parser!(u16).range(1..))]
    pub nb_samples: Option<u16>,
    /// Divide factor of RSSI sampling rate, 32MHz/(div+1030), [1,65535]
    #[arg(short = 'r', long = "rate-div", value_parser = clap::value_parser!(u16).range(1..))]
    pub rate_divisor: Option<u16>,
    /// Log file name, ".csv" is appended
    #[arg(short, long = "log")]
    pub log_name: Option<String>,
    /// COM device path of the concentrator
    #[arg(short = 'd', long = "device")]
    pub com_path: Option<String>,
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Histogram acquisition timeout in ms
    #[arg(short = 't', long = "timeout", value_parser = clap::value_parser!(u64).range(1..))]
    pub acquisition_timeout_ms: Option<u64>,
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Args {
    /// Command line values take precedence over the configuration file, which takes
    /// precedence over the built-in defaults.
    pub fn scan_parameters(&self, conf: &ScanConf) -> Result<ScanParameters> {
        let mut merged = conf.clone();
        if let Some(f) = self.freq {
            merged.freq_start = Some(f.start);
            merged.freq_step = Some(f.step);
            merged.freq_stop = Some(f.stop);
        }
        merged.nb_samples = self.nb_samples.or(merged.nb_samples);
        merged.rate_divisor = self.rate_divisor.or(merged.rate_divisor);
        merged.log_name = self.log_name.clone().or(merged.log_name);
        merged.acquisition_timeout_ms = self.acquisition_timeout_ms.or(merged.acquisition_timeout_ms);
        ScanParameters::from_conf(&merged)
    }

    pub fn board_conf(&self, board: &LgwConfigBoard) -> LgwConfigBoard {
        let mut board = board.clone();
        if let Some(path) = &self.com_path {
            board.com_path = path.clone();
        }
        board
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn mhz_to_hz(mhz: f64) -> u32 {
    /* .5 Hz offset to round instead of truncating */
    (mhz * 1e6 + 0.5) as u32
}

fn parse_freq_vector(s: &str) -> Result<FreqVector, String> {
    let parts = s
        .split(':')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| format!("invalid frequency vector {}: {}", s, e))?;
    let &[start, step, stop] = parts.as_slice() else {
        return Err(format!("expected start:step:stop in MHz, got {}", s));
    };
    if !(start.is_finite() && step.is_finite() && stop.is_finite()) {
        return Err(format!("invalid frequency vector {}", s));
    }

    let min = MIN_FREQ as f64 / 1e6;
    let max = MAX_FREQ as f64 / 1e6;
    if start < min || start > max || stop < min || stop > max {
        return Err(format!("start and stop must be in [{:.3}, {:.3}] MHz", min, max));
    }
    if step < MIN_STEP_FREQ as f64 / 1e6 {
        return Err(format!("step must be at least {:.3} MHz", MIN_STEP_FREQ as f64 / 1e6));
    }

    Ok(FreqVector {
        start: mhz_to_hz(start),
        step: mhz_to_hz(step),
        stop: mhz_to_hz(stop),
    })
}
