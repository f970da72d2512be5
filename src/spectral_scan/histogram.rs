//! Reduction of one RSSI histogram to a CSV log row and a percentile summary.

use std::fmt::Write as _;
use std::io::Write;

use crate::hal::loragw_fpga::RawHistogram;

pub const RSSI_OFFSET: i32 = -135;

/// Fractions of the sample budget reported on the console, in increasing order.
pub const RSSI_THRESHOLDS: [f32; 5] = [0.1, 0.3, 0.5, 0.8, 1.0];

/// First histogram bin at which the cumulative count went above `threshold * sample_count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileCrossing {
    pub threshold: f32,
    pub bin: usize,
}

impl PercentileCrossing {
    pub fn percent(&self) -> u16 {
        (self.threshold * 100.0) as u16
    }

    pub fn rssi(&self) -> i32 {
        bin_rssi(self.bin)
    }
}

pub fn bin_rssi(bin: usize) -> i32 {
    bin as i32 + RSSI_OFFSET
}

/// Walks the bins in ascending order; each bin can move past at most one threshold.
pub fn percentile_crossings(histogram: &RawHistogram, sample_count: u16) -> Vec<PercentileCrossing> {
    let mut crossings = Vec::with_capacity(RSSI_THRESHOLDS.len());
    let mut cumulative: u32 = 0;

    for (bin, &count) in histogram.bins().iter().enumerate() {
        cumulative += count as u32;
        let Some(&threshold) = RSSI_THRESHOLDS.get(crossings.len()) else {
            break;
        };
        if cumulative as f32 > threshold * sample_count as f32 {
            crossings.push(PercentileCrossing { threshold, bin });
        }
    }

    crossings
}

/// `freq,rssi_0,count_0,...,rssi_255,count_255`
pub fn csv_row(freq_hz: u32, histogram: &RawHistogram) -> String {
    let mut row = freq_hz.to_string();
    for (bin, count) in histogram.bins().iter().enumerate() {
        let _ = write!(row, ",{},{}", bin_rssi(bin), count);
    }
    row
}

pub fn summary_line(freq_hz: u32, crossings: &[PercentileCrossing]) -> String {
    let mut line = freq_hz.to_string();
    for c in crossings {
        let _ = write!(line, "  {}%<{:4}", c.percent(), c.rssi());
    }
    line
}

/// Appends the CSV row of `histogram` to `log` and prints the percentile summary on `console`.
pub fn reduce_and_log<L: Write, O: Write>(
    freq_hz: u32,
    histogram: &RawHistogram,
    sample_count: u16,
    log: &mut L,
    console: &mut O,
) -> std::io::Result<Vec<PercentileCrossing>> {
    writeln!(log, "{}", csv_row(freq_hz, histogram))?;

    let crossings = percentile_crossings(histogram, sample_count);
    writeln!(console, "{}", summary_line(freq_hz, &crossings))?;

    Ok(crossings)
}
