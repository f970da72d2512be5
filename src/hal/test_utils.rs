//! In-memory register transport used by the unit tests.

use anyhow::{anyhow, Result};

use super::loragw_com::{LgwSpiMuxTarget, LoragwComTrait};
use super::loragw_fpga::RSSI_RANGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComOp {
    Open,
    Close,
    Write(LgwSpiMuxTarget, u8, u8),
    Read(LgwSpiMuxTarget, u8),
    ReadBurst(LgwSpiMuxTarget, u8, usize),
}

/// Register file answering like a healthy gateway: SX1272 version 0x22, FPGA status
/// reporting a finished histogram, and a fixed histogram on the RAM data port.
#[derive(Debug)]
pub struct RegisterFile {
    pub fpga: [u8; 128],
    pub sx127x: [u8; 128],
    pub histogram: Vec<u8>,
    /// SX1272 addresses whose writes are ignored.
    pub frozen_sx127x: Vec<u8>,
    /// Number of operations allowed before every access fails.
    pub fail_after: Option<usize>,
    pub fail_close: bool,
    pub ops: Vec<ComOp>,
    pub opened: usize,
    pub closed: usize,
}

impl Default for RegisterFile {
    fn default() -> Self {
        let mut sx127x = [0u8; 128];
        sx127x[0x42] = 0x22;
        let mut fpga = [0u8; 128];
        fpga[2] = 0x08;
        Self {
            fpga,
            sx127x,
            histogram: vec![0u8; RSSI_RANGE * 2],
            frozen_sx127x: Vec::new(),
            fail_after: None,
            fail_close: false,
            ops: Vec::new(),
            opened: 0,
            closed: 0,
        }
    }
}

impl RegisterFile {
    fn record(&mut self, op: ComOp) -> Result<()> {
        if let Some(n) = self.fail_after {
            if self.ops.len() >= n {
                return Err(anyhow!("SPI link down"));
            }
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn fpga_writes(&self, address: u8) -> Vec<u8> {
        self.ops.iter().filter_map(|op| match op {
            ComOp::Write(LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_FPGA, a, v) if *a == address => Some(*v),
            _ => None,
        }).collect()
    }

    pub fn sx127x_writes(&self) -> Vec<(u8, u8)> {
        self.ops.iter().filter_map(|op| match op {
            ComOp::Write(LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_SX127X, a, v) => Some((*a, *v)),
            _ => None,
        }).collect()
    }
}

impl LoragwComTrait for RegisterFile {
    fn lgw_com_open(&mut self) -> Result<()> {
        self.record(ComOp::Open)?;
        self.opened += 1;
        Ok(())
    }

    fn lgw_com_close(&mut self) -> Result<()> {
        self.closed += 1;
        if self.fail_close {
            return Err(anyhow!("close failed"));
        }
        self.record(ComOp::Close)
    }

    fn lgw_com_w(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8, value: u8) -> Result<()> {
        self.record(ComOp::Write(spi_mux_target, address, value))?;
        match spi_mux_target {
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_FPGA => self.fpga[address as usize] = value,
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_SX127X => {
                if !self.frozen_sx127x.contains(&address) {
                    self.sx127x[address as usize] = value;
                }
            }
            _ => return Err(anyhow!("unexpected target {}", spi_mux_target)),
        }
        Ok(())
    }

    fn lgw_com_r(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8) -> Result<u8> {
        self.record(ComOp::Read(spi_mux_target, address))?;
        match spi_mux_target {
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_FPGA => Ok(self.fpga[address as usize]),
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_SX127X => Ok(self.sx127x[address as usize]),
            _ => Err(anyhow!("unexpected target {}", spi_mux_target)),
        }
    }

    fn lgw_com_rb(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8, data: &mut [u8]) -> Result<()> {
        self.record(ComOp::ReadBurst(spi_mux_target, address, data.len()))?;
        if data.len() != self.histogram.len() {
            return Err(anyhow!("unexpected burst size {}", data.len()));
        }
        data.copy_from_slice(&self.histogram);
        Ok(())
    }
}
