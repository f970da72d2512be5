use anyhow::Result;
use tracing::{error, trace};

use super::{error::Error, loragw_com::{LgwSpiMuxTarget, LoragwComTrait}, Hal};

/// Description of one register field: byte address, bit offset, signedness, width in bits
/// and read-only flag. Fields wider than 8 bits start at bit 0 and span
/// consecutive addresses, least significant byte first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LgwRegS {
    pub addr: u8,
    pub offs: u8,
    pub sign: bool,
    pub leng: u8,
    pub rdon: bool,
}

pub const LGW_FPGA_SOFT_RESET: u16 = 0;
pub const LGW_FPGA_FPGA_FEATURE: u16 = 1;
pub const LGW_FPGA_VERSION: u16 = 2;
pub const LGW_FPGA_FPGA_STATUS: u16 = 3;
pub const LGW_FPGA_FPGA_CTRL: u16 = 4;
pub const LGW_FPGA_HISTO_RAM_ADDR: u16 = 5;
pub const LGW_FPGA_HISTO_RAM_DATA: u16 = 6;
pub const LGW_FPGA_HISTO_TEMPO: u16 = 7;
pub const LGW_FPGA_HISTO_NB_READ: u16 = 8;
pub const LGW_FPGA_TOTALREGS: usize = 9;

#[rustfmt::skip]
pub const FPGA_REGS: [LgwRegS; LGW_FPGA_TOTALREGS] = [
    LgwRegS { addr: 0, offs: 0, sign: false, leng: 1,  rdon: false }, /* SOFT_RESET */
    LgwRegS { addr: 0, offs: 1, sign: false, leng: 4,  rdon: true  }, /* FPGA_FEATURE */
    LgwRegS { addr: 1, offs: 0, sign: false, leng: 8,  rdon: true  }, /* VERSION */
    LgwRegS { addr: 2, offs: 0, sign: false, leng: 8,  rdon: true  }, /* FPGA_STATUS */
    LgwRegS { addr: 3, offs: 0, sign: false, leng: 8,  rdon: false }, /* FPGA_CTRL */
    LgwRegS { addr: 4, offs: 0, sign: false, leng: 8,  rdon: false }, /* HISTO_RAM_ADDR */
    LgwRegS { addr: 5, offs: 0, sign: false, leng: 8,  rdon: true  }, /* HISTO_RAM_DATA */
    LgwRegS { addr: 6, offs: 0, sign: false, leng: 16, rdon: false }, /* HISTO_TEMPO */
    LgwRegS { addr: 8, offs: 0, sign: false, leng: 16, rdon: false }, /* HISTO_NB_READ */
];

fn fpga_reg(register_id: u16) -> Result<LgwRegS> {
    match FPGA_REGS.get(register_id as usize) {
        Some(r) => Ok(*r),
        None => {
            error!("ERROR: REGISTER NUMBER {} OUT OF DEFINED RANGE", register_id);
            Err(Error::RegisterAccess(format!("FPGA register {} out of range", register_id)).into())
        }
    }
}

fn value_fits(r: &LgwRegS, value: i32) -> bool {
    let value = value as i64;
    if r.sign {
        let half = 1i64 << (r.leng - 1);
        (-half..half).contains(&value)
    } else {
        (0..(1i64 << r.leng)).contains(&value)
    }
}

fn sign_extend(raw: u32, leng: u8) -> i32 {
    let shift = 32 - leng as u32;
    ((raw << shift) as i32) >> shift
}

fn transport_err(e: anyhow::Error) -> anyhow::Error {
    Error::TransportFailure(format!("register access: {:#}", e)).into()
}

/// Register-level access to the FPGA and SX1272 register spaces.
pub trait LoragwRegTrait {
    fn lgw_fpga_reg_w(&mut self, register_id: u16, reg_value: i32) -> Result<()>;
    fn lgw_fpga_reg_r(&mut self, register_id: u16) -> Result<i32>;
    fn lgw_fpga_reg_rb(&mut self, register_id: u16, data: &mut [u8]) -> Result<()>;
    fn lgw_sx1272_reg_w(&mut self, address: u8, reg_value: u8) -> Result<()>;
    fn lgw_sx1272_reg_r(&mut self, address: u8) -> Result<u8>;
}

impl<C: LoragwComTrait> LoragwRegTrait for Hal<C> {
    fn lgw_fpga_reg_w(&mut self, register_id: u16, reg_value: i32) -> Result<()> {
        let r = fpga_reg(register_id)?;
        const TARGET: LgwSpiMuxTarget = LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_FPGA;

        if r.rdon {
            error!("ERROR: TRYING TO WRITE A READ-ONLY REGISTER {}", register_id);
            return Err(Error::RegisterAccess(format!("FPGA register {} is read-only", register_id)).into());
        }
        if !value_fits(&r, reg_value) {
            error!("ERROR: VALUE {} DOES NOT FIT IN {} BITS", reg_value, r.leng);
            return Err(Error::RegisterAccess(format!("value {} out of range for FPGA register {}", reg_value, register_id)).into());
        }

        trace!("FPGA W reg {} @0x{:02X} <- {}", register_id, r.addr, reg_value);

        if r.leng < 8 || r.offs != 0 {
            /* read-modify-write of a sub-byte field */
            let mask: u8 = (((1u16 << r.leng) - 1) as u8) << r.offs;
            let current = self.com.lgw_com_r(TARGET, r.addr).map_err(transport_err)?;
            let value = (current & !mask) | (((reg_value as u8) << r.offs) & mask);
            self.com.lgw_com_w(TARGET, r.addr, value).map_err(transport_err)?;
        } else {
            let size_byte = (r.leng as usize).div_ceil(8);
            let bytes = (reg_value as u32).to_le_bytes();
            for (i, byte) in bytes.iter().take(size_byte).enumerate() {
                self.com.lgw_com_w(TARGET, r.addr + i as u8, *byte).map_err(transport_err)?;
            }
        }

        Ok(())
    }

    fn lgw_fpga_reg_r(&mut self, register_id: u16) -> Result<i32> {
        let r = fpga_reg(register_id)?;
        const TARGET: LgwSpiMuxTarget = LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_FPGA;

        let raw: u32 = if r.leng < 8 || r.offs != 0 {
            let byte = self.com.lgw_com_r(TARGET, r.addr).map_err(transport_err)?;
            ((byte >> r.offs) as u32) & ((1u32 << r.leng) - 1)
        } else {
            let size_byte = (r.leng as usize).div_ceil(8);
            let mut raw = 0u32;
            for i in 0..size_byte {
                let byte = self.com.lgw_com_r(TARGET, r.addr + i as u8).map_err(transport_err)?;
                raw |= (byte as u32) << (8 * i);
            }
            raw
        };

        let value = if r.sign { sign_extend(raw, r.leng) } else { raw as i32 };
        trace!("FPGA R reg {} @0x{:02X} -> {}", register_id, r.addr, value);
        Ok(value)
    }

    fn lgw_fpga_reg_rb(&mut self, register_id: u16, data: &mut [u8]) -> Result<()> {
        let r = fpga_reg(register_id)?;

        if r.offs != 0 || r.leng != 8 {
            error!("ERROR: BURST READ ON A NON BYTE-ALIGNED REGISTER {}", register_id);
            return Err(Error::RegisterAccess(format!("FPGA register {} is not a byte port", register_id)).into());
        }

        trace!("FPGA RB reg {} @0x{:02X} size {}", register_id, r.addr, data.len());
        self.com.lgw_com_rb(LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_FPGA, r.addr, data).map_err(transport_err)
    }

    fn lgw_sx1272_reg_w(&mut self, address: u8, reg_value: u8) -> Result<()> {
        trace!("SX1272 W @0x{:02X} <- 0x{:02X}", address, reg_value);
        self.com.lgw_com_w(LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_SX127X, address, reg_value).map_err(transport_err)
    }

    fn lgw_sx1272_reg_r(&mut self, address: u8) -> Result<u8> {
        let value = self.com.lgw_com_r(LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_SX127X, address).map_err(transport_err)?;
        trace!("SX1272 R @0x{:02X} -> 0x{:02X}", address, value);
        Ok(value)
    }
}
