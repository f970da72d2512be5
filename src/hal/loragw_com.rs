use anyhow::Result;

use serde::{Deserialize, Serialize};

use std::fmt;


#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum LgwComType {
    #[serde(rename = "SPI")]
    LGW_COM_SPI,
    #[serde(rename = "USB")]
    LGW_COM_USB,
    #[serde(rename = "UNKNOWN")]
    LGW_COM_UNKNOWN
}

/// Register space addressed by an SPI frame, selected by the first byte of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
#[repr(u8)]
pub enum  LgwSpiMuxTarget{
    LGW_SPI_MUX_TARGET_SX1301 = 0x00,
    LGW_SPI_MUX_TARGET_FPGA = 0x01,
    LGW_SPI_MUX_TARGET_EEPROM = 0x02,
    LGW_SPI_MUX_TARGET_SX127X = 0x03,
}

impl fmt::Display for LgwComType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LgwComType::LGW_COM_SPI => "LGW_COM_SPI",
            LgwComType::LGW_COM_USB => "LGW_COM_USB",
            LgwComType::LGW_COM_UNKNOWN => "LGW_COM_UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for LgwSpiMuxTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_SX1301 => "LGW_SPI_MUX_TARGET_SX1301",
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_FPGA => "LGW_SPI_MUX_TARGET_FPGA",
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_EEPROM => "LGW_SPI_MUX_TARGET_EEPROM",
            LgwSpiMuxTarget::LGW_SPI_MUX_TARGET_SX127X => "LGW_SPI_MUX_TARGET_SX127X",
        };
        write!(f, "{}", s)
    }
}

/// Byte-level access to the register spaces behind the SPI mux.
///
/// Every call is synchronous: it either completes or returns the transport error.
pub trait LoragwComTrait {
    fn lgw_com_open(&mut self) -> Result<()>;
    fn lgw_com_close(&mut self) -> Result<()>;
    fn lgw_com_w(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8, value: u8) -> Result<()>;
    fn lgw_com_r(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8) -> Result<u8>;
    fn lgw_com_rb(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8, data: &mut [u8]) -> Result<()>;
}
