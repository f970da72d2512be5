
pub mod error;
pub mod helper;
pub mod loragw_com;
pub mod loragw_fpga;
pub mod loragw_reg;
pub mod loragw_sx1272;
pub mod loragw_usb_com;
pub mod mcu;

#[cfg(test)]
pub(crate) mod test_utils;

use anyhow::Result;
use loragw_com::{LgwComType, LoragwComTrait};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use error::Error;


/* radio-specific parameters */
pub const LGW_XTAL_FREQU:u32 =      32000000;            /* frequency of the RF reference oscillator */

pub const LGW_DEFAULT_COM_PATH: &str = "/dev/ttyACM0";

/**
@struct LgwConfigBoard
@brief Configuration structure for board specificities
*/
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LgwConfigBoard {
    #[serde(default = "default_com_type")]
    pub            com_type:LgwComType,       //* The COMmunication interface (SPI/USB) to connect to the concentrator */
    #[serde(default = "default_com_path")]
    pub            com_path:String   //* Path to access the COM device */
}

fn default_com_type() -> LgwComType {
    LgwComType::LGW_COM_USB
}

fn default_com_path() -> String {
    LGW_DEFAULT_COM_PATH.to_string()
}

impl Default for LgwConfigBoard {
    fn default() -> Self {
        Self {
            com_type: default_com_type(),
            com_path: default_com_path(),
        }
    }
}

impl LgwConfigBoard {
    pub fn check(&self) -> Result<()> {
        if self.com_type != LgwComType::LGW_COM_USB {
            return Err(Error::ValidationError(format!("unsupported COM type {}, only USB is available", self.com_type)).into());
        }
        if self.com_path.is_empty() {
            return Err(Error::ValidationError("empty COM path".to_string()).into());
        }
        Ok(())
    }
}


/// Gateway context: the register transport plus the blocking wait used between hardware steps.
#[derive(Debug)]
pub struct Hal<C: LoragwComTrait> {
    pub com: C,
    pub wait_ms: fn(u64),
    pub is_connected: bool,
}

impl<C: LoragwComTrait> Hal<C> {

    pub fn new(com: C) -> Self {
        Self::with_wait(com, helper::wait_ms)
    }

    pub fn with_wait(com: C, wait_ms: fn(u64)) -> Self {
        Self {
            com,
            wait_ms,
            is_connected: false,
        }
    }

    pub(crate) fn wait(&self, ms: u64) {
        (self.wait_ms)(ms)
    }

    pub fn lgw_connect(&mut self) -> Result<()> {
        if self.is_connected {
            warn!("WARNING: concentrator is already connected");
            return Ok(());
        }

        if let Err(e) = self.com.lgw_com_open() {
            error!(e=?e, "ERROR: failed to connect concentrator");
            return Err(Error::TransportFailure(format!("connect: {:#}", e)).into());
        }

        self.is_connected = true;
        info!("INFO: concentrator connected");
        Ok(())
    }

    pub fn lgw_disconnect(&mut self) -> Result<()> {
        if !self.is_connected {
            info!("Note: concentrator was not connected...");
            return Ok(());
        }

        /* the link is considered released whatever the outcome */
        self.is_connected = false;

        info!("INFO: Disconnecting");
        if let Err(e) = self.com.lgw_com_close() {
            error!(e=?e, "ERROR: failed to disconnect concentrator");
            return Err(Error::TransportFailure(format!("disconnect: {:#}", e)).into());
        }

        Ok(())
    }
}
