pub mod command;
mod helper;


use command::{*};
use rand::Rng;
use tracing::{debug, error, info, trace};
use super::loragw_usb_com::UsbComPort;
use anyhow::{anyhow,Result};
use crate::hal::{error::Error, loragw_com::{LgwSpiMuxTarget, LoragwComTrait}};

const MAX_SIZE_COMMAND:usize =  4200;
const MAX_SPI_COMMAND:usize  =   MAX_SIZE_COMMAND - HEADER_CMD_SIZE - 1 ;

const HEADER_CMD_SIZE:usize = 4;

/* SPI address byte: bit 7 selects write access */
const SPI_WRITE_BIT: u8 = 0x80;
const SPI_ADDR_MASK: u8 = 0x7F;


#[derive(Debug)]
pub struct PingInfo {
    pub unique_id_high: u32,
    pub unique_id_mid: u32,
    pub unique_id_low: u32,
    pub version: String /* format is V00.00.00 */
}

#[derive(Debug)]
pub struct Status{
    pub system_time_ms :u32,
    pub temperature: f32
}


impl Status {
    pub fn from_get_status(hdr: &[u8], payload:&[u8]) -> Result<Status> {
        if hdr[CommandOrderOffset::Cmd as usize] != OrderId::AckGetStatus as u8 {
            return Err(anyhow!("ERROR: received wrong ACK type {:}", hdr[CommandOrderOffset::Cmd as usize]));
        }

        Ok(Status {
            system_time_ms: helper::bytes_be_to_uint32(&payload[ECmdOffsetAckGetStatus::AckGetStatusSystemTime31_24 as usize..])?,
            temperature: helper::bytes_be_to_uint16(&payload[ECmdOffsetAckGetStatus::AckGetStatusTemperature15_8 as usize..])? as f32 / 100.0
        })
    }
}

impl PingInfo {
    pub fn from_ping(hdr: &[u8], payload:&[u8]) -> Result<PingInfo> {

        if hdr[CommandOrderOffset::Cmd as usize] != OrderId::AckPing as u8 {
            return Err(anyhow!("ERROR: received wrong ACK type {:}", hdr[CommandOrderOffset::Cmd as usize]));
        }

        let version = &payload[ECmdOffsetAckPing::AckPingVersion0 as usize..ECmdOffsetAckPing::AckPingSize as usize];

        Ok(PingInfo {
            unique_id_high: helper::bytes_be_to_uint32(&payload[ECmdOffsetAckPing::AckPingUniqueId0 as usize..])?,
            unique_id_mid: helper::bytes_be_to_uint32(&payload[ECmdOffsetAckPing::AckPingUniqueId4 as usize..])?,
            unique_id_low: helper::bytes_be_to_uint32(&payload[ECmdOffsetAckPing::AckPingUniqueId8 as usize..])?,
            version: String::from_utf8_lossy(version).trim_end_matches('\0').to_string(),
        })
    }
}

/// USB bridge MCU forwarding SPI frames to the gateway SPI mux.
#[derive(Debug)]
pub struct Mcu {
    pub com: UsbComPort,
    pub port_name: String,
    pub ping_info: Option<PingInfo>,
    pub status: Option<Status>,
}

impl Mcu {
    pub fn new (port_name: &str) -> Self {
        Self {
            com: UsbComPort::new(),
            port_name: port_name.to_owned(),
            ping_info: None,
            status: None,
        }
    }

    fn write_req(&mut self, order:OrderId, payload: &[u8]) ->Result<()> {
        let mut buf_w = [0u8; HEADER_CMD_SIZE];

        if payload.len() > MAX_SPI_COMMAND {
            return Err(anyhow!("Data too long"));
        }

        buf_w[CommandOrderOffset::Id as usize] = rand::rng().random::<u8>();
        buf_w[CommandOrderOffset::SizeMsb as usize] = (payload.len() >> 8) as u8;
        buf_w[CommandOrderOffset::SizeLsb as usize] = (payload.len() & 0xFF) as u8;
        buf_w[CommandOrderOffset::Cmd as usize] = order as u8;

        let n = self.com.write(&buf_w)?;
        if n < HEADER_CMD_SIZE {
            return Err(anyhow!("Failed to write to serial port"));
        }

        if !payload.is_empty() {
            let n = self.com.write(payload)?;
            if n < payload.len() {
                return Err(anyhow!("Failed to write to serial port"));
            }
        }

        trace!("write_req done");
        Ok(())
    }

    fn read_ack(&mut self, hdr: &mut [u8], buf: &mut [u8]) -> Result<()> {

        self.com.read_exact(hdr).map_err(|e| anyhow!("Failed to read HDR: {}", e))?;

        trace!("READ HD: {:02X?}", hdr);

        if  hdr[CommandOrderOffset::Cmd as usize] < OrderId::AckPing as u8 ||
            hdr[CommandOrderOffset::Cmd as usize] > OrderId::AckMultipleSpi as u8
        {
            return Err(anyhow!("ERROR: received wrong ACK type {:}", hdr[CommandOrderOffset::Cmd as usize]))
        }

        let size = Self::cmd_get_size(hdr);
        trace!("READ SIZE: {:}", size);

        if size > buf.len() {
            return Err(anyhow!("ERROR: ACK payload too large ({} > {})", size, buf.len()));
        }

        if size > 0 {
            self.com.read_exact(&mut buf[..size]).map_err(|e| anyhow!("Failed to read Payload: {}", e))?;
        }

        Ok(())
    }

    pub fn mcu_ping(&mut self) -> Result<PingInfo> {
        let mut buf_r = [0u8; ECmdOffsetAckPing::AckPingSize as usize];
        let mut buf_hdr = [0u8; HEADER_CMD_SIZE];

        self.write_req(OrderId::ReqPing, &[])?;
        self.read_ack(&mut buf_hdr, &mut buf_r)?;

        PingInfo::from_ping(&buf_hdr, &buf_r)
    }

    pub fn get_mcu_status(&mut self) -> Result<Status> {
        let mut buf_r = [0u8; ECmdOffsetAckGetStatus::AckGetStatusSize as usize];
        let mut buf_hdr = [0u8; HEADER_CMD_SIZE];

        self.write_req(OrderId::ReqGetStatus, &[])?;
        self.read_ack(&mut buf_hdr, &mut buf_r)?;

        Status::from_get_status(&buf_hdr, &buf_r)
    }

    fn decode_ack_gpio_access(hdr: &[u8], payload: &[u8]) -> Result<u8> {
        if hdr[CommandOrderOffset::Cmd as usize] != OrderId::AckWriteGpio as u8 {
            return Err(anyhow!("ERROR: received wrong ACK type {:}", hdr[CommandOrderOffset::Cmd as usize]));
        }

        Ok(payload[ECmdOffsetAckGpioWrite::AckGpioWriteStatus as usize])
    }

    fn cmd_get_size( bytes:& [u8]) -> usize {
        (((bytes[CommandOrderOffset::SizeMsb as usize] as u16) << 8) | (bytes[CommandOrderOffset::SizeLsb as usize] as u16)) as usize
    }

    fn decode_ack_spi(hdr: &[u8], payload: &[u8]) -> Result<()> {
        if hdr[CommandOrderOffset::Cmd as usize] != OrderId::AckMultipleSpi as u8 {
            return Err(anyhow!("ERROR: wrong ACK type for ACK_MULTIPLE_SPI (expected:0x{:02X}, got 0x{:02X})", OrderId::AckMultipleSpi as u8, hdr[CommandOrderOffset::Cmd as usize]));
        }

        let size = Self::cmd_get_size(hdr);
        let mut i = 0;
        while i < size {
            if i + MCU_SPI_REQ_HEADER_SIZE > payload.len() {
                return Err(anyhow!("ERROR: truncated ACK_MULTIPLE_SPI payload"));
            }
            let req_id = payload[i];
            let req_type = payload[i + 1];
            if req_type != MCU_SPI_REQ_TYPE_READ_WRITE {
                return Err(anyhow!("ERROR: wrong type for SPI request {} (0x{:02X})", req_id, req_type));
            }
            let req_status = ESpiStatus::from(payload[i + 2]);
            if req_status != ESpiStatus::SpiStatusOk {
                return Err(anyhow!("ERROR: SPI request {} failed with {}", req_id, req_status));
            }

            let frame_size = ((payload[i + 3] as usize) << 8) | (payload[i + 4] as usize);
            i += MCU_SPI_REQ_HEADER_SIZE + frame_size;
        }

        Ok(())
    }

    pub fn mcu_gpio_write(&mut self, gpio_port: u8, gpio_id: u8, gpio_value: u8) -> Result<()> {
        let mut buf_req = [0u8; ECmdOffsetReqWriteGpio::ReqWriteGpioSize as usize];
        let mut buf_ack = [0u8; ECmdOffsetAckGpioWrite::AckGpioWriteSize as usize];
        let mut buf_hdr = [0u8; HEADER_CMD_SIZE];

        buf_req[ECmdOffsetReqWriteGpio::ReqWriteGpioPort as usize] = gpio_port;
        buf_req[ECmdOffsetReqWriteGpio::ReqWriteGpioPin as usize] = gpio_id;
        buf_req[ECmdOffsetReqWriteGpio::ReqWriteGpioState as usize] = gpio_value;

        self.write_req(OrderId::ReqWriteGpio, &buf_req)?;

        self.read_ack(&mut buf_hdr, &mut buf_ack)?;

        let status = Mcu::decode_ack_gpio_access(&buf_hdr, &buf_ack)?;

        if status != 0 {
            return Err(anyhow!("ERROR: Failed to write GPIO (port:{} id:{} value:{})", gpio_port, gpio_id, gpio_value));
        }

        Ok(())
    }

    pub fn mcu_reset(&mut self) -> Result<()> {
        self.mcu_gpio_write( 0, 1, 1)?; /*   set PA1 : POWER_EN */
        self.mcu_gpio_write( 0, 2, 1)?; /*   set PA2 : CONCENTRATOR_RESET active */
        self.mcu_gpio_write( 0, 2, 0)?; /* unset PA2 : CONCENTRATOR_RESET inactive */

        Ok(())
    }

    pub fn mcu_spi_write(&mut self, in_out_buf: &mut [u8]) -> Result<()> {

        if in_out_buf.is_empty() {
            return Err(anyhow!("Input buffer is null"));
        }

        self.write_req(OrderId::ReqMultipleSpi, in_out_buf)?;

        let mut buf_hdr = [0u8; HEADER_CMD_SIZE];

        self.read_ack(&mut buf_hdr, in_out_buf)?;

        Mcu::decode_ack_spi(&buf_hdr, in_out_buf)
    }

    /// Builds a single MULTIPLE_SPI request carrying `[mux target, address byte, payload...]`.
    fn spi_request(spi_mux_target: LgwSpiMuxTarget, address_byte: u8, payload: &[u8]) -> Vec<u8> {
        let frame_size = MCU_SPI_FRAME_HEADER_SIZE + payload.len();
        let mut in_out_buf = Vec::with_capacity(MCU_SPI_REQ_HEADER_SIZE + frame_size);

        /* Request metadata */
        in_out_buf.push(0); /* Req ID */
        in_out_buf.push(MCU_SPI_REQ_TYPE_READ_WRITE);
        in_out_buf.push(ECmdSpiTarget::MCU_SPI_TARGET_SX1301 as u8);
        in_out_buf.push((frame_size >> 8) as u8);
        in_out_buf.push((frame_size & 0xFF) as u8);
        /* RAW SPI frame */
        in_out_buf.push(spi_mux_target as u8);
        in_out_buf.push(address_byte);
        in_out_buf.extend_from_slice(payload);

        in_out_buf
    }

    /// Ping, status read and concentrator reset run once the serial port is open.
    fn handshake(&mut self) -> Result<()> {
        let ping_info = self.mcu_ping()?;
        debug!(version=%ping_info.version, "INFO: bridge MCU ping ok, unique id 0x{:08X}{:08X}{:08X}",
            ping_info.unique_id_high, ping_info.unique_id_mid, ping_info.unique_id_low);
        self.ping_info = Some(ping_info);

        let status = self.get_mcu_status()?;
        debug!("INFO: bridge MCU uptime {} ms, temperature {:.1} C", status.system_time_ms, status.temperature);
        self.status = Some(status);

        self.mcu_reset()
    }
}

impl LoragwComTrait for Mcu {
    fn lgw_com_open(&mut self) -> Result<()> {
        let port_name = self.port_name.clone();
        info!("INFO: opening USB bridge on {}", port_name);
        self.com.open(&port_name).map_err(|e| Error::TransportFailure(format!("{}: {}", port_name, e)))?;

        if let Err(e) = self.handshake() {
            error!(e=?e, "ERROR: bridge MCU handshake failed on {}", port_name);
            self.com.close();
            return Err(e);
        }
        Ok(())
    }

    fn lgw_com_close(&mut self) -> Result<()> {
        if !self.com.is_open() {
            return Ok(());
        }

        /* Reset concentrator before closing */
        let e1 = self.mcu_gpio_write(0, 1, 1); /*   set PA1 : POWER_EN */
        let e2 = self.mcu_gpio_write(0, 2, 1); /*   set PA2 : CONCENTRATOR_RESET active */
        let e3 = self.mcu_gpio_write(0, 2, 0); /* unset PA2 : CONCENTRATOR_RESET inactive */

        self.com.close();

        if e1.is_err() || e2.is_err() || e3.is_err() {
            error!("ERROR: failed to reset concentrator before closing");
            return Err(Error::TransportFailure("reset on close".to_string()).into());
        }

        Ok(())
    }

    fn lgw_com_w(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8, value: u8) -> Result<()> {
        let mut in_out_buf = Self::spi_request(spi_mux_target, SPI_WRITE_BIT | (address & SPI_ADDR_MASK), &[value]);

        self.mcu_spi_write(&mut in_out_buf).map_err(|e| anyhow!("ERROR: USB WRITE FAILURE: {:}", e))?;

        trace!("Note: USB write success");
        Ok(())
    }

    fn lgw_com_r(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8) -> Result<u8> {
        let mut data = [0u8; 1];
        self.lgw_com_rb(spi_mux_target, address, &mut data)?;
        Ok(data[0])
    }

    /* Burst (multiple-byte) read */
    fn lgw_com_rb(&mut self, spi_mux_target: LgwSpiMuxTarget, address: u8, data: &mut [u8]) -> Result<()> {
        if data.is_empty() {
            return Err(anyhow!("ERROR: empty data array"));
        }

        let mut in_out_buf = Self::spi_request(spi_mux_target, address & SPI_ADDR_MASK, &vec![0u8; data.len()]);

        if let Err(e) = self.mcu_spi_write(&mut in_out_buf) {
            error!("ERROR: USB READ BURST FAILURE");
            return Err(e);
        }

        trace!("Note: USB read burst success");
        let offset = MCU_SPI_REQ_HEADER_SIZE + MCU_SPI_FRAME_HEADER_SIZE;
        data.copy_from_slice(&in_out_buf[offset..offset + data.len()]);

        Ok(())
    }
}
