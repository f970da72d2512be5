use std::io::{Read, Write};
use std::time::Duration;

use serialport::{FlowControl, Parity, SerialPort, StopBits};

use tracing::trace;
use anyhow::Result;

const USB_COM_BAUDRATE: u32 = 115200;
const USB_COM_TIMEOUT_MS: u64 = 5000;

pub struct UsbComPort {
    pub port: Option<Box<dyn SerialPort>>,
}

impl std::fmt::Debug for UsbComPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbComPort")
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl UsbComPort {
    pub fn new () -> Self {
        Self {
            port: None
        }
    }

    pub fn open(&mut self, port_name: &str) -> Result<()> {
        let port = serialport::new(port_name, USB_COM_BAUDRATE)
            .flow_control(FlowControl::None)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(USB_COM_TIMEOUT_MS))
            .open()?;

        self.port = Some(port);
        Ok(())
    }

    pub fn close(&mut self) {
        self.port = None;
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl UsbComPort {
    pub fn write(&mut self, data: &[u8]) -> Result<usize, std::io::Error> {
        trace!(size=%data.len(), "WR: {:02X?}", data);

        match self.port {
            Some(ref mut port) => port.write(data),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "Port not open")),
        }
    }

    pub fn read_exact(&mut self, data: &mut [u8]) -> Result<(), std::io::Error> {
        match self.port {
            Some(ref mut port) => port.read_exact(data)?,
            None => return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "Port not open")),
        }

        trace!("RD: {:02X?}", data);
        Ok(())
    }
}
