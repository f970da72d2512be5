use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum OrderId {
    ReqPing            = 0x00,
    ReqGetStatus       = 0x01,
    ReqWriteGpio       = 0x04,
    ReqMultipleSpi     = 0x05,

    AckPing            = 0x40,
    AckGetStatus       = 0x41,
    AckWriteGpio       = 0x44,
    AckMultipleSpi     = 0x45,
}

#[repr(u8)]
pub enum CommandOrderOffset {
    Id,
    SizeMsb,
    SizeLsb,
    Cmd,
}

#[repr(u8)]
pub enum ECmdOffsetAckPing {
    AckPingUniqueId0,  AckPingUniqueId1,  AckPingUniqueId2,  AckPingUniqueId3,
    AckPingUniqueId4,  AckPingUniqueId5,  AckPingUniqueId6,  AckPingUniqueId7,
    AckPingUniqueId8,  AckPingUniqueId9,  AckPingUniqueId10, AckPingUniqueId11,
    AckPingVersion0,   AckPingVersion1,   AckPingVersion2,   AckPingVersion3,   AckPingVersion4,
    AckPingVersion5,   AckPingVersion6,   AckPingVersion7,   AckPingVersion8,
    AckPingSize,
}

#[repr(u8)]
pub enum ECmdOffsetAckGetStatus {
    AckGetStatusSystemTime31_24, AckGetStatusSystemTime23_16, AckGetStatusSystemTime15_8, AckGetStatusSystemTime7_0,
    AckGetStatusTemperature15_8, AckGetStatusTemperature7_0,
    AckGetStatusSize,
}

#[repr(u8)]
pub enum ECmdOffsetReqWriteGpio {
    ReqWriteGpioPort,
    ReqWriteGpioPin,
    ReqWriteGpioState,
    ReqWriteGpioSize,
}

#[repr(u8)]
pub enum ECmdOffsetAckGpioWrite {
    AckGpioWriteStatus,
    AckGpioWriteSize,
}

pub const  MCU_SPI_REQ_TYPE_READ_WRITE :u8        = 0x01; /* Read/Write SPI request */

/* SPI frame layout inside a MULTIPLE_SPI request */
pub const  MCU_SPI_REQ_HEADER_SIZE: usize = 5;  /* id, type, target, size MSB, size LSB */
pub const  MCU_SPI_FRAME_HEADER_SIZE: usize = 2; /* mux target, address */

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum ESpiStatus {
    SpiStatusOk,
    SpiStatusFail,
    SpiStatusWrongParam,
    SpiStatusTimeout,
    SpiStatusUnknown,
}

impl From<u8> for ESpiStatus {
    fn from(v: u8) -> Self {
        match v {
            0 => ESpiStatus::SpiStatusOk,
            1 => ESpiStatus::SpiStatusFail,
            2 => ESpiStatus::SpiStatusWrongParam,
            3 => ESpiStatus::SpiStatusTimeout,
            _ => ESpiStatus::SpiStatusUnknown,
        }
    }
}

#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum ECmdSpiTarget
{
    MCU_SPI_TARGET_SX1301,  /* SX1301 + FPGA + SX1272 behind the SPI mux */
}

impl Display for ESpiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ESpiStatus::SpiStatusOk => write!(f, "SpiStatusOk"),
            ESpiStatus::SpiStatusFail => write!(f, "SpiStatusFail"),
            ESpiStatus::SpiStatusWrongParam => write!(f, "SpiStatusWrongParam"),
            ESpiStatus::SpiStatusTimeout => write!(f, "SpiStatusTimeout"),
            ESpiStatus::SpiStatusUnknown => write!(f, "SpiStatusUnknown"),
        }
    }
}
