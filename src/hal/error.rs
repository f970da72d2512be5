/// Boxed cause carried by the wrapping variants, so the whole chain stays walkable with
/// `downcast_ref::<Error>()` on every link.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    ValidationError(String),

    #[error("register transport failure: {0}")]
    TransportFailure(String),

    #[error("unexpected SX1272 version 0x{0:02X}")]
    DeviceIdentityMismatch(u8),

    #[error("SX1272 failed to enter mode 0x{expected:02X} (read back 0x{got:02X})")]
    ModeTransitionFailed { expected: u8, got: u8 },

    #[error("failed to configure FPGA histogram accumulator")]
    FpgaConfigFailed(#[source] Cause),

    #[error("impossible to create log file {0}")]
    LogOpenFailed(String),

    #[error("setup failed: {msg}")]
    SetupFailed {
        msg: String,
        #[source]
        source: Cause,
    },

    #[error("histogram not ready after {0} polls")]
    AcquisitionTimeout(u32),

    #[error("invalid register access: {0}")]
    RegisterAccess(String),

    #[error("failed to disconnect FPGA")]
    DisconnectFailed(#[source] Cause),
}

impl Error {
    pub fn setup_failed(msg: impl Into<String>, source: anyhow::Error) -> Self {
        Error::SetupFailed { msg: msg.into(), source: source.into() }
    }
}
