use pcisim_mem::RegisterError;
use thiserror::Error;

use crate::{ConfigError, TransferFault};

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("register access out of range: offset=0x{offset:x} len={len} size=0x{size:x}")]
    OutOfRange { offset: u32, len: usize, size: usize },

    #[error("transfer to or from caller memory failed: {0}")]
    TransferFailed(#[from] TransferFault),

    /// A raw command code that does not name any [`crate::Command`].
    #[error("unknown command code 0x{0:04x}")]
    UnknownCommand(u16),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<RegisterError> for DeviceError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::OutOfRange { offset, len, size } => {
                DeviceError::OutOfRange { offset, len, size }
            }
        }
    }
}
