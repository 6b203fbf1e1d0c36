use std::fmt;
use std::time::Duration;

use pcisim_mem::{Scalar, Width};

use crate::{DeviceError, UserBuffer, WaveformTransition};

/// Raw command codes as carried by ioctl-style transports.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CommandCode {
    ReadValue8 = 0x01,
    WriteValue8 = 0x02,
    ReadValue16 = 0x03,
    WriteValue16 = 0x04,
    ReadValue32 = 0x05,
    WriteValue32 = 0x06,
    ReadWaveform = 0x07,
    WriteWaveform = 0x08,
}

impl CommandCode {
    pub const ALL: [CommandCode; 8] = [
        CommandCode::ReadValue8,
        CommandCode::WriteValue8,
        CommandCode::ReadValue16,
        CommandCode::WriteValue16,
        CommandCode::ReadValue32,
        CommandCode::WriteValue32,
        CommandCode::ReadWaveform,
        CommandCode::WriteWaveform,
    ];

    pub fn read_value(width: Width) -> Self {
        match width {
            Width::W8 => CommandCode::ReadValue8,
            Width::W16 => CommandCode::ReadValue16,
            Width::W32 => CommandCode::ReadValue32,
        }
    }

    pub fn write_value(width: Width) -> Self {
        match width {
            Width::W8 => CommandCode::WriteValue8,
            Width::W16 => CommandCode::WriteValue16,
            Width::W32 => CommandCode::WriteValue32,
        }
    }

    /// Width of a scalar command, `None` for the waveform commands.
    pub fn width(self) -> Option<Width> {
        match self {
            CommandCode::ReadValue8 | CommandCode::WriteValue8 => Some(Width::W8),
            CommandCode::ReadValue16 | CommandCode::WriteValue16 => Some(Width::W16),
            CommandCode::ReadValue32 | CommandCode::WriteValue32 => Some(Width::W32),
            CommandCode::ReadWaveform | CommandCode::WriteWaveform => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandCode::ReadValue8 => "RD_VALUE_8",
            CommandCode::WriteValue8 => "WR_VALUE_8",
            CommandCode::ReadValue16 => "RD_VALUE_16",
            CommandCode::WriteValue16 => "WR_VALUE_16",
            CommandCode::ReadValue32 => "RD_VALUE_32",
            CommandCode::WriteValue32 => "WR_VALUE_32",
            CommandCode::ReadWaveform => "RD_WAVEFORM",
            CommandCode::WriteWaveform => "WR_WAVEFORM",
        }
    }
}

impl TryFrom<u16> for CommandCode {
    type Error = DeviceError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        CommandCode::ALL
            .into_iter()
            .find(|c| *c as u16 == code)
            .ok_or(DeviceError::UnknownCommand(code))
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One addressed request to the device.
pub enum Command<'a> {
    ReadScalar {
        width: Width,
        offset: u32,
    },
    WriteScalar {
        offset: u32,
        value: Scalar,
    },
    /// Copy `length` register bytes starting at `offset` into `buffer`.
    ReadWaveformBulk {
        offset: u32,
        length: u32,
        buffer: &'a mut dyn UserBuffer,
    },
    AdvanceWaveform,
}

impl Command<'_> {
    pub fn code(&self) -> CommandCode {
        match self {
            Command::ReadScalar { width, .. } => CommandCode::read_value(*width),
            Command::WriteScalar { value, .. } => CommandCode::write_value(value.width()),
            Command::ReadWaveformBulk { .. } => CommandCode::ReadWaveform,
            Command::AdvanceWaveform => CommandCode::WriteWaveform,
        }
    }
}

impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ReadScalar { width, offset } => f
                .debug_struct("ReadScalar")
                .field("width", width)
                .field("offset", offset)
                .finish(),
            Command::WriteScalar { offset, value } => f
                .debug_struct("WriteScalar")
                .field("offset", offset)
                .field("value", value)
                .finish(),
            Command::ReadWaveformBulk {
                offset,
                length,
                buffer,
            } => f
                .debug_struct("ReadWaveformBulk")
                .field("offset", offset)
                .field("length", length)
                .field("buffer_len", &buffer.len())
                .finish(),
            Command::AdvanceWaveform => f.write_str("AdvanceWaveform"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Scalar {
        offset: u32,
        value: Scalar,
    },
    Written,
    /// `length` bytes were copied into the caller's buffer; `elapsed` is the wall-clock time of
    /// the copy and is purely diagnostic.
    WaveformRead {
        length: u32,
        elapsed: Duration,
    },
    WaveformAdvanced(WaveformTransition),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_u16() {
        for code in CommandCode::ALL {
            assert_eq!(CommandCode::try_from(code as u16).unwrap(), code);
        }
        assert_eq!(
            CommandCode::try_from(0x00),
            Err(DeviceError::UnknownCommand(0x00))
        );
        assert_eq!(
            CommandCode::try_from(0x1234),
            Err(DeviceError::UnknownCommand(0x1234))
        );
    }

    #[test]
    fn command_codes_follow_width() {
        let mut buf = vec![0u8; 4];
        assert_eq!(
            Command::ReadScalar {
                width: Width::W16,
                offset: 0
            }
            .code(),
            CommandCode::ReadValue16
        );
        assert_eq!(
            Command::WriteScalar {
                offset: 0,
                value: Scalar::U8(1)
            }
            .code(),
            CommandCode::WriteValue8
        );
        assert_eq!(
            Command::ReadWaveformBulk {
                offset: 0,
                length: 4,
                buffer: &mut buf
            }
            .code(),
            CommandCode::ReadWaveform
        );
        assert_eq!(Command::AdvanceWaveform.code(), CommandCode::WriteWaveform);
        assert_eq!(CommandCode::ReadValue32.width(), Some(Width::W32));
        assert_eq!(CommandCode::WriteWaveform.width(), None);
        assert_eq!(CommandCode::WriteValue16.to_string(), "WR_VALUE_16");
    }
}
