//! Binary request/reply frames for talking to a simulated device over a byte transport.
//!
//! The layout follows the ioctl interface of a character-device driver:
//! - a little-endian `u16` tag, which for addressed commands is the [`CommandCode`]
//! - a fixed payload: [`IoValue`] for scalar commands, [`IoWaveform`] for waveform reads
//!
//! Two extra tags cover the plain `read()`/`write()` bulk path. Replies carry their own tag so a
//! client can decode them without remembering what it asked for.
//!
//! Stream transports prefix every frame with its length as a little-endian `u32`.

#![forbid(unsafe_code)]

use pcisim_device::{CommandCode, DeviceError, Width};
use thiserror::Error;

/// Upper bound on a single frame: a full 1 MiB register dump plus headers fits comfortably.
pub const MAX_FRAME_BYTES: usize = 2 << 20;

/// Size of the length prefix used by stream transports.
pub const LENGTH_PREFIX_BYTES: usize = 4;

pub const TAG_BULK_READ: u16 = 0x0010;
pub const TAG_BULK_WRITE: u16 = 0x0011;

const REPLY_VALUE: u16 = 0x8000;
const REPLY_ACK: u16 = 0x8001;
const REPLY_WAVEFORM: u16 = 0x8002;
const REPLY_BULK_DATA: u16 = 0x8003;
const REPLY_BULK_WRITTEN: u16 = 0x8004;
const REPLY_ERROR: u16 = 0x80FF;

/// Payload of the scalar commands: register offset plus a value slot wide enough for 32 bits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IoValue {
    pub offset: u32,
    pub value: u32,
}

impl IoValue {
    pub const SIZE: usize = 8;

    fn encode(&self, out: &mut Vec<u8>) {
        push_u32(out, self.offset);
        push_u32(out, self.value);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            offset: r.read_u32()?,
            value: r.read_u32()?,
        })
    }
}

/// Payload of the waveform read: the data itself travels back in [`Reply::Waveform`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IoWaveform {
    pub offset: u32,
    pub length: u32,
}

impl IoWaveform {
    pub const SIZE: usize = 8;

    fn encode(&self, out: &mut Vec<u8>) {
        push_u32(out, self.offset);
        push_u32(out, self.length);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            offset: r.read_u32()?,
            length: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadValue { width: Width, offset: u32 },
    /// `value` is truncated to `width` by the device.
    WriteValue { width: Width, offset: u32, value: u32 },
    ReadWaveform(IoWaveform),
    AdvanceWaveform,
    BulkRead { length: u32 },
    BulkWrite { data: Vec<u8> },
}

impl Request {
    pub fn tag(&self) -> u16 {
        match self {
            Request::ReadValue { width, .. } => CommandCode::read_value(*width) as u16,
            Request::WriteValue { width, .. } => CommandCode::write_value(*width) as u16,
            Request::ReadWaveform(_) => CommandCode::ReadWaveform as u16,
            Request::AdvanceWaveform => CommandCode::WriteWaveform as u16,
            Request::BulkRead { .. } => TAG_BULK_READ,
            Request::BulkWrite { .. } => TAG_BULK_WRITE,
        }
    }
}

/// Reply status carried by [`Reply::Error`].
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    OutOfRange = 1,
    TransferFailed = 2,
    UnknownCommand = 3,
    Malformed = 4,
    Internal = 5,
}

impl Status {
    fn from_u16(v: u16) -> Result<Self, DecodeError> {
        Ok(match v {
            1 => Status::OutOfRange,
            2 => Status::TransferFailed,
            3 => Status::UnknownCommand,
            4 => Status::Malformed,
            5 => Status::Internal,
            _ => return Err(DecodeError::InvalidStatus(v)),
        })
    }
}

impl From<&DeviceError> for Status {
    fn from(err: &DeviceError) -> Self {
        match err {
            DeviceError::OutOfRange { .. } => Status::OutOfRange,
            DeviceError::TransferFailed(_) => Status::TransferFailed,
            DeviceError::UnknownCommand(_) => Status::UnknownCommand,
            DeviceError::Config(_) => Status::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Result of a scalar read, zero-extended to 32 bits.
    Value { offset: u32, value: u32 },
    Ack,
    Waveform { elapsed_ns: u64, data: Vec<u8> },
    BulkData { data: Vec<u8> },
    BulkWritten { len: u32 },
    Error { status: Status, message: String },
}

impl Reply {
    pub fn error(status: Status, message: impl Into<String>) -> Self {
        Reply::Error {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of frame")]
    UnexpectedEof,
    #[error("unknown tag 0x{0:04x}")]
    UnknownTag(u16),
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    #[error("invalid UTF-8 in error message")]
    InvalidUtf8,
    #[error("invalid reply status {0}")]
    InvalidStatus(u16),
    #[error("frame of {0} bytes exceeds the frame size limit")]
    Oversized(usize),
}

pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut out = Vec::new();
    encode_request_into(req, &mut out);
    out
}

pub fn encode_request_into(req: &Request, out: &mut Vec<u8>) {
    push_u16(out, req.tag());
    match req {
        Request::ReadValue { offset, .. } => IoValue {
            offset: *offset,
            value: 0,
        }
        .encode(out),
        Request::WriteValue { offset, value, .. } => IoValue {
            offset: *offset,
            value: *value,
        }
        .encode(out),
        Request::ReadWaveform(io) => io.encode(out),
        Request::AdvanceWaveform => {}
        Request::BulkRead { length } => push_u32(out, *length),
        Request::BulkWrite { data } => {
            push_u32(out, data.len() as u32);
            out.extend_from_slice(data);
        }
    }
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, DecodeError> {
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(DecodeError::Oversized(bytes.len()));
    }
    let mut r = Reader::new(bytes);
    let tag = r.read_u16()?;
    let req = match tag {
        TAG_BULK_READ => Request::BulkRead {
            length: r.read_u32()?,
        },
        TAG_BULK_WRITE => {
            let len = r.read_u32()? as usize;
            Request::BulkWrite {
                data: r.read_bytes(len)?.to_vec(),
            }
        }
        _ => {
            let code = CommandCode::try_from(tag).map_err(|_| DecodeError::UnknownTag(tag))?;
            match code {
                CommandCode::ReadValue8 | CommandCode::ReadValue16 | CommandCode::ReadValue32 => {
                    let io = IoValue::decode(&mut r)?;
                    Request::ReadValue {
                        width: scalar_width(code),
                        offset: io.offset,
                    }
                }
                CommandCode::WriteValue8
                | CommandCode::WriteValue16
                | CommandCode::WriteValue32 => {
                    let io = IoValue::decode(&mut r)?;
                    Request::WriteValue {
                        width: scalar_width(code),
                        offset: io.offset,
                        value: io.value,
                    }
                }
                CommandCode::ReadWaveform => Request::ReadWaveform(IoWaveform::decode(&mut r)?),
                CommandCode::WriteWaveform => Request::AdvanceWaveform,
            }
        }
    };
    r.finish()?;
    Ok(req)
}

fn scalar_width(code: CommandCode) -> Width {
    code.width().unwrap_or(Width::W32)
}

pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut out = Vec::new();
    encode_reply_into(reply, &mut out);
    out
}

pub fn encode_reply_into(reply: &Reply, out: &mut Vec<u8>) {
    match reply {
        Reply::Value { offset, value } => {
            push_u16(out, REPLY_VALUE);
            IoValue {
                offset: *offset,
                value: *value,
            }
            .encode(out);
        }
        Reply::Ack => push_u16(out, REPLY_ACK),
        Reply::Waveform { elapsed_ns, data } => {
            push_u16(out, REPLY_WAVEFORM);
            push_u64(out, *elapsed_ns);
            push_u32(out, data.len() as u32);
            out.extend_from_slice(data);
        }
        Reply::BulkData { data } => {
            push_u16(out, REPLY_BULK_DATA);
            push_u32(out, data.len() as u32);
            out.extend_from_slice(data);
        }
        Reply::BulkWritten { len } => {
            push_u16(out, REPLY_BULK_WRITTEN);
            push_u32(out, *len);
        }
        Reply::Error { status, message } => {
            push_u16(out, REPLY_ERROR);
            push_u16(out, *status as u16);
            let msg = message.as_bytes();
            push_u32(out, msg.len() as u32);
            out.extend_from_slice(msg);
        }
    }
}

pub fn decode_reply(bytes: &[u8]) -> Result<Reply, DecodeError> {
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(DecodeError::Oversized(bytes.len()));
    }
    let mut r = Reader::new(bytes);
    let tag = r.read_u16()?;
    let reply = match tag {
        REPLY_VALUE => {
            let io = IoValue::decode(&mut r)?;
            Reply::Value {
                offset: io.offset,
                value: io.value,
            }
        }
        REPLY_ACK => Reply::Ack,
        REPLY_WAVEFORM => {
            let elapsed_ns = r.read_u64()?;
            let len = r.read_u32()? as usize;
            Reply::Waveform {
                elapsed_ns,
                data: r.read_bytes(len)?.to_vec(),
            }
        }
        REPLY_BULK_DATA => {
            let len = r.read_u32()? as usize;
            Reply::BulkData {
                data: r.read_bytes(len)?.to_vec(),
            }
        }
        REPLY_BULK_WRITTEN => Reply::BulkWritten {
            len: r.read_u32()?,
        },
        REPLY_ERROR => {
            let status = Status::from_u16(r.read_u16()?)?;
            let len = r.read_u32()? as usize;
            let msg = r.read_bytes(len)?;
            let message = core::str::from_utf8(msg).map_err(|_| DecodeError::InvalidUtf8)?;
            Reply::Error {
                status,
                message: message.to_string(),
            }
        }
        _ => return Err(DecodeError::UnknownTag(tag)),
    };
    r.finish()?;
    Ok(reply)
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn finish(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.bytes[start..start + len])
    }
}
