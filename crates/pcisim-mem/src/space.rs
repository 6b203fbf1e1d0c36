use std::ops::Range;

use thiserror::Error;

use crate::{Scalar, Width};

/// Default register space size (1 MiB).
pub const DEFAULT_REGISTER_SIZE: usize = 0x0010_0000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// `offset + len` lies past the end of the register space.
    #[error("register access out of range: offset=0x{offset:x} len={len} size=0x{size:x}")]
    OutOfRange { offset: u32, len: usize, size: usize },
}

pub type RegisterResult<T> = Result<T, RegisterError>;

/// Byte-addressable register file of a fixed length.
///
/// Typed accesses use the host's native byte order and may be unaligned. Every access is bounds
/// checked up front, so a failing access never touches the backing bytes.
#[derive(Clone)]
pub struct RegisterSpace {
    bytes: Box<[u8]>,
}

impl RegisterSpace {
    /// Allocates a zero-filled register space of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Re-zeroes every register.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn range(&self, offset: u32, len: usize) -> RegisterResult<Range<usize>> {
        let size = self.bytes.len();
        let err = RegisterError::OutOfRange { offset, len, size };
        let start = usize::try_from(offset).map_err(|_| err.clone())?;
        let end = start.checked_add(len).ok_or_else(|| err.clone())?;
        if end > size {
            return Err(err);
        }
        Ok(start..end)
    }

    pub fn slice(&self, offset: u32, len: usize) -> RegisterResult<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, offset: u32, len: usize) -> RegisterResult<&mut [u8]> {
        let range = self.range(offset, len)?;
        Ok(&mut self.bytes[range])
    }

    pub fn read_bytes(&self, offset: u32, dst: &mut [u8]) -> RegisterResult<()> {
        dst.copy_from_slice(self.slice(offset, dst.len())?);
        Ok(())
    }

    pub fn write_bytes(&mut self, offset: u32, src: &[u8]) -> RegisterResult<()> {
        self.slice_mut(offset, src.len())?.copy_from_slice(src);
        Ok(())
    }

    pub fn read_u8(&self, offset: u32) -> RegisterResult<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(offset, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&self, offset: u32) -> RegisterResult<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(offset, &mut buf)?;
        Ok(u16::from_ne_bytes(buf))
    }

    pub fn read_u32(&self, offset: u32) -> RegisterResult<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(offset, &mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    pub fn write_u8(&mut self, offset: u32, value: u8) -> RegisterResult<()> {
        self.write_bytes(offset, &[value])
    }

    pub fn write_u16(&mut self, offset: u32, value: u16) -> RegisterResult<()> {
        self.write_bytes(offset, &value.to_ne_bytes())
    }

    pub fn write_u32(&mut self, offset: u32, value: u32) -> RegisterResult<()> {
        self.write_bytes(offset, &value.to_ne_bytes())
    }

    /// Reads a register of the given width.
    pub fn read(&self, offset: u32, width: Width) -> RegisterResult<Scalar> {
        Ok(match width {
            Width::W8 => Scalar::U8(self.read_u8(offset)?),
            Width::W16 => Scalar::U16(self.read_u16(offset)?),
            Width::W32 => Scalar::U32(self.read_u32(offset)?),
        })
    }

    /// Writes a register; the access width is taken from the value.
    pub fn write(&mut self, offset: u32, value: Scalar) -> RegisterResult<()> {
        match value {
            Scalar::U8(v) => self.write_u8(offset, v),
            Scalar::U16(v) => self.write_u16(offset, v),
            Scalar::U32(v) => self.write_u32(offset, v),
        }
    }
}

impl Default for RegisterSpace {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTER_SIZE)
    }
}

impl std::fmt::Debug for RegisterSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterSpace")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
