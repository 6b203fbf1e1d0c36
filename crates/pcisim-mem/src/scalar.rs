use core::fmt;

/// Access width of a scalar register operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
}

impl Width {
    pub const ALL: [Width; 3] = [Width::W8, Width::W16, Width::W32];

    pub const fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
        }
    }

    pub const fn bits(self) -> u32 {
        (self.bytes() as u32) * 8
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Width::W8),
            16 => Some(Width::W16),
            32 => Some(Width::W32),
            _ => None,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A register value tagged with its width.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    U8(u8),
    U16(u16),
    U32(u32),
}

impl Scalar {
    /// Narrows `value` to `width`, keeping the low-order bits.
    pub fn truncating(width: Width, value: u32) -> Self {
        match width {
            Width::W8 => Scalar::U8(value as u8),
            Width::W16 => Scalar::U16(value as u16),
            Width::W32 => Scalar::U32(value),
        }
    }

    pub fn width(self) -> Width {
        match self {
            Scalar::U8(_) => Width::W8,
            Scalar::U16(_) => Width::W16,
            Scalar::U32(_) => Width::W32,
        }
    }

    /// Zero-extended value.
    pub fn as_u32(self) -> u32 {
        match self {
            Scalar::U8(v) => u32::from(v),
            Scalar::U16(v) => u32::from(v),
            Scalar::U32(v) => v,
        }
    }
}

impl From<u8> for Scalar {
    fn from(v: u8) -> Self {
        Scalar::U8(v)
    }
}

impl From<u16> for Scalar {
    fn from(v: u16) -> Self {
        Scalar::U16(v)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::U32(v)
    }
}

/// Formats the value as zero-padded hex sized to its width (`0xAB`, `0xABCD`, `0xABCDEF01`).
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::U8(v) => write!(f, "0x{v:02X}"),
            Scalar::U16(v) => write!(f, "0x{v:04X}"),
            Scalar::U32(v) => write!(f, "0x{v:08X}"),
        }
    }
}
