//! Register space backing store for the simulated PCI peripheral.
//!
//! [`RegisterSpace`] is a flat, fixed-size byte array with bounds-checked typed accessors for the
//! 8/16/32-bit register widths the device exposes. It carries no locking of its own; the owner
//! decides the mutual-exclusion discipline (see `pcisim-device`).

#![forbid(unsafe_code)]

mod scalar;
mod space;

pub use scalar::{Scalar, Width};
pub use space::{RegisterError, RegisterResult, RegisterSpace, DEFAULT_REGISTER_SIZE};
