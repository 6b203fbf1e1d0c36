//! Caller-owned memory on the far side of a transfer.
//!
//! A kernel host would back this with `copy_to_user`/`copy_from_user`; an RPC host with a
//! message buffer; tests with a plain `Vec<u8>`. Any of them may fail part way, and that failure
//! must reach the caller as [`crate::DeviceError::TransferFailed`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferFault {
    #[error("caller buffer too small: needed {needed} bytes, {available} available")]
    Short { needed: usize, available: usize },

    #[error("caller memory is not accessible")]
    Inaccessible,
}

pub trait UserBuffer {
    /// Number of bytes the caller made available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `src` (device memory) into the start of the caller's buffer.
    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), TransferFault>;

    /// Fills `dst` (device-side staging) from the start of the caller's buffer.
    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), TransferFault>;
}

fn check_len(needed: usize, available: usize) -> Result<(), TransferFault> {
    if needed > available {
        return Err(TransferFault::Short { needed, available });
    }
    Ok(())
}

impl UserBuffer for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), TransferFault> {
        check_len(src.len(), <[u8]>::len(self))?;
        self[..src.len()].copy_from_slice(src);
        Ok(())
    }

    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), TransferFault> {
        check_len(dst.len(), <[u8]>::len(self))?;
        dst.copy_from_slice(&self[..dst.len()]);
        Ok(())
    }
}

impl<const N: usize> UserBuffer for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), TransferFault> {
        self.as_mut_slice().copy_from_device(src)
    }

    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), TransferFault> {
        self.as_slice().copy_to_device(dst)
    }
}

impl UserBuffer for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), TransferFault> {
        self.as_mut_slice().copy_from_device(src)
    }

    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), TransferFault> {
        self.as_slice().copy_to_device(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_copy_rejects_short_buffers() {
        let mut small = [0u8; 2];
        assert_eq!(
            small.copy_from_device(&[1, 2, 3]),
            Err(TransferFault::Short {
                needed: 3,
                available: 2
            })
        );
        assert_eq!(small, [0, 0]);

        let mut dst = [0u8; 4];
        assert!(vec![9u8; 3].copy_to_device(&mut dst).is_err());
    }

    #[test]
    fn larger_buffers_only_touch_the_prefix() {
        let mut buf = vec![0xEEu8; 4];
        buf.copy_from_device(&[1, 2]).unwrap();
        assert_eq!(buf, vec![1, 2, 0xEE, 0xEE]);

        let mut dst = [0u8; 2];
        buf.copy_to_device(&mut dst).unwrap();
        assert_eq!(dst, [1, 2]);
    }
}
