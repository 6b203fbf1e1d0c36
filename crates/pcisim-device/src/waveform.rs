//! Synthetic multi-channel waveform living inside the register space.
//!
//! The region holds `waveforms * points` 16-bit samples (native byte order) starting at
//! [`WaveformLayout::offset`]. Its state is never stored separately: the first sample doubles as
//! a sentinel, zero meaning "not seeded yet". Writing zero to that sample through a scalar command
//! therefore makes the next [`advance`] re-seed the whole region.

use pcisim_mem::{RegisterResult, RegisterSpace};

pub const SAMPLE_BYTES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformLayout {
    /// Byte offset of sample 0 in the register space.
    pub offset: u32,
    /// Number of waveforms (channels).
    pub waveforms: u32,
    /// Samples per waveform.
    pub points: u32,
}

impl WaveformLayout {
    pub fn sample_count(&self) -> u64 {
        u64::from(self.waveforms) * u64::from(self.points)
    }

    pub fn byte_len(&self) -> u64 {
        self.sample_count() * SAMPLE_BYTES as u64
    }

    /// Byte offset of `index` within the register space.
    pub fn sample_offset(&self, index: u32) -> Option<u32> {
        if u64::from(index) >= self.sample_count() {
            return None;
        }
        index
            .checked_mul(SAMPLE_BYTES as u32)
            .and_then(|rel| self.offset.checked_add(rel))
    }

    fn region<'a>(&self, regs: &'a RegisterSpace) -> RegisterResult<&'a [u8]> {
        regs.slice(self.offset, self.byte_len() as usize)
    }

    fn region_mut<'a>(&self, regs: &'a mut RegisterSpace) -> RegisterResult<&'a mut [u8]> {
        regs.slice_mut(self.offset, self.byte_len() as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformState {
    Uninitialized,
    Initialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformTransition {
    /// Region was uninitialized and has been filled with `1, 2, 3, ...`.
    Seeded,
    /// Every sample was incremented by one (wrapping).
    Advanced,
}

/// Derives the region state from the sentinel sample.
pub fn state(regs: &RegisterSpace, layout: &WaveformLayout) -> RegisterResult<WaveformState> {
    Ok(if regs.read_u16(layout.offset)? == 0 {
        WaveformState::Uninitialized
    } else {
        WaveformState::Initialized
    })
}

/// Moves the waveform one step forward.
///
/// Uninitialized regions get `sample[i] = i + 1` (truncated to 16 bits); initialized ones get
/// `sample[i] += 1` with wraparound at 65535.
pub fn advance(
    regs: &mut RegisterSpace,
    layout: &WaveformLayout,
) -> RegisterResult<WaveformTransition> {
    let transition = match state(regs, layout)? {
        WaveformState::Uninitialized => WaveformTransition::Seeded,
        WaveformState::Initialized => WaveformTransition::Advanced,
    };

    let region = layout.region_mut(regs)?;
    for (i, sample) in region.chunks_exact_mut(SAMPLE_BYTES).enumerate() {
        let next = match transition {
            WaveformTransition::Seeded => (i as u16).wrapping_add(1),
            WaveformTransition::Advanced => {
                u16::from_ne_bytes([sample[0], sample[1]]).wrapping_add(1)
            }
        };
        sample.copy_from_slice(&next.to_ne_bytes());
    }

    tracing::trace!(
        offset = layout.offset,
        samples = layout.sample_count(),
        ?transition,
        "waveform stepped"
    );
    Ok(transition)
}

/// Decodes the whole region into samples.
pub fn samples(regs: &RegisterSpace, layout: &WaveformLayout) -> RegisterResult<Vec<u16>> {
    Ok(layout
        .region(regs)?
        .chunks_exact(SAMPLE_BYTES)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: WaveformLayout = WaveformLayout {
        offset: 0x40,
        waveforms: 2,
        points: 4,
    };

    #[test]
    fn layout_geometry() {
        assert_eq!(LAYOUT.sample_count(), 8);
        assert_eq!(LAYOUT.byte_len(), 16);
        assert_eq!(LAYOUT.sample_offset(0), Some(0x40));
        assert_eq!(LAYOUT.sample_offset(7), Some(0x4E));
        assert_eq!(LAYOUT.sample_offset(8), None);
    }

    #[test]
    fn seed_then_advance() {
        let mut regs = RegisterSpace::new(0x100);
        assert_eq!(state(&regs, &LAYOUT).unwrap(), WaveformState::Uninitialized);

        assert_eq!(advance(&mut regs, &LAYOUT).unwrap(), WaveformTransition::Seeded);
        assert_eq!(state(&regs, &LAYOUT).unwrap(), WaveformState::Initialized);
        assert_eq!(samples(&regs, &LAYOUT).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(advance(&mut regs, &LAYOUT).unwrap(), WaveformTransition::Advanced);
        assert_eq!(samples(&regs, &LAYOUT).unwrap(), vec![2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn bytes_outside_the_region_are_untouched() {
        let mut regs = RegisterSpace::new(0x100);
        regs.write_u8(0x3F, 0x11).unwrap();
        regs.write_u8(0x50, 0x22).unwrap();
        advance(&mut regs, &LAYOUT).unwrap();
        assert_eq!(regs.read_u8(0x3F).unwrap(), 0x11);
        assert_eq!(regs.read_u8(0x50).unwrap(), 0x22);
    }

    #[test]
    fn region_past_the_end_is_reported() {
        let mut regs = RegisterSpace::new(0x44);
        assert!(advance(&mut regs, &LAYOUT).is_err());
        assert!(regs.slice(0, 0x44).unwrap().iter().all(|b| *b == 0));
    }
}
