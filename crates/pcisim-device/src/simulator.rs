use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use pcisim_mem::RegisterSpace;

use crate::waveform::{self, WaveformState};
use crate::{Command, DeviceResult, Response, SimulatorConfig, UserBuffer};

/// The simulated peripheral.
///
/// All register bytes sit behind a single mutex. Each dispatched command and each bulk transfer
/// holds it for its full duration, so concurrent callers never observe a torn multi-byte value.
/// `PciSimulator` is `Sync`; share it between threads with an `Arc`.
pub struct PciSimulator {
    config: SimulatorConfig,
    regs: Mutex<RegisterSpace>,
}

impl PciSimulator {
    /// Validates `config` and allocates a zeroed register space.
    pub fn new(config: SimulatorConfig) -> DeviceResult<Self> {
        config.validate()?;
        tracing::debug!(
            register_size = config.register_size,
            waveform_offset = config.waveform.offset,
            waveforms = config.waveform.waveforms,
            points = config.waveform.points,
            "pci simulator created"
        );
        Ok(Self {
            regs: Mutex::new(RegisterSpace::new(config.register_size)),
            config,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, RegisterSpace> {
        // Register bytes are valid in any state, so a panicked holder leaves nothing to repair.
        self.regs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` with exclusive access to the register space.
    ///
    /// Intended for hosts and tests that need to inspect or prepare state atomically.
    pub fn with_registers<R>(&self, f: impl FnOnce(&mut RegisterSpace) -> R) -> R {
        f(&mut self.lock())
    }

    /// Current waveform state, derived from the sentinel sample.
    pub fn waveform_state(&self) -> DeviceResult<WaveformState> {
        Ok(waveform::state(&self.lock(), &self.config.waveform)?)
    }

    /// Decodes the waveform region into samples.
    pub fn waveform_samples(&self) -> DeviceResult<Vec<u16>> {
        Ok(waveform::samples(&self.lock(), &self.config.waveform)?)
    }

    /// Executes one addressed command.
    ///
    /// Errors are returned to the caller and never leave partial register updates behind.
    pub fn dispatch(&self, command: Command<'_>) -> DeviceResult<Response> {
        let code = command.code();
        let result = self.dispatch_locked(command);
        if let Err(err) = &result {
            tracing::debug!(command = %code, error = %err, "command failed");
        }
        result
    }

    fn dispatch_locked(&self, command: Command<'_>) -> DeviceResult<Response> {
        let mut regs = self.lock();
        match command {
            Command::ReadScalar { width, offset } => {
                let value = regs.read(offset, width)?;
                tracing::trace!(
                    "RD_VALUE_{width}    addr = 0x{offset:08X}    data = {value}"
                );
                Ok(Response::Scalar { offset, value })
            }
            Command::WriteScalar { offset, value } => {
                regs.write(offset, value)?;
                tracing::trace!(
                    "WR_VALUE_{}    addr = 0x{offset:08X}    data = {value}",
                    value.width()
                );
                Ok(Response::Written)
            }
            Command::ReadWaveformBulk {
                offset,
                length,
                buffer,
            } => {
                let src = regs.slice(offset, length as usize)?;
                let start = Instant::now();
                buffer.copy_from_device(src)?;
                let elapsed = start.elapsed();
                tracing::debug!(
                    offset,
                    length,
                    elapsed_ns = elapsed.as_nanos() as u64,
                    "RD_WAVEFORM"
                );
                Ok(Response::WaveformRead { length, elapsed })
            }
            Command::AdvanceWaveform => {
                let transition = waveform::advance(&mut regs, &self.config.waveform)?;
                Ok(Response::WaveformAdvanced(transition))
            }
        }
    }

    /// Copies `length` bytes from register offset 0 into `dst`.
    ///
    /// This is the plain `read()` path: it always starts at offset 0, whatever position the
    /// caller may track. Returns the number of bytes copied.
    pub fn bulk_read<B>(&self, dst: &mut B, length: usize) -> DeviceResult<usize>
    where
        B: UserBuffer + ?Sized,
    {
        let regs = self.lock();
        let result: DeviceResult<()> = regs
            .slice(0, length)
            .map_err(Into::into)
            .and_then(|src| dst.copy_from_device(src).map_err(Into::into));
        drop(regs);

        match result {
            Ok(()) => {
                tracing::trace!(length, "bulk read");
                Ok(length)
            }
            Err(err) => {
                tracing::debug!(length, error = %err, "bulk read failed");
                Err(err)
            }
        }
    }

    /// Copies all of `src` into the register space starting at offset 0.
    ///
    /// Caller memory is staged before the lock is taken, so a failed copy leaves the registers
    /// untouched. Returns the number of bytes written.
    pub fn bulk_write<B>(&self, src: &B) -> DeviceResult<usize>
    where
        B: UserBuffer + ?Sized,
    {
        let length = src.len();
        let result = self.bulk_write_inner(src, length);
        match result {
            Ok(()) => {
                tracing::trace!(length, "bulk write");
                Ok(length)
            }
            Err(err) => {
                tracing::debug!(length, error = %err, "bulk write failed");
                Err(err)
            }
        }
    }

    fn bulk_write_inner<B>(&self, src: &B, length: usize) -> DeviceResult<()>
    where
        B: UserBuffer + ?Sized,
    {
        // Reject oversized writes before touching caller memory.
        self.lock().slice(0, length)?;

        let mut staging = vec![0u8; length];
        src.copy_to_device(&mut staging)?;
        self.lock().write_bytes(0, &staging)?;
        Ok(())
    }

    /// Re-zeroes the whole register space, including the waveform region.
    pub fn reset(&self) {
        self.lock().clear();
        tracing::debug!("register space reset");
    }
}

impl std::fmt::Debug for PciSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PciSimulator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
