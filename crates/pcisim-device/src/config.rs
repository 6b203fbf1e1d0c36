use pcisim_mem::DEFAULT_REGISTER_SIZE;
use thiserror::Error;

use crate::WaveformLayout;

pub const DEFAULT_WAVEFORM_OFFSET: u32 = 0x0001_0000;
pub const DEFAULT_WAVEFORM_NUMBER: u32 = 8;
pub const DEFAULT_WAVEFORM_POINT: u32 = 2048;

/// Largest register space still fully addressable by 32-bit offsets.
pub const MAX_REGISTER_SIZE: u64 = 1 << 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("register space size must be non-zero")]
    ZeroRegisterSize,

    #[error("register space size 0x{size:x} exceeds the 32-bit offset range")]
    RegisterSizeTooLarge { size: u64 },

    #[error("waveform region holds no samples ({waveforms} waveforms x {points} points)")]
    EmptyWaveform { waveforms: u32, points: u32 },

    #[error(
        "waveform region 0x{offset:x}+0x{len:x} does not fit in a register space of 0x{size:x} bytes"
    )]
    WaveformOutOfRange { offset: u32, len: u64, size: usize },

    #[error("invalid value for env var {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Static shape of the simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorConfig {
    pub register_size: usize,
    pub waveform: WaveformLayout,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            register_size: DEFAULT_REGISTER_SIZE,
            waveform: WaveformLayout {
                offset: DEFAULT_WAVEFORM_OFFSET,
                waveforms: DEFAULT_WAVEFORM_NUMBER,
                points: DEFAULT_WAVEFORM_POINT,
            },
        }
    }
}

impl SimulatorConfig {
    /// Defaults overridden by `PCISIM_REGISTER_SIZE`, `PCISIM_WAVEFORM_OFFSET`,
    /// `PCISIM_WAVEFORM_NUMBER` and `PCISIM_WAVEFORM_POINT`. Values are decimal or `0x` hex.
    ///
    /// The result is not validated; [`crate::PciSimulator::new`] does that.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`SimulatorConfig::from_env`] with a caller-supplied variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(size) = env_u64(&lookup, "PCISIM_REGISTER_SIZE")? {
            cfg.register_size = usize::try_from(size)
                .map_err(|_| ConfigError::RegisterSizeTooLarge { size })?;
        }
        if let Some(offset) = env_u32(&lookup, "PCISIM_WAVEFORM_OFFSET")? {
            cfg.waveform.offset = offset;
        }
        if let Some(waveforms) = env_u32(&lookup, "PCISIM_WAVEFORM_NUMBER")? {
            cfg.waveform.waveforms = waveforms;
        }
        if let Some(points) = env_u32(&lookup, "PCISIM_WAVEFORM_POINT")? {
            cfg.waveform.points = points;
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.register_size == 0 {
            return Err(ConfigError::ZeroRegisterSize);
        }
        if self.register_size as u64 > MAX_REGISTER_SIZE {
            return Err(ConfigError::RegisterSizeTooLarge {
                size: self.register_size as u64,
            });
        }

        let WaveformLayout {
            offset,
            waveforms,
            points,
        } = self.waveform;
        if self.waveform.sample_count() == 0 {
            return Err(ConfigError::EmptyWaveform { waveforms, points });
        }
        let len = self.waveform.byte_len();
        let end = u64::from(offset) + len;
        if end > self.register_size as u64 {
            return Err(ConfigError::WaveformOutOfRange {
                offset,
                len,
                size: self.register_size,
            });
        }
        Ok(())
    }
}

/// Parses `123` or `0x7b`.
pub fn parse_number(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn env_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    parse_number(&value)
        .map(Some)
        .ok_or(ConfigError::InvalidEnv { var, value })
}

fn env_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u32>, ConfigError> {
    let Some(value) = env_u64(lookup, var)? else {
        return Ok(None);
    };
    u32::try_from(value).map(Some).map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
