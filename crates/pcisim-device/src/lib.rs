//! Simulated PCI peripheral: command dispatch, waveform generation and the bulk transfer path.
//!
//! The whole device state is one [`pcisim_mem::RegisterSpace`] owned by a [`PciSimulator`].
//! Callers talk to it through [`PciSimulator::dispatch`] (addressed, ioctl-style commands) or
//! [`PciSimulator::bulk_read`] / [`PciSimulator::bulk_write`] (whole-buffer copies at offset 0).
//! How those calls reach the simulator (character device, RPC, direct call) is up to the host.

#![forbid(unsafe_code)]

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod simulator;
pub mod waveform;

pub use buffer::{TransferFault, UserBuffer};
pub use command::{Command, CommandCode, Response};
pub use config::{ConfigError, SimulatorConfig};
pub use error::{DeviceError, DeviceResult};
pub use simulator::PciSimulator;
pub use waveform::{WaveformLayout, WaveformState, WaveformTransition};

pub use pcisim_mem::{RegisterSpace, Scalar, Width};
