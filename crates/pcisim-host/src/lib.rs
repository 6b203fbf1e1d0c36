//! Host adapters for the PCI simulator.
//!
//! The simulator core knows nothing about transports. This crate provides the pieces a host needs
//! to put it behind one: a wire-request executor, a line-oriented script runner and a TCP frame
//! server. The `pcisim` binary wires them to a command line.

#![forbid(unsafe_code)]

pub mod exec;
pub mod script;
pub mod server;

pub use exec::{execute, handle_frame};
pub use script::{run_script, ScriptError, ScriptSummary};
pub use server::{start_server, ServerConfig, ServerHandle};
