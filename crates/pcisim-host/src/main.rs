#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pcisim_device::config::parse_number;
use pcisim_device::{PciSimulator, SimulatorConfig};
use pcisim_host::{run_script, start_server, ServerConfig};
use pcisim_protocol::MAX_FRAME_BYTES;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Simulated PCI peripheral with a register space and waveform generator")]
struct Cli {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(subcommand)]
    command: Mode,
}

/// Device shape. Each flag overrides the matching `PCISIM_*` environment variable.
#[derive(Debug, Args)]
struct DeviceArgs {
    /// Register space size in bytes.
    #[arg(long, global = true, value_parser = parse_u64)]
    register_size: Option<u64>,

    /// Byte offset of the first waveform sample.
    #[arg(long, global = true, value_parser = parse_u32)]
    waveform_offset: Option<u32>,

    /// Number of waveforms.
    #[arg(long, global = true, value_parser = parse_u32)]
    waveform_number: Option<u32>,

    /// Samples per waveform.
    #[arg(long, global = true, value_parser = parse_u32)]
    waveform_point: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run a command script from FILE (or stdin) and print one report per command.
    Script { file: Option<PathBuf> },

    /// Serve length-prefixed request frames over TCP until interrupted.
    Serve {
        #[arg(long, default_value = "127.0.0.1:7420")]
        bind: SocketAddr,

        #[arg(long, default_value_t = MAX_FRAME_BYTES)]
        max_frame_bytes: usize,
    },
}

fn parse_u64(s: &str) -> Result<u64, String> {
    parse_number(s).ok_or_else(|| format!("invalid number {s:?}"))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    parse_u64(s).and_then(|v| u32::try_from(v).map_err(|_| format!("{s:?} does not fit in 32 bits")))
}

impl DeviceArgs {
    fn config(&self) -> Result<SimulatorConfig> {
        let mut cfg = SimulatorConfig::from_env().context("reading PCISIM_* environment")?;
        if let Some(size) = self.register_size {
            cfg.register_size =
                usize::try_from(size).with_context(|| format!("register size {size} too large"))?;
        }
        if let Some(offset) = self.waveform_offset {
            cfg.waveform.offset = offset;
        }
        if let Some(waveforms) = self.waveform_number {
            cfg.waveform.waveforms = waveforms;
        }
        if let Some(points) = self.waveform_point {
            cfg.waveform.points = points;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = cli.device.config()?;
    let sim = PciSimulator::new(cfg).context("invalid device configuration")?;
    tracing::info!(
        register_size = cfg.register_size,
        waveform_offset = cfg.waveform.offset,
        waveforms = cfg.waveform.waveforms,
        points = cfg.waveform.points,
        "device initialized"
    );

    match cli.command {
        Mode::Script { file } => script(&sim, file),
        Mode::Serve {
            bind,
            max_frame_bytes,
        } => serve(
            sim,
            ServerConfig {
                bind_addr: bind,
                max_frame_bytes,
            },
        ),
    }
}

fn script(sim: &PciSimulator, file: Option<PathBuf>) -> Result<()> {
    let input: Box<dyn BufRead> = match &file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let mut out = io::stdout().lock();
    let summary = run_script(sim, input, &mut out)?;
    eprintln!(
        "{} command(s), {} failure(s)",
        summary.commands, summary.failures
    );
    if summary.failures > 0 {
        bail!("{} command(s) failed", summary.failures);
    }
    Ok(())
}

fn serve(sim: PciSimulator, cfg: ServerConfig) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async move {
        let handle = start_server(cfg.clone(), Arc::new(sim))
            .await
            .with_context(|| format!("bind {}", cfg.bind_addr))?;
        tracing::info!("pcisim listening on {}", handle.local_addr());

        tokio::signal::ctrl_c()
            .await
            .context("waiting for ctrl-c")?;

        tracing::info!("shutdown signal received");
        handle.shutdown().await;
        Ok::<_, anyhow::Error>(())
    })
}
