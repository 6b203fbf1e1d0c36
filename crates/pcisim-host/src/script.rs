//! Line-oriented command scripts.
//!
//! ```text
//! # comments and blank lines are ignored
//! wr32 0x100 0xdeadbeef
//! rd32 0x100
//! advance
//! rdwave 0x10000 16
//! bulkwr aa bb cc dd
//! bulkrd 4
//! reset
//! ```
//!
//! Numbers are decimal or `0x` hex. Device errors are printed and the script keeps going; a line
//! that does not parse aborts the run.

use std::io::{BufRead, Write};

use pcisim_device::config::parse_number;
use pcisim_device::{CommandCode, PciSimulator, Scalar, Width};
use pcisim_protocol::{IoWaveform, Reply, Request};
use thiserror::Error;

use crate::execute;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub commands: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Request(Request),
    Reset,
}

/// Parses one script line. Blank lines and comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>, String> {
    let line = line.split('#').next().unwrap_or("").trim();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "rd8" | "rd16" | "rd32" => {
            let [offset] = expect_args::<1>(verb, &args)?;
            ScriptCommand::Request(Request::ReadValue {
                width: width_suffix(verb)?,
                offset: number_u32(offset)?,
            })
        }
        "wr8" | "wr16" | "wr32" => {
            let [offset, value] = expect_args::<2>(verb, &args)?;
            let width = width_suffix(verb)?;
            let value = number_u32(value)?;
            if Scalar::truncating(width, value).as_u32() != value {
                return Err(format!("value {value:#x} does not fit in {width} bits"));
            }
            ScriptCommand::Request(Request::WriteValue {
                width,
                offset: number_u32(offset)?,
                value,
            })
        }
        "rdwave" => {
            let [offset, length] = expect_args::<2>(verb, &args)?;
            ScriptCommand::Request(Request::ReadWaveform(IoWaveform {
                offset: number_u32(offset)?,
                length: number_u32(length)?,
            }))
        }
        "advance" => {
            expect_args::<0>(verb, &args)?;
            ScriptCommand::Request(Request::AdvanceWaveform)
        }
        "bulkrd" => {
            let [length] = expect_args::<1>(verb, &args)?;
            ScriptCommand::Request(Request::BulkRead {
                length: number_u32(length)?,
            })
        }
        "bulkwr" => {
            if args.is_empty() {
                return Err("bulkwr expects at least one byte".into());
            }
            let data = args
                .iter()
                .map(|b| u8::from_str_radix(b, 16).map_err(|_| format!("invalid hex byte {b:?}")))
                .collect::<Result<Vec<u8>, _>>()?;
            ScriptCommand::Request(Request::BulkWrite { data })
        }
        "reset" => {
            expect_args::<0>(verb, &args)?;
            ScriptCommand::Reset
        }
        _ => return Err(format!("unknown command {verb:?}")),
    };
    Ok(Some(cmd))
}

fn expect_args<'a, const N: usize>(verb: &str, args: &[&'a str]) -> Result<[&'a str; N], String> {
    <[&str; N]>::try_from(args)
        .map_err(|_| format!("{verb} expects {N} argument(s), got {}", args.len()))
}

fn width_suffix(verb: &str) -> Result<Width, String> {
    let bits = verb
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<u32>()
        .map_err(|_| format!("bad width in {verb:?}"))?;
    Width::from_bits(bits).ok_or_else(|| format!("bad width in {verb:?}"))
}

fn number_u32(s: &str) -> Result<u32, String> {
    parse_number(s)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("invalid 32-bit number {s:?}"))
}

/// Executes every command in `input` against `sim`, writing one report per command to `out`.
pub fn run_script<R, W>(sim: &PciSimulator, input: R, out: &mut W) -> Result<ScriptSummary, ScriptError>
where
    R: BufRead,
    W: Write,
{
    let mut summary = ScriptSummary::default();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let cmd = parse_line(&line).map_err(|message| ScriptError::Parse {
            line: idx + 1,
            message,
        })?;
        let Some(cmd) = cmd else {
            continue;
        };

        summary.commands += 1;
        match cmd {
            ScriptCommand::Reset => {
                sim.reset();
                writeln!(out, "RESET")?;
            }
            ScriptCommand::Request(req) => {
                let reply = execute(sim, req.clone());
                if matches!(reply, Reply::Error { .. }) {
                    summary.failures += 1;
                }
                report(out, &req, &reply)?;
            }
        }
    }
    Ok(summary)
}

fn report<W: Write>(out: &mut W, req: &Request, reply: &Reply) -> std::io::Result<()> {
    match (req, reply) {
        (_, Reply::Error { status, message }) => {
            writeln!(out, "error: {status:?}: {message}")
        }
        (Request::ReadValue { width, .. }, Reply::Value { offset, value }) => writeln!(
            out,
            "{}    addr = 0x{offset:08X}    data = {}",
            CommandCode::read_value(*width),
            Scalar::truncating(*width, *value)
        ),
        (
            Request::WriteValue {
                width,
                offset,
                value,
            },
            _,
        ) => writeln!(
            out,
            "{}    addr = 0x{offset:08X}    data = {}",
            CommandCode::write_value(*width),
            Scalar::truncating(*width, *value)
        ),
        (Request::ReadWaveform(io), Reply::Waveform { elapsed_ns, data }) => {
            writeln!(
                out,
                "RD_WAVEFORM    addr = 0x{:08X}    length = {}    elapsed = {elapsed_ns}ns",
                io.offset,
                data.len()
            )?;
            hexdump(out, io.offset, data)
        }
        (Request::AdvanceWaveform, _) => writeln!(out, "WR_WAVEFORM"),
        (Request::BulkRead { .. }, Reply::BulkData { data }) => {
            writeln!(out, "READ    length = {}", data.len())?;
            hexdump(out, 0, data)
        }
        (Request::BulkWrite { .. }, Reply::BulkWritten { len }) => {
            writeln!(out, "WRITE    length = {len}")
        }
        (_, other) => writeln!(out, "{other:?}"),
    }
}

fn hexdump<W: Write>(out: &mut W, base: u32, data: &[u8]) -> std::io::Result<()> {
    for (row, chunk) in data.chunks(16).enumerate() {
        let addr = u64::from(base) + (row as u64) * 16;
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        writeln!(out, "  {addr:08x}: {}", bytes.join(" "))?;
    }
    Ok(())
}
