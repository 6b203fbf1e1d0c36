use pcisim_device::{Command, DeviceError, DeviceResult, PciSimulator, Response, Scalar};
use pcisim_protocol::{decode_request, encode_reply, DecodeError, Reply, Request, Status};

/// Runs one wire request against the simulator. Device errors become [`Reply::Error`].
pub fn execute(sim: &PciSimulator, req: Request) -> Reply {
    match run(sim, req) {
        Ok(reply) => reply,
        Err(err) => error_reply(&err),
    }
}

/// Decodes a request frame, executes it and returns the encoded reply frame.
///
/// Frames with an unrecognized tag are answered with [`Status::UnknownCommand`] and change
/// nothing; any other decode failure yields [`Status::Malformed`].
pub fn handle_frame(sim: &PciSimulator, frame: &[u8]) -> Vec<u8> {
    let reply = match decode_request(frame) {
        Ok(req) => execute(sim, req),
        Err(DecodeError::UnknownTag(tag)) => {
            tracing::debug!("unknown command 0x{tag:04x}");
            error_reply(&DeviceError::UnknownCommand(tag))
        }
        Err(err) => {
            tracing::debug!(error = %err, "malformed request frame");
            Reply::error(Status::Malformed, err.to_string())
        }
    };
    encode_reply(&reply)
}

fn error_reply(err: &DeviceError) -> Reply {
    Reply::error(Status::from(err), err.to_string())
}

fn mismatch(resp: Response) -> Reply {
    Reply::error(Status::Internal, format!("unexpected device response {resp:?}"))
}

/// Buffer for a device-to-caller copy. Requests larger than the register space are going to fail
/// the bounds check anyway, so they do not get to size the allocation.
fn reply_buffer(sim: &PciSimulator, length: u32) -> Vec<u8> {
    vec![0u8; (length as usize).min(sim.config().register_size)]
}

fn run(sim: &PciSimulator, req: Request) -> DeviceResult<Reply> {
    Ok(match req {
        Request::ReadValue { width, offset } => {
            match sim.dispatch(Command::ReadScalar { width, offset })? {
                Response::Scalar { offset, value } => Reply::Value {
                    offset,
                    value: value.as_u32(),
                },
                other => mismatch(other),
            }
        }
        Request::WriteValue {
            width,
            offset,
            value,
        } => {
            sim.dispatch(Command::WriteScalar {
                offset,
                value: Scalar::truncating(width, value),
            })?;
            Reply::Ack
        }
        Request::ReadWaveform(io) => {
            let mut data = reply_buffer(sim, io.length);
            match sim.dispatch(Command::ReadWaveformBulk {
                offset: io.offset,
                length: io.length,
                buffer: &mut data,
            })? {
                Response::WaveformRead { length, elapsed } => {
                    data.truncate(length as usize);
                    Reply::Waveform {
                        elapsed_ns: u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
                        data,
                    }
                }
                other => mismatch(other),
            }
        }
        Request::AdvanceWaveform => {
            sim.dispatch(Command::AdvanceWaveform)?;
            Reply::Ack
        }
        Request::BulkRead { length } => {
            let mut data = reply_buffer(sim, length);
            let copied = sim.bulk_read(&mut data, length as usize)?;
            data.truncate(copied);
            Reply::BulkData { data }
        }
        Request::BulkWrite { data } => {
            let written = sim.bulk_write(&data)?;
            Reply::BulkWritten {
                len: written as u32,
            }
        }
    })
}
