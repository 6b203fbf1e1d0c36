use pcisim_device::{
    Command, CommandCode, DeviceError, PciSimulator, Response, Scalar, SimulatorConfig,
    TransferFault, WaveformLayout, Width,
};

fn small_sim() -> PciSimulator {
    PciSimulator::new(SimulatorConfig {
        register_size: 1024,
        waveform: WaveformLayout {
            offset: 0x200,
            waveforms: 2,
            points: 8,
        },
    })
    .unwrap()
}

fn read(sim: &PciSimulator, width: Width, offset: u32) -> Result<Scalar, DeviceError> {
    match sim.dispatch(Command::ReadScalar { width, offset })? {
        Response::Scalar { offset: got, value } => {
            assert_eq!(got, offset);
            Ok(value)
        }
        other => panic!("unexpected response {other:?}"),
    }
}

fn write(sim: &PciSimulator, offset: u32, value: impl Into<Scalar>) -> Result<(), DeviceError> {
    let resp = sim.dispatch(Command::WriteScalar {
        offset,
        value: value.into(),
    })?;
    assert_eq!(resp, Response::Written);
    Ok(())
}

#[test]
fn scalar_write_then_read_at_each_width() {
    let sim = small_sim();
    write(&sim, 100, 0xDEAD_BEEFu32).unwrap();
    assert_eq!(read(&sim, Width::W32, 100).unwrap(), Scalar::U32(0xDEAD_BEEF));

    write(&sim, 10, 0xABCDu16).unwrap();
    assert_eq!(read(&sim, Width::W16, 10).unwrap(), Scalar::U16(0xABCD));

    write(&sim, 3, 0x7Fu8).unwrap();
    assert_eq!(read(&sim, Width::W8, 3).unwrap(), Scalar::U8(0x7F));
}

#[test]
fn last_register_fits_one_past_does_not() {
    let sim = small_sim();
    write(&sim, 1020, 0x0102_0304u32).unwrap();
    assert_eq!(read(&sim, Width::W32, 1020).unwrap(), Scalar::U32(0x0102_0304));

    assert_eq!(
        read(&sim, Width::W32, 1021),
        Err(DeviceError::OutOfRange {
            offset: 1021,
            len: 4,
            size: 1024
        })
    );
    assert_eq!(
        read(&sim, Width::W8, 1023).unwrap(),
        Scalar::U8(0x0102_0304u32.to_ne_bytes()[3])
    );
}

#[test]
fn out_of_range_write_is_rejected_and_harmless() {
    let sim = small_sim();
    sim.with_registers(|regs| regs.write_bytes(1016, &[0x11; 8]).unwrap());

    assert!(matches!(
        write(&sim, 1022, 0xFFFF_FFFFu32),
        Err(DeviceError::OutOfRange { .. })
    ));
    assert!(matches!(
        write(&sim, u32::MAX, 0u8),
        Err(DeviceError::OutOfRange { .. })
    ));

    sim.with_registers(|regs| {
        assert_eq!(regs.slice(1016, 8).unwrap(), &[0x11; 8]);
    });
}

#[test]
fn waveform_bulk_read_copies_requested_range() {
    let sim = small_sim();
    sim.with_registers(|regs| {
        for i in 0..16u8 {
            regs.write_u8(0x300 + u32::from(i), i).unwrap();
        }
    });

    let mut buf = vec![0u8; 16];
    let resp = sim
        .dispatch(Command::ReadWaveformBulk {
            offset: 0x304,
            length: 8,
            buffer: &mut buf,
        })
        .unwrap();
    assert!(matches!(resp, Response::WaveformRead { length: 8, .. }));
    assert_eq!(&buf[..8], &[4, 5, 6, 7, 8, 9, 10, 11]);
    assert_eq!(&buf[8..], &[0; 8]);
}

#[test]
fn waveform_bulk_read_past_end_fails() {
    let sim = small_sim();
    let mut buf = vec![0xEEu8; 64];
    let err = sim
        .dispatch(Command::ReadWaveformBulk {
            offset: 1000,
            length: 64,
            buffer: &mut buf,
        })
        .unwrap_err();
    assert_eq!(
        err,
        DeviceError::OutOfRange {
            offset: 1000,
            len: 64,
            size: 1024
        }
    );
    assert!(buf.iter().all(|b| *b == 0xEE));
}

#[test]
fn waveform_bulk_read_into_short_buffer_is_a_transfer_failure() {
    let sim = small_sim();
    let mut buf = [0u8; 4];
    let err = sim
        .dispatch(Command::ReadWaveformBulk {
            offset: 0,
            length: 16,
            buffer: &mut buf,
        })
        .unwrap_err();
    assert_eq!(
        err,
        DeviceError::TransferFailed(TransferFault::Short {
            needed: 16,
            available: 4
        })
    );
}

#[test]
fn unknown_command_codes_are_rejected() {
    assert_eq!(
        CommandCode::try_from(0x09),
        Err(DeviceError::UnknownCommand(0x09))
    );
    assert_eq!(
        CommandCode::try_from(0xFFFF),
        Err(DeviceError::UnknownCommand(0xFFFF))
    );
    assert!(DeviceError::UnknownCommand(0x09)
        .to_string()
        .contains("0x0009"));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let err = PciSimulator::new(SimulatorConfig {
        register_size: 64,
        waveform: WaveformLayout {
            offset: 0,
            waveforms: 4,
            points: 16,
        },
    })
    .unwrap_err();
    assert!(matches!(err, DeviceError::Config(_)));
}
