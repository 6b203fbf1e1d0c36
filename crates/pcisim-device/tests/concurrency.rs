use std::sync::Arc;
use std::thread;

use pcisim_device::{Command, PciSimulator, Response, Scalar, SimulatorConfig, Width};

fn shared_sim() -> Arc<PciSimulator> {
    Arc::new(PciSimulator::new(SimulatorConfig::default()).unwrap())
}

#[test]
fn concurrent_disjoint_writes_are_all_visible() {
    let sim = shared_sim();
    let threads = 8u32;
    let per_thread = 512u32;

    let mut handles = Vec::new();
    for t in 0..threads {
        let sim = sim.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                let slot = t * per_thread + i;
                sim.dispatch(Command::WriteScalar {
                    offset: slot * 4,
                    value: Scalar::U32(slot ^ 0xA5A5_0000),
                })
                .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().expect("writer panicked");
    }

    for slot in 0..threads * per_thread {
        let resp = sim
            .dispatch(Command::ReadScalar {
                width: Width::W32,
                offset: slot * 4,
            })
            .unwrap();
        assert_eq!(
            resp,
            Response::Scalar {
                offset: slot * 4,
                value: Scalar::U32(slot ^ 0xA5A5_0000)
            }
        );
    }
}

#[test]
fn overlapping_word_writes_and_bulk_reads_never_tear() {
    const PATTERNS: [u32; 2] = [0x0000_0000, 0xFFFF_FFFF];
    let sim = shared_sim();

    let writer = {
        let sim = sim.clone();
        thread::spawn(move || {
            for i in 0..20_000usize {
                sim.dispatch(Command::WriteScalar {
                    offset: 0,
                    value: Scalar::U32(PATTERNS[i % 2]),
                })
                .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let sim = sim.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                for _ in 0..20_000 {
                    sim.bulk_read(&mut buf, 4).unwrap();
                    let word = u32::from_ne_bytes(buf);
                    assert!(PATTERNS.contains(&word), "torn read: 0x{word:08X}");

                    if let Response::Scalar { value, .. } = sim
                        .dispatch(Command::ReadScalar {
                            width: Width::W32,
                            offset: 0,
                        })
                        .unwrap()
                    {
                        assert!(PATTERNS.contains(&value.as_u32()));
                    }
                }
            })
        })
        .collect();

    writer.join().expect("writer panicked");
    for r in readers {
        r.join().expect("reader panicked");
    }
}

#[test]
fn bulk_write_is_atomic_with_respect_to_scalar_reads() {
    let sim = shared_sim();

    let writer = {
        let sim = sim.clone();
        thread::spawn(move || {
            for i in 0..5_000u32 {
                let fill = if i % 2 == 0 { 0x11u8 } else { 0x22u8 };
                sim.bulk_write(&[fill; 64]).unwrap();
            }
        })
    };

    let reader = {
        let sim = sim.clone();
        thread::spawn(move || {
            for _ in 0..5_000 {
                let mut buf = vec![0u8; 64];
                sim.dispatch(Command::ReadWaveformBulk {
                    offset: 0,
                    length: 64,
                    buffer: &mut buf,
                })
                .unwrap();
                let first = buf[0];
                assert!(buf.iter().all(|b| *b == first), "mixed bulk snapshot");
            }
        })
    };

    writer.join().expect("writer panicked");
    reader.join().expect("reader panicked");
}

#[test]
fn concurrent_advances_are_serialized() {
    let sim = shared_sim();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sim = sim.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    sim.dispatch(Command::AdvanceWaveform).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("advancer panicked");
    }

    // 100 steps total: one seed plus 99 increments.
    let samples = sim.waveform_samples().unwrap();
    for (i, s) in samples.iter().enumerate() {
        assert_eq!(*s, ((i + 1 + 99) % 0x1_0000) as u16);
    }
}
