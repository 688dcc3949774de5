#![no_main]

use avalon_mm::sim::{MemorySubordinate, SignalBundle};
use avalon_mm::{AvalonMaster, MasterConfig, Payload, ReadOptions, WriteOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let data_width = 8_u32 << (data[0] % 5);
    let memory = MemorySubordinate::new()
        .with_stall_cycles(u32::from(data[1] % 8))
        .with_response_latency(u32::from(data[2] % 8))
        .with_error_word(u64::from(data[3]));
    let config = MasterConfig {
        raise_on_error: data[3] & 1 == 0,
        ..MasterConfig::default().with_signed_timeout(64)
    };
    let Ok(mut master) = AvalonMaster::new(SignalBundle::new(12, data_width), memory, config)
    else {
        return;
    };

    let mut written = 0_usize;
    for op in data[4..].chunks(6) {
        let address = u64::from(u16::from_le_bytes([op[0], *op.get(1).unwrap_or(&0)]));
        let payload = op.get(2..).unwrap_or(&[]);
        match op[0] % 5 {
            0 => {
                let _ = master.write(address, Payload::integer_le(payload));
            }
            1 => {
                master.write_nowait(address, payload, WriteOptions::default());
            }
            2 => {
                let _ = master.read_with(address, ReadOptions::verify(payload));
            }
            3 => {
                let id = master.read_nowait(address, ReadOptions::default());
                let _ = master.wait();
                let _ = master.take_response(id);
            }
            _ => {
                if master.engine().latched_error().is_some() {
                    master.restart();
                } else {
                    master.clear();
                }
            }
        }
        written += 1;
        assert!(master.count_tx() <= written * 64);
    }

    let _ = master.wait();
});
