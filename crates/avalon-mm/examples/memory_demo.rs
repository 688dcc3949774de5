//! Drives a handful of transactions against the reference memory subordinate.
//!
//! ## Usage
//!
//! ```sh
//! RUST_LOG=avalon_mm=info cargo run -p avalon-mm --example memory_demo
//! ```
//!
//! Backpressure and response latency can be tuned with the first two
//! arguments (cycles), e.g. `-- 3 2`.

#![allow(clippy::pedantic)]

use avalon_mm::sim::{MemorySubordinate, SignalBundle};
use avalon_mm::{
    hex_le, AvalonMaster, DriverError, MasterConfig, Payload, ReadOptions, WriteOptions,
};
use log::info;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

fn cycles_arg(index: usize) -> u32 {
    std::env::args()
        .nth(index)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0)
}

fn main() -> Result<(), DriverError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let memory = MemorySubordinate::new()
        .with_stall_cycles(cycles_arg(1))
        .with_response_latency(cycles_arg(2))
        .with_error_word(0xFF);
    let mut master = AvalonMaster::new(
        SignalBundle::new(16, 32),
        memory,
        MasterConfig::named("demo.mm"),
    )?;

    master.write(0x10, 0xDEAD_BEEF_u32)?;
    master.write_with(0x14, 0xFFFF_u32, WriteOptions::masked(0b0010))?;
    master.write(0x100, Payload::bytes(*b"avalon memory-mapped"))?;

    let word = master.read_with(0x10, ReadOptions::verify(0xDEAD_BEEF_u32))?;
    info!("verified word at 0x10: 0x{}", hex_le(&word));

    let pending: Vec<_> = (0..5_u64)
        .map(|index| master.read_nowait(0x100 + index * 4, ReadOptions::default()))
        .collect();
    master.wait()?;
    let mut text = Vec::new();
    for id in pending {
        if let Some(read) = master.take_response(id) {
            text.extend(read.data);
        }
    }
    info!("string at 0x100: {:?}", String::from_utf8_lossy(&text));

    master.write_with(0x3FC, 0x1_u8, WriteOptions::default().expect_error())?;

    let cycles = master.clock().cycle();
    let transfers = master.clock().transfers().len();
    info!("{transfers} transfers in {cycles} cycles");
    Ok(())
}
