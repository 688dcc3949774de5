//! Flow-control behavior under varying backpressure and response latency.

#![allow(clippy::pedantic, clippy::nursery, clippy::unwrap_used)]

use avalon_mm::sim::{MemorySubordinate, SignalBundle};
use avalon_mm::{
    AvalonMaster, Direction, DriverError, MasterConfig, Phase, ReadCorrelation, ReadOptions,
    WriteOptions,
};
use env_logger as _;
use log as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

type SimMaster = AvalonMaster<SignalBundle, MemorySubordinate>;

fn sim_master(memory: MemorySubordinate, config: MasterConfig) -> SimMaster {
    AvalonMaster::new(SignalBundle::new(16, 32), memory, config).unwrap()
}

#[rstest]
#[case(0, 0)]
#[case(1, 0)]
#[case(0, 3)]
#[case(4, 2)]
#[case(17, 11)]
fn round_trip_survives_backpressure_and_latency(#[case] stall: u32, #[case] latency: u32) {
    let memory = MemorySubordinate::new()
        .with_stall_cycles(stall)
        .with_response_latency(latency);
    let mut master = sim_master(memory, MasterConfig::default());

    master.write(0x40, 0x0BAD_F00D_u32).unwrap();
    master.write(0x44, 0xCAFE_u16).unwrap();
    let first = master.read(0x40).unwrap();
    let second = master.read(0x44).unwrap();

    assert_eq!(first, 0x0BAD_F00D_u32.to_le_bytes().to_vec());
    assert_eq!(second, vec![0xFE, 0xCA, 0, 0]);
    assert_eq!(master.clock().transfers().len(), 4);
    assert!(master.idle());
}

#[rstest]
#[case(0, 5)]
#[case(2, 7)]
fn write_takes_one_edge_per_stall_and_latency_cycle(#[case] stall: u32, #[case] latency: u32) {
    let memory = MemorySubordinate::new()
        .with_stall_cycles(stall)
        .with_response_latency(latency);
    let mut master = sim_master(memory, MasterConfig::default());

    master.write(0x0, 0x1_u8).unwrap();

    // Startup edge, request edge, stalls, latency, retire edge.
    let expected = 1 + 1 + u64::from(stall) + u64::from(latency) + 1;
    assert_eq!(master.clock().cycle(), expected);
}

#[test]
fn queued_beats_issue_back_to_back_in_order() {
    let mut master = sim_master(MemorySubordinate::new(), MasterConfig::default());

    master.write_nowait(0x0, 0x11_u8, WriteOptions::default());
    master.write_nowait(0x4, 0x22_u8, WriteOptions::default());
    let read = master.read_nowait(0x0, ReadOptions::default());
    assert_eq!(master.count_tx(), 3);
    assert!(!master.is_drained());

    master.wait().unwrap();

    let order: Vec<(Direction, u64)> = master
        .clock()
        .transfers()
        .iter()
        .map(|transfer| (transfer.direction, transfer.word_address))
        .collect();
    assert_eq!(
        order,
        vec![(Direction::Write, 0), (Direction::Write, 1), (Direction::Read, 0)]
    );
    assert_eq!(master.count_rx(), 1);
    assert_eq!(master.take_response(read).unwrap().data, vec![0x11, 0, 0, 0]);
    assert!(master.idle());
}

#[test]
fn work_queued_while_idle_is_picked_up_in_the_same_cycle() {
    let mut master = sim_master(MemorySubordinate::new(), MasterConfig::default());
    master.tick().unwrap();
    assert_eq!(master.engine().phase(), &Phase::WaitForWork);

    master.write_nowait(0x8, 0x1_u8, WriteOptions::default());
    master.tick().unwrap();

    let transfers = master.clock().transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].cycle, 2);
}

#[test]
fn response_latency_past_budget_times_out() {
    let memory = MemorySubordinate::new().with_response_latency(10);
    let config = MasterConfig::default().with_signed_timeout(5);
    let mut master = sim_master(memory, config);

    let err = master.read(0x30).unwrap_err();

    assert_eq!(
        err,
        DriverError::ResponseTimeout {
            direction: Direction::Read,
            address: 0x30,
            cycles: 5,
        }
    );
    assert!(master.bus().read, "read stays asserted after a timeout");
}

#[test]
fn write_response_latency_past_budget_times_out() {
    let memory = MemorySubordinate::new().with_response_latency(10);
    let config = MasterConfig::default().with_signed_timeout(5);
    let mut master = sim_master(memory, config);

    let err = master.write(0x30, 0x1_u8).unwrap_err();

    assert_eq!(
        err,
        DriverError::ResponseTimeout {
            direction: Direction::Write,
            address: 0x30,
            cycles: 5,
        }
    );
    assert_eq!(
        err.to_string(),
        "Write response timeout: no writeresponsevalid after 5 cycles (addr=0x00000030)"
    );
    assert!(!master.bus().write, "write is released once accepted");
    assert_eq!(master.clock().transfers().len(), 1);
}

#[test]
fn disabled_timeout_waits_out_long_stalls() {
    let memory = MemorySubordinate::new().with_stall_cycles(2500);
    let config = MasterConfig::default().with_signed_timeout(-1);
    let mut master = sim_master(memory, config);

    master.write(0x0, 0x5A_u8).unwrap();

    assert_eq!(master.clock().peek(0x0, 1), vec![0x5A]);
    assert!(master.clock().cycle() > 2500);
}

#[test]
fn zero_timeout_fails_on_the_first_stalled_edge() {
    let memory = MemorySubordinate::new().with_stall_cycles(1);
    let config = MasterConfig::default().with_signed_timeout(0);
    let mut master = sim_master(memory, config);

    let err = master.write(0x0, 0x1_u8).unwrap_err();
    assert_eq!(
        err,
        DriverError::AcceptTimeout {
            direction: Direction::Write,
            address: 0x0,
            cycles: 1,
        }
    );
}

#[test]
fn soft_violations_warn_and_continue() {
    let memory = MemorySubordinate::new().with_error_word(0x1);
    let config = MasterConfig {
        raise_on_error: false,
        ..MasterConfig::default()
    };
    let mut master = sim_master(memory, config);

    master.write(0x4, 0x1_u8).unwrap();
    assert!(master.exception_occurred());
    master.write(0x8, 0x2_u8).unwrap();
    assert_eq!(master.clock().peek(0x8, 1), vec![0x2]);

    master.clear_exception();
    assert!(!master.exception_occurred());

    master.set_raise_on_error(true);
    assert!(matches!(
        master.read(0x4),
        Err(DriverError::ProtocolViolation {
            direction: Direction::Read,
            response: 2,
            error_expected: false,
            ..
        })
    ));
}

#[test]
fn restart_drops_in_flight_beat_and_keeps_the_queue() {
    let memory = MemorySubordinate::new().with_stall_cycles(u32::MAX);
    let mut master = sim_master(memory, MasterConfig::default().with_signed_timeout(-1));

    master.write_nowait(0x0, 0xAA_u8, WriteOptions::default());
    master.write_nowait(0x4, 0xBB_u8, WriteOptions::default());
    master.run_cycles(4).unwrap();
    assert!(master.bus().write);
    assert_eq!(master.count_tx(), 1);

    master.restart();
    assert!(!master.bus().write);
    assert_eq!(master.bus().byteenable, 0);
    assert_eq!(master.engine().phase(), &Phase::Reset);
    assert_eq!(master.count_tx(), 1);

    master.clock_mut().set_stall_cycles(0);
    master.wait().unwrap();

    let transfers = master.clock().transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].word_address, 0x1);
    assert_eq!(master.clock().peek(0x0, 1), vec![0]);
}

#[test]
fn clear_drops_completed_reads_but_not_the_in_flight_beat() {
    let memory = MemorySubordinate::new().with_response_latency(3);
    let mut master = sim_master(memory, MasterConfig::default());

    let done = master.read_nowait(0x0, ReadOptions::default());
    master.wait().unwrap();
    assert_eq!(master.count_rx(), 1);

    let in_flight = master.read_nowait(0x4, ReadOptions::default());
    master.read_nowait(0x8, ReadOptions::default());
    master.run_cycles(3).unwrap();
    master.clear();
    assert_eq!(master.count_rx(), 0);
    assert_eq!(master.count_tx(), 0);

    master.wait().unwrap();
    assert!(master.take_response(done).is_none());
    assert!(master.take_response(in_flight).is_some());
    assert_eq!(master.clock().transfers().len(), 2);
}

#[rstest]
#[case(ReadCorrelation::Retain, 2)]
#[case(ReadCorrelation::Discard, 0)]
fn correlation_policy_decides_fate_of_foreign_results(
    #[case] correlation: ReadCorrelation,
    #[case] left_over: usize,
) {
    let mut memory = MemorySubordinate::new();
    memory.poke(0x10, &[7, 7, 7, 7]);
    let config = MasterConfig {
        correlation,
        ..MasterConfig::default()
    };
    let mut master = sim_master(memory, config);

    master.read_nowait(0x0, ReadOptions::default());
    master.read_nowait(0x4, ReadOptions::default());
    let own = master.read(0x10).unwrap();

    assert_eq!(own, vec![7, 7, 7, 7]);
    assert_eq!(master.count_rx(), left_over);
}

#[rstest]
#[case(ReadCorrelation::Retain, vec![1, 2, 3, 4, 5, 6, 7, 8])]
#[case(ReadCorrelation::Discard, vec![5, 6, 7, 8])]
fn multi_beat_read_result_depends_on_correlation(
    #[case] correlation: ReadCorrelation,
    #[case] expected: Vec<u8>,
) {
    let mut memory = MemorySubordinate::new();
    memory.poke(0x100, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let config = MasterConfig {
        correlation,
        ..MasterConfig::default()
    };
    let mut master = sim_master(memory, config);

    let data = master
        .read_with(0x100, ReadOptions::verify(0x0807_0605_0403_0201_u64))
        .unwrap();

    assert_eq!(data, expected);
    assert_eq!(master.clock().transfers().len(), 2);
    assert_eq!(master.count_rx(), 0);
}

#[test]
fn asymmetric_bus_splits_reads_with_read_width() {
    let bus = SignalBundle::with_widths(16, 32, 64, 4);
    let mut memory = MemorySubordinate::new();
    memory.poke(0x20, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let mut master = AvalonMaster::new(bus, memory, MasterConfig::default()).unwrap();

    let data = master.read(0x20).unwrap();

    assert_eq!(data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(master.clock().transfers()[0].word_address, 0x8);
}
