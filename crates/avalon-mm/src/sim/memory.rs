use std::collections::{BTreeMap, BTreeSet};

use crate::sim::SignalBundle;
use crate::{Clock, Direction, RESPONSE_OKAY};

/// Response code injected for configured error words.
pub const RESPONSE_SLVERR: u8 = 0b10;

/// One transfer accepted by [`MemorySubordinate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTransfer {
    /// Cycle on which the transfer was accepted.
    pub cycle: u64,
    /// Transfer direction.
    pub direction: Direction,
    /// Sampled word address.
    pub word_address: u64,
    /// Write data as driven, or read data as returned.
    pub data: Vec<u8>,
    /// Sampled byte-enable mask; zero for reads.
    pub byte_enable: u128,
    /// Response code returned.
    pub response: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Write { response: u8 },
    Read { response: u8, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum SubordinateState {
    #[default]
    Idle,
    Responding {
        remaining: u32,
        reply: Reply,
    },
}

/// Sparse word-addressed memory behind a [`SignalBundle`].
///
/// Each call to [`Clock::rising_edge`] is one clock edge. A request seen on
/// the edge is stalled with `waitrequest` for `stall_cycles` edges, then
/// accepted; its response strobe is raised `response_latency` edges after
/// acceptance and held for exactly one edge. Requests are ignored while a
/// response is outstanding.
#[derive(Debug, Clone, Default)]
pub struct MemorySubordinate {
    bytes: BTreeMap<u64, u8>,
    error_words: BTreeSet<u64>,
    stall_cycles: u32,
    response_latency: u32,
    stalled: u32,
    state: SubordinateState,
    cycle: u64,
    transfers: Vec<BusTransfer>,
}

impl MemorySubordinate {
    /// Zero-latency memory with no backpressure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stalls every request for `cycles` edges before accepting it.
    #[must_use]
    pub fn with_stall_cycles(mut self, cycles: u32) -> Self {
        self.stall_cycles = cycles;
        self
    }

    /// Raises the response strobe `cycles` edges after acceptance.
    #[must_use]
    pub fn with_response_latency(mut self, cycles: u32) -> Self {
        self.response_latency = cycles;
        self
    }

    /// Answers every access to `word_address` with [`RESPONSE_SLVERR`].
    #[must_use]
    pub fn with_error_word(mut self, word_address: u64) -> Self {
        self.error_words.insert(word_address);
        self
    }

    /// Changes the stall applied to requests not yet seen.
    pub fn set_stall_cycles(&mut self, cycles: u32) {
        self.stall_cycles = cycles;
    }

    /// Changes the latency applied to requests not yet accepted.
    pub fn set_response_latency(&mut self, cycles: u32) {
        self.response_latency = cycles;
    }

    /// Edges seen so far.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Accepted transfers in acceptance order.
    #[must_use]
    pub fn transfers(&self) -> &[BusTransfer] {
        &self.transfers
    }

    /// Drains the transfer log.
    pub fn take_transfers(&mut self) -> Vec<BusTransfer> {
        std::mem::take(&mut self.transfers)
    }

    /// Reads `len` bytes starting at `byte_address`; unwritten bytes are zero.
    #[must_use]
    pub fn peek(&self, byte_address: u64, len: usize) -> Vec<u8> {
        (byte_address..)
            .take(len)
            .map(|address| self.bytes.get(&address).copied().unwrap_or(0))
            .collect()
    }

    /// Writes `data` starting at `byte_address` without bus activity.
    pub fn poke(&mut self, byte_address: u64, data: &[u8]) {
        for (address, byte) in (byte_address..).zip(data) {
            self.bytes.insert(address, *byte);
        }
    }

    fn lane_base(word_address: u64, bus: &SignalBundle) -> u64 {
        let lanes = u64::try_from(bus.write_bytes()).unwrap_or(u64::MAX);
        word_address.wrapping_mul(lanes)
    }

    fn accept(&mut self, bus: &SignalBundle) -> Reply {
        let word_address = bus.address;
        let response = if self.error_words.contains(&word_address) {
            RESPONSE_SLVERR
        } else {
            RESPONSE_OKAY
        };
        let base = Self::lane_base(word_address, bus);

        let (direction, data, byte_enable, reply) = if bus.write {
            if response == RESPONSE_OKAY {
                for (lane, byte) in (0_u32..).zip(&bus.writedata) {
                    if lane < 128 && bus.byteenable & (1 << lane) != 0 {
                        self.bytes.insert(base + u64::from(lane), *byte);
                    }
                }
            }
            (
                Direction::Write,
                bus.writedata.clone(),
                bus.byteenable,
                Reply::Write { response },
            )
        } else {
            let data = if response == RESPONSE_OKAY {
                self.peek(base, bus.read_bytes())
            } else {
                vec![0; bus.read_bytes()]
            };
            (
                Direction::Read,
                data.clone(),
                0,
                Reply::Read { response, data },
            )
        };

        self.transfers.push(BusTransfer {
            cycle: self.cycle,
            direction,
            word_address,
            data,
            byte_enable,
            response,
        });
        reply
    }

    fn deliver(reply: Reply, bus: &mut SignalBundle) {
        match reply {
            Reply::Write { response } => {
                bus.writeresponsevalid = true;
                bus.response = response;
            }
            Reply::Read { response, data } => {
                bus.readdatavalid = true;
                bus.response = response;
                bus.readdata = data;
            }
        }
    }
}

impl Clock<SignalBundle> for MemorySubordinate {
    fn rising_edge(&mut self, bus: &mut SignalBundle) {
        self.cycle += 1;
        bus.writeresponsevalid = false;
        bus.readdatavalid = false;
        bus.response = RESPONSE_OKAY;

        match std::mem::take(&mut self.state) {
            SubordinateState::Responding { remaining, reply } => {
                bus.waitrequest = false;
                if remaining == 0 {
                    Self::deliver(reply, bus);
                } else {
                    self.state = SubordinateState::Responding {
                        remaining: remaining - 1,
                        reply,
                    };
                }
            }
            SubordinateState::Idle if bus.request_idle() => {
                self.stalled = 0;
                bus.waitrequest = false;
            }
            SubordinateState::Idle if self.stalled < self.stall_cycles => {
                self.stalled += 1;
                bus.waitrequest = true;
            }
            SubordinateState::Idle => {
                self.stalled = 0;
                bus.waitrequest = false;
                let reply = self.accept(bus);
                if self.response_latency == 0 {
                    Self::deliver(reply, bus);
                } else {
                    self.state = SubordinateState::Responding {
                        remaining: self.response_latency - 1,
                        reply,
                    };
                }
            }
        }
    }
}
