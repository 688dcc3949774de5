//! Caller-facing Avalon-MM manager.
//!
//! [`AvalonMaster`] owns the bus binding, the clock, and the
//! [`DriverEngine`]. Every blocking call advances the clock itself, one edge
//! at a time, until the engine drains or latches an error.

use std::ops::RangeInclusive;

use crate::engine::DriverEngine;
use crate::trace::LogSink;
use crate::{
    AvalonBus, Clock, CompletedRead, DriverError, MasterConfig, Payload, ReadCorrelation,
    TraceSink, TransactionId,
};

/// Per-call write options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct WriteOptions {
    /// Byte-enable mask for every beat; `None` enables all lanes.
    pub byte_enable: Option<u128>,
    /// The subordinate is expected to answer with an error code.
    pub error_expected: bool,
}

impl WriteOptions {
    /// Options applying `mask` to every beat.
    #[must_use]
    pub const fn masked(mask: u128) -> Self {
        Self {
            byte_enable: Some(mask),
            error_expected: false,
        }
    }

    /// Marks the write as expecting an error response.
    #[must_use]
    pub const fn expect_error(mut self) -> Self {
        self.error_expected = true;
        self
    }
}

/// Per-call read options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ReadOptions {
    /// Value the returned data must equal.
    pub expected: Option<Payload>,
    /// The subordinate is expected to answer with an error code.
    pub error_expected: bool,
}

impl ReadOptions {
    /// Options verifying the returned data against `expected`.
    #[must_use]
    pub fn verify(expected: impl Into<Payload>) -> Self {
        Self {
            expected: Some(expected.into()),
            error_expected: false,
        }
    }

    /// Marks the read as expecting an error response.
    #[must_use]
    pub fn expect_error(mut self) -> Self {
        self.error_expected = true;
        self
    }
}

/// Avalon-MM manager bound to a bus and a clock.
pub struct AvalonMaster<B, C> {
    name: String,
    correlation: ReadCorrelation,
    engine: DriverEngine,
    bus: B,
    clock: C,
}

impl<B, C> std::fmt::Debug for AvalonMaster<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvalonMaster")
            .field("name", &self.name)
            .field("correlation", &self.correlation)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl<B: AvalonBus, C: Clock<B>> AvalonMaster<B, C> {
    /// Binds a manager that traces through [`LogSink`].
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::UnsupportedWidth`] when the bus cannot be driven.
    pub fn new(bus: B, clock: C, config: MasterConfig) -> Result<Self, DriverError> {
        let sink = LogSink::new(config.name.clone());
        Self::with_trace_sink(bus, clock, config, Box::new(sink))
    }

    /// Binds a manager that reports to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::UnsupportedWidth`] when the bus cannot be driven.
    pub fn with_trace_sink(
        mut bus: B,
        clock: C,
        config: MasterConfig,
        sink: Box<dyn TraceSink + Send>,
    ) -> Result<Self, DriverError> {
        let engine = DriverEngine::new(&mut bus, &config, sink)?;
        Ok(Self {
            name: config.name,
            correlation: config.correlation,
            engine,
            bus,
            clock,
        })
    }

    /// Instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying engine, for phase and queue inspection.
    #[must_use]
    pub const fn engine(&self) -> &DriverEngine {
        &self.engine
    }

    /// Bound bus.
    #[must_use]
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Bound bus, mutably, for harness-side stimulus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Bound clock.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Bound clock, mutably.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Releases the bus and the clock.
    pub fn into_parts(self) -> (B, C) {
        (self.bus, self.clock)
    }

    /// Writes `data` at `address` and waits until the engine drains.
    ///
    /// # Errors
    ///
    /// Returns the fatal error raised while draining, or the error already
    /// latched by an earlier call.
    pub fn write(&mut self, address: u64, data: impl Into<Payload>) -> Result<(), DriverError> {
        self.write_with(address, data, WriteOptions::default())
    }

    /// [`write`](Self::write) with explicit options.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn write_with(
        &mut self,
        address: u64,
        data: impl Into<Payload>,
        options: WriteOptions,
    ) -> Result<(), DriverError> {
        self.ensure_running()?;
        self.write_nowait(address, data, options);
        self.wait()
    }

    /// Queues a write without advancing the clock.
    ///
    /// Returns the ids given to its beats.
    pub fn write_nowait(
        &mut self,
        address: u64,
        data: impl Into<Payload>,
        options: WriteOptions,
    ) -> RangeInclusive<TransactionId> {
        self.engine.enqueue_write(
            address,
            &data.into(),
            options.byte_enable,
            options.error_expected,
        )
    }

    /// Reads one read-width word at `address`.
    ///
    /// # Errors
    ///
    /// Same as [`read_with`](Self::read_with).
    pub fn read(&mut self, address: u64) -> Result<Vec<u8>, DriverError> {
        self.read_with(address, ReadOptions::default())
    }

    /// Reads at `address`, verifying against `options.expected` when given.
    ///
    /// An integer expectation spans as many beats as it needs. Under
    /// [`ReadCorrelation::Retain`] the data of every beat is returned
    /// concatenated in beat order. Under [`ReadCorrelation::Discard`] only the
    /// last beat's data is returned. Waits until the engine drains before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns the fatal error raised while draining, or the error already
    /// latched by an earlier call.
    pub fn read_with(
        &mut self,
        address: u64,
        options: ReadOptions,
    ) -> Result<Vec<u8>, DriverError> {
        self.ensure_running()?;
        let ids = self.engine.enqueue_read(
            address,
            options.expected.as_ref(),
            options.error_expected,
        );
        self.wait()?;
        Ok(self.collect_reads(&ids))
    }

    /// Queues a read without advancing the clock.
    ///
    /// Returns the id of its last beat; retrieve the data with
    /// [`take_response`](Self::take_response) or
    /// [`pop_response`](Self::pop_response).
    pub fn read_nowait(&mut self, address: u64, options: ReadOptions) -> TransactionId {
        let ids = self.engine.enqueue_read(
            address,
            options.expected.as_ref(),
            options.error_expected,
        );
        *ids.end()
    }

    /// Advances the clock until the engine drains.
    ///
    /// Returns immediately when nothing is pending or in flight.
    ///
    /// # Errors
    ///
    /// Returns the fatal error raised while draining, or the latched one.
    pub fn wait(&mut self) -> Result<(), DriverError> {
        while !self.engine.is_drained() {
            self.advance()?;
        }
        Ok(())
    }

    /// Advances one clock edge.
    ///
    /// # Errors
    ///
    /// Returns the fatal error raised in this cycle, or the latched one.
    pub fn tick(&mut self) -> Result<(), DriverError> {
        self.advance()
    }

    /// Advances `cycles` clock edges, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Same as [`tick`](Self::tick).
    pub fn run_cycles(&mut self, cycles: u64) -> Result<(), DriverError> {
        for _ in 0..cycles {
            self.advance()?;
        }
        Ok(())
    }

    /// Drops every pending beat and completed read without touching the bus.
    pub fn clear(&mut self) {
        self.engine.clear();
    }

    /// Drops the in-flight beat and latched error; queues are kept.
    pub fn restart(&mut self) {
        self.engine.restart(&mut self.bus);
    }

    /// Oldest completed read not yet consumed.
    pub fn pop_response(&mut self) -> Option<CompletedRead> {
        self.engine.responses_mut().pop()
    }

    /// Completed read with `id`, leaving others queued.
    pub fn take_response(&mut self, id: TransactionId) -> Option<CompletedRead> {
        self.engine.responses_mut().take(id)
    }

    /// Beats waiting to be issued.
    #[must_use]
    pub fn count_tx(&self) -> usize {
        self.engine.transactions().len()
    }

    /// Completed reads not yet consumed.
    #[must_use]
    pub fn count_rx(&self) -> usize {
        self.engine.responses().len()
    }

    /// Returns `true` when no beat waits to be issued.
    #[must_use]
    pub fn empty_tx(&self) -> bool {
        self.engine.transactions().is_empty()
    }

    /// Returns `true` when no completed read is waiting.
    #[must_use]
    pub fn empty_rx(&self) -> bool {
        self.engine.responses().is_empty()
    }

    /// Returns `true` when both queues are empty.
    #[must_use]
    pub fn idle(&self) -> bool {
        self.empty_tx() && self.empty_rx()
    }

    /// Returns `true` when nothing is pending and no beat is in flight.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.engine.is_drained()
    }

    /// Sticky flag set by every response-code contract violation.
    #[must_use]
    pub const fn exception_occurred(&self) -> bool {
        self.engine.exception_occurred()
    }

    /// Resets the sticky violation flag.
    pub fn clear_exception(&mut self) {
        self.engine.clear_exception();
    }

    /// Makes response-code violations fatal (`true`) or warnings (`false`).
    pub fn set_raise_on_error(&mut self, enabled: bool) {
        self.engine.set_raise_on_error(enabled);
    }

    fn ensure_running(&self) -> Result<(), DriverError> {
        match self.engine.latched_error() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn advance(&mut self) -> Result<(), DriverError> {
        self.engine.poll(&mut self.bus)?;
        self.clock.rising_edge(&mut self.bus);
        self.engine.on_rising_edge(&mut self.bus)
    }

    fn collect_reads(&mut self, ids: &RangeInclusive<TransactionId>) -> Vec<u8> {
        match self.correlation {
            ReadCorrelation::Retain => self
                .engine
                .responses_mut()
                .take_range(ids)
                .into_iter()
                .flat_map(|read| read.data)
                .collect(),
            ReadCorrelation::Discard => {
                let awaited = *ids.end();
                while let Some(read) = self.engine.responses_mut().pop() {
                    if read.id == awaited {
                        return read.data;
                    }
                    self.engine.note_discarded(read.id);
                }
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AvalonMaster, ReadOptions, WriteOptions};
    use crate::sim::{MemorySubordinate, SignalBundle};
    use crate::{DriverError, MasterConfig, Payload, ReadCorrelation};

    type SimMaster = AvalonMaster<SignalBundle, MemorySubordinate>;

    fn master(memory: MemorySubordinate, config: MasterConfig) -> SimMaster {
        AvalonMaster::new(SignalBundle::new(16, 32), memory, config).expect("valid bus")
    }

    #[test]
    fn fresh_master_is_drained_and_idle() {
        let mut master = master(MemorySubordinate::new(), MasterConfig::default());
        assert!(master.is_drained());
        assert!(master.idle());
        master.wait().expect("nothing to wait for");
        assert_eq!(master.clock().cycle(), 0);
    }

    #[test]
    fn write_then_read_round_trips_through_memory() {
        let mut master = master(MemorySubordinate::new(), MasterConfig::default());
        master.write(0x10, 0xDEAD_BEEF_u32).expect("write");
        assert_eq!(master.clock().peek(0x10, 4), vec![0xEF, 0xBE, 0xAD, 0xDE]);

        let data = master.read(0x10).expect("read");
        assert_eq!(data, vec![0xEF, 0xBE, 0xAD, 0xDE]);
        assert!(master.idle());
    }

    #[test]
    fn masked_write_updates_selected_lanes_only() {
        let mut memory = MemorySubordinate::new();
        memory.poke(0x0, &[1, 2, 3, 4]);
        let mut master = master(memory, MasterConfig::default());

        master
            .write_with(0x0, 0xAABB_CCDD_u32, WriteOptions::masked(0b1001))
            .expect("masked write");
        assert_eq!(master.clock().peek(0x0, 4), vec![0xDD, 2, 3, 0xAA]);
    }

    #[test]
    fn blocking_read_returns_concatenated_beats() {
        let mut memory = MemorySubordinate::new();
        memory.poke(0x100, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut master = master(memory, MasterConfig::default());

        let data = master
            .read_with(
                0x100,
                ReadOptions::verify(Payload::from(0x0807_0605_0403_0201_u64)),
            )
            .expect("two-beat verified read");
        assert_eq!(data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn retain_policy_keeps_foreign_results() {
        let mut master = master(MemorySubordinate::new(), MasterConfig::default());
        let earlier = master.read_nowait(0x0, ReadOptions::default());
        master.read(0x4).expect("read");

        assert_eq!(master.count_rx(), 1);
        assert!(master.take_response(earlier).is_some());
    }

    #[test]
    fn discard_policy_drops_foreign_results() {
        let config = MasterConfig {
            correlation: ReadCorrelation::Discard,
            ..MasterConfig::default()
        };
        let mut master = master(MemorySubordinate::new(), config);
        master.read_nowait(0x0, ReadOptions::default());
        master.read(0x4).expect("read");

        assert!(master.empty_rx());
    }

    #[test]
    fn latched_error_is_returned_until_restart() {
        let memory = MemorySubordinate::new().with_error_word(0x1);
        let mut master = master(memory, MasterConfig::default());

        let err = master.write(0x4, 1_u8).expect_err("error response");
        assert!(matches!(err, DriverError::ProtocolViolation { .. }));
        assert_eq!(master.write(0x8, 1_u8), Err(err.clone()));
        assert_eq!(master.tick(), Err(err));
        assert!(master.exception_occurred());

        master.restart();
        master.write(0x8, 1_u8).expect("write after restart");
        assert_eq!(master.clock().peek(0x8, 1), vec![1]);
    }
}
