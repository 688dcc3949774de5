//! The engine issues one beat at a time and walks it through
//! `WaitForWork -> Issue -> WaitAccept -> WaitResponse -> Complete`.
//! It never waits on its own: the owner calls [`DriverEngine::poll`] to let
//! it pick up newly queued work within the current cycle, and
//! [`DriverEngine::on_rising_edge`] after every clock edge.
//!
//! Any fatal error latches [`Phase::Halted`]. The in-flight beat is dropped
//! and nothing else is issued until [`DriverEngine::restart`].

mod phase;
mod widths;

pub use phase::{InFlight, Phase};
pub use widths::BusWidths;

use std::ops::RangeInclusive;

use crate::beat::{le_value_eq, split_read, split_write};
use crate::queue::{ResponseQueue, TransactionQueue};
use crate::{
    AvalonBus, Beat, BeatOp, CompletedRead, Direction, DriverError, MasterConfig, Payload,
    TraceEvent, TraceSink, TransactionId, RESPONSE_OKAY,
};

/// Queue-backed state machine that drives one beat at a time.
pub struct DriverEngine {
    widths: BusWidths,
    timeout_cycles: Option<u32>,
    raise_on_error: bool,
    exception_occurred: bool,
    transactions: TransactionQueue,
    responses: ResponseQueue,
    phase: Phase,
    sink: Box<dyn TraceSink + Send>,
}

impl std::fmt::Debug for DriverEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverEngine")
            .field("widths", &self.widths)
            .field("timeout_cycles", &self.timeout_cycles)
            .field("raise_on_error", &self.raise_on_error)
            .field("exception_occurred", &self.exception_occurred)
            .field("pending", &self.transactions.len())
            .field("completed", &self.responses.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl DriverEngine {
    /// Validates the bus, drives every request signal low, and reports the
    /// derived configuration to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::UnsupportedWidth`] when the bus widths cannot
    /// be driven.
    pub fn new<B: AvalonBus + ?Sized>(
        bus: &mut B,
        config: &MasterConfig,
        mut sink: Box<dyn TraceSink + Send>,
    ) -> Result<Self, DriverError> {
        let widths = BusWidths::from_bus(bus)?;
        sink.on_event(&TraceEvent::Configured {
            address_width: widths.address_width,
            write_data_width: bus.write_data_width(),
            read_data_width: bus.read_data_width(),
            byte_enable_width: widths.byte_enable_width,
            timeout_cycles: config.timeout_cycles,
        });

        let engine = Self {
            widths,
            timeout_cycles: config.timeout_cycles,
            raise_on_error: config.raise_on_error,
            exception_occurred: false,
            transactions: TransactionQueue::new(),
            responses: ResponseQueue::new(),
            phase: Phase::Reset,
            sink,
        };
        engine.release_bus(bus);
        Ok(engine)
    }

    /// Bus geometry in use.
    #[must_use]
    pub const fn widths(&self) -> BusWidths {
        self.widths
    }

    /// Current control-flow position.
    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Pending beats.
    #[must_use]
    pub const fn transactions(&self) -> &TransactionQueue {
        &self.transactions
    }

    /// Completed reads.
    #[must_use]
    pub const fn responses(&self) -> &ResponseQueue {
        &self.responses
    }

    /// Completed reads, for consumption by the owner.
    pub fn responses_mut(&mut self) -> &mut ResponseQueue {
        &mut self.responses
    }

    /// Sticky flag set by every response-code contract violation.
    #[must_use]
    pub const fn exception_occurred(&self) -> bool {
        self.exception_occurred
    }

    /// Resets the sticky violation flag.
    pub fn clear_exception(&mut self) {
        self.exception_occurred = false;
    }

    /// Whether response-code violations are fatal.
    #[must_use]
    pub const fn raise_on_error(&self) -> bool {
        self.raise_on_error
    }

    /// Makes response-code violations fatal (`true`) or warnings (`false`).
    pub fn set_raise_on_error(&mut self, enabled: bool) {
        self.raise_on_error = enabled;
    }

    /// Error latched by the last fatal condition, if any.
    #[must_use]
    pub const fn latched_error(&self) -> Option<&DriverError> {
        self.phase.latched_error()
    }

    /// Idle condition: nothing pending and no beat in flight.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.phase.is_ready() && self.transactions.is_empty()
    }

    /// Queues a write split into write-width beats.
    ///
    /// Returns the ids given to the beats; empty for an empty byte payload.
    /// A payload whose beats run past the byte address space queues nothing,
    /// latches [`DriverError::AddressOverflow`], and receives one unused id.
    pub fn enqueue_write(
        &mut self,
        address: u64,
        data: &Payload,
        byte_enable: Option<u128>,
        error_expected: bool,
    ) -> RangeInclusive<TransactionId> {
        match split_write(address, data, self.widths.write_bytes) {
            Ok(chunks) => self
                .transactions
                .push_writes(chunks, byte_enable, error_expected),
            Err(error) => self.reject(error),
        }
    }

    /// Queues a read split into read-width beats.
    ///
    /// The returned range always holds at least one id. Overflowing beats
    /// are rejected as in [`DriverEngine::enqueue_write`].
    pub fn enqueue_read(
        &mut self,
        address: u64,
        expected: Option<&Payload>,
        error_expected: bool,
    ) -> RangeInclusive<TransactionId> {
        match split_read(address, expected, self.widths.read_bytes) {
            Ok(chunks) => self.transactions.push_reads(chunks, error_expected),
            Err(error) => self.reject(error),
        }
    }

    fn reject(&mut self, error: DriverError) -> RangeInclusive<TransactionId> {
        if !matches!(self.phase, Phase::Halted(_)) {
            self.halt(error);
        }
        let id = self.transactions.burn_id();
        id..=id
    }

    /// Drops every pending beat and completed read.
    ///
    /// A beat already in flight is not affected and no signal is driven.
    pub fn clear(&mut self) {
        let pending = self.transactions.clear();
        let completed = self.responses.clear();
        self.sink
            .on_event(&TraceEvent::Cleared { pending, completed });
    }

    /// Records that a blocking read dropped another call's result.
    pub fn note_discarded(&mut self, id: TransactionId) {
        self.sink.on_event(&TraceEvent::ResponseDiscarded { id });
    }

    /// Drops the in-flight beat and any latched error, releases the request
    /// signals, and waits for one edge before serving the queue again.
    ///
    /// Queued beats and completed reads are kept.
    pub fn restart<B: AvalonBus + ?Sized>(&mut self, bus: &mut B) {
        let dropped = self.phase.in_flight().map(|beat| beat.id);
        self.release_bus(bus);
        self.phase = Phase::Reset;
        self.sink.on_event(&TraceEvent::Restarted { dropped });
    }

    /// Lets the engine act within the current cycle.
    ///
    /// When waiting for work and a beat is queued, the beat is dequeued and
    /// its request is driven immediately.
    ///
    /// # Errors
    ///
    /// Returns the latched error while halted, or the fatal error raised by
    /// issuing the next beat.
    pub fn poll<B: AvalonBus + ?Sized>(&mut self, bus: &mut B) -> Result<(), DriverError> {
        if let Phase::Halted(error) = &self.phase {
            return Err(error.clone());
        }
        let result = self.take_work(bus);
        self.latch(result)
    }

    /// Advances the state machine past one rising clock edge.
    ///
    /// # Errors
    ///
    /// Returns the latched error while halted, or the fatal error raised in
    /// this cycle (timeout, protocol violation, verification mismatch,
    /// address out of range).
    pub fn on_rising_edge<B: AvalonBus + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> Result<(), DriverError> {
        if let Phase::Halted(error) = &self.phase {
            return Err(error.clone());
        }
        let result = self.step_edge(bus);
        self.latch(result)
    }

    fn latch(&mut self, result: Result<(), DriverError>) -> Result<(), DriverError> {
        if let Err(error) = &result {
            self.halt(error.clone());
        }
        result
    }

    fn halt(&mut self, error: DriverError) {
        self.sink.on_event(&TraceEvent::Fault {
            error: error.clone(),
        });
        self.phase = Phase::Halted(error);
    }

    fn step_edge<B: AvalonBus + ?Sized>(&mut self, bus: &mut B) -> Result<(), DriverError> {
        match std::mem::replace(&mut self.phase, Phase::WaitForWork) {
            Phase::Reset | Phase::WaitForWork | Phase::Retire => self.take_work(bus),
            Phase::ReadSetup(flight) => {
                bus.set_read(true);
                bus.set_address(flight.word_address);
                self.phase = Phase::Issued(flight);
                Ok(())
            }
            Phase::Issued(flight) => self.await_accept(flight, 0, bus),
            Phase::WaitAccept { flight, cycles } => {
                let cycles = cycles.saturating_add(1);
                if self.budget_spent(cycles) {
                    return Err(DriverError::AcceptTimeout {
                        direction: flight.beat.direction(),
                        address: flight.beat.byte_address,
                        cycles,
                    });
                }
                self.await_accept(flight, cycles, bus)
            }
            Phase::WaitResponse { flight, cycles } => {
                let cycles = cycles.saturating_add(1);
                if self.budget_spent(cycles) {
                    return Err(DriverError::ResponseTimeout {
                        direction: flight.beat.direction(),
                        address: flight.beat.byte_address,
                        cycles,
                    });
                }
                self.await_response(flight, cycles, bus)
            }
            Phase::Halted(error) => Err(error),
        }
    }

    fn budget_spent(&self, cycles: u32) -> bool {
        self.timeout_cycles.is_some_and(|budget| cycles >= budget)
    }

    fn take_work<B: AvalonBus + ?Sized>(&mut self, bus: &mut B) -> Result<(), DriverError> {
        if !matches!(self.phase, Phase::WaitForWork) {
            return Ok(());
        }
        match self.transactions.pop() {
            Some(beat) => self.issue(beat, bus),
            None => Ok(()),
        }
    }

    fn issue<B: AvalonBus + ?Sized>(&mut self, beat: Beat, bus: &mut B) -> Result<(), DriverError> {
        let word_address = self.widths.word_address(beat.byte_address)?;

        match &beat.op {
            BeatOp::Write { data, byte_enable } => {
                self.sink.on_event(&TraceEvent::WriteIssued {
                    id: beat.id,
                    address: beat.byte_address,
                    word_address,
                    data: data.clone(),
                });
                bus.set_write(true);
                bus.set_address(word_address);
                bus.set_writedata(data);
                bus.set_byteenable(self.widths.byte_enable(*byte_enable));
                self.phase = Phase::Issued(InFlight { beat, word_address });
            }
            BeatOp::Read { .. } => {
                self.sink.on_event(&TraceEvent::ReadIssued {
                    id: beat.id,
                    address: beat.byte_address,
                    word_address,
                });
                // Request logic is combinational; hold one cycle of setup first.
                self.phase = Phase::ReadSetup(InFlight { beat, word_address });
            }
        }
        Ok(())
    }

    fn await_accept<B: AvalonBus + ?Sized>(
        &mut self,
        flight: InFlight,
        cycles: u32,
        bus: &mut B,
    ) -> Result<(), DriverError> {
        if bus.waitrequest() {
            self.phase = Phase::WaitAccept { flight, cycles };
            return Ok(());
        }
        if flight.beat.direction() == Direction::Write {
            self.release_write(bus);
        }
        self.await_response(flight, 0, bus)
    }

    fn await_response<B: AvalonBus + ?Sized>(
        &mut self,
        flight: InFlight,
        cycles: u32,
        bus: &mut B,
    ) -> Result<(), DriverError> {
        let direction = flight.beat.direction();
        let valid = match direction {
            Direction::Write => bus.writeresponsevalid(),
            Direction::Read => bus.readdatavalid(),
        };
        if !valid {
            self.phase = Phase::WaitResponse { flight, cycles };
            return Ok(());
        }
        if direction == Direction::Read {
            bus.set_read(false);
            bus.set_address(0);
        }
        self.complete(flight.beat, bus)?;
        self.phase = Phase::Retire;
        Ok(())
    }

    fn complete<B: AvalonBus + ?Sized>(&mut self, beat: Beat, bus: &B) -> Result<(), DriverError> {
        self.check_response(&beat, bus.response())?;

        let BeatOp::Read { expected } = beat.op else {
            return Ok(());
        };
        let mut data = bus.readdata();
        data.resize(self.widths.read_bytes, 0);
        self.sink.on_event(&TraceEvent::ReadCompleted {
            id: beat.id,
            address: beat.byte_address,
            data: data.clone(),
        });
        if let Some(expected) = expected {
            if !le_value_eq(&expected, &data) {
                return Err(DriverError::VerificationMismatch {
                    address: beat.byte_address,
                    expected,
                    actual: data,
                });
            }
        }
        self.responses.push(CompletedRead { id: beat.id, data });
        Ok(())
    }

    fn check_response(&mut self, beat: &Beat, response: u8) -> Result<(), DriverError> {
        if (response != RESPONSE_OKAY) == beat.error_expected {
            return Ok(());
        }
        self.exception_occurred = true;
        let fatal = self.raise_on_error;
        self.sink.on_event(&TraceEvent::ProtocolViolation {
            direction: beat.direction(),
            address: beat.byte_address,
            response,
            error_expected: beat.error_expected,
            fatal,
        });
        if fatal {
            Err(DriverError::ProtocolViolation {
                direction: beat.direction(),
                address: beat.byte_address,
                response,
                error_expected: beat.error_expected,
            })
        } else {
            Ok(())
        }
    }

    fn release_write<B: AvalonBus + ?Sized>(&self, bus: &mut B) {
        bus.set_write(false);
        bus.set_address(0);
        bus.set_writedata(&vec![0; self.widths.write_bytes]);
        bus.set_byteenable(0);
    }

    fn release_bus<B: AvalonBus + ?Sized>(&self, bus: &mut B) {
        bus.set_read(false);
        self.release_write(bus);
    }
}
