//! Public contracts for embedding the driver in a simulation harness.
//!
//! The harness owns signal binding and the clock; the driver only sees them
//! through [`AvalonBus`] and [`Clock`].

use crate::{Direction, DriverError, TransactionId};

/// Default instance name used in trace output.
pub const DEFAULT_MASTER_NAME: &str = "master";

/// Default per-phase timeout budget in clock cycles.
pub const DEFAULT_TIMEOUT_CYCLES: u32 = 1000;

/// Response code for a successful transfer.
pub const RESPONSE_OKAY: u8 = 0b00;

/// How a blocking read treats completed reads that belong to other calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ReadCorrelation {
    /// Leave foreign results queued for their owners.
    #[default]
    Retain,
    /// Pop results in order until the call's last beat, like the classic
    /// driver. Every earlier entry is dropped, including the call's own
    /// earlier beats, so a multi-beat read returns only its last beat.
    ///
    /// Only safe while at most one blocking read is outstanding.
    Discard,
}

/// Constructor-time configuration for a driver instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MasterConfig {
    /// Instance name used to scope trace output.
    pub name: String,
    /// Cycle budget for each accept/response wait; `None` waits forever.
    pub timeout_cycles: Option<u32>,
    /// Treat response-code contract violations as fatal errors.
    pub raise_on_error: bool,
    /// Read-correlation policy for blocking reads.
    pub correlation: ReadCorrelation,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MASTER_NAME.to_string(),
            timeout_cycles: Some(DEFAULT_TIMEOUT_CYCLES),
            raise_on_error: true,
            correlation: ReadCorrelation::Retain,
        }
    }
}

impl MasterConfig {
    /// Creates a default configuration with the given instance name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the timeout using the signed convention where negative disables it.
    #[must_use]
    pub fn with_signed_timeout(mut self, cycles: i64) -> Self {
        // Budgets past u32 saturate.
        self.timeout_cycles = u32::try_from(cycles)
            .ok()
            .or_else(|| (cycles > 0).then_some(u32::MAX));
        self
    }
}

/// Signal-level view of a bound Avalon-MM interface.
///
/// Widths are reported in bits. Data is exchanged as little-endian byte
/// slices of exactly `width / 8` bytes.
pub trait AvalonBus {
    /// Width of the `address` signal (word address bits).
    fn address_width(&self) -> u32;
    /// Width of `writedata`.
    fn write_data_width(&self) -> u32;
    /// Width of `readdata`.
    fn read_data_width(&self) -> u32;
    /// Width of `byteenable`.
    fn byte_enable_width(&self) -> u32;

    /// Drives the `read` strobe.
    fn set_read(&mut self, asserted: bool);
    /// Drives the `write` strobe.
    fn set_write(&mut self, asserted: bool);
    /// Drives the word `address`.
    fn set_address(&mut self, word_address: u64);
    /// Drives `writedata`.
    fn set_writedata(&mut self, data: &[u8]);
    /// Drives `byteenable`.
    fn set_byteenable(&mut self, mask: u128);

    /// Samples `waitrequest`.
    fn waitrequest(&self) -> bool;
    /// Samples `writeresponsevalid`.
    fn writeresponsevalid(&self) -> bool;
    /// Samples `readdatavalid`.
    fn readdatavalid(&self) -> bool;
    /// Samples the `response` code.
    fn response(&self) -> u8;
    /// Samples `readdata`.
    fn readdata(&self) -> Vec<u8>;
}

/// Clock source that advances the simulation to the next rising edge.
///
/// When `rising_edge` returns, the subordinate side of `bus` must reflect
/// the state for the new cycle.
pub trait Clock<B: ?Sized> {
    /// Advances to the next rising edge.
    fn rising_edge(&mut self, bus: &mut B);
}

/// Structured events emitted by the driver in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// Derived bus configuration at construction.
    Configured {
        /// Word address bits.
        address_width: u32,
        /// Write data bits.
        write_data_width: u32,
        /// Read data bits.
        read_data_width: u32,
        /// Byte-enable bits.
        byte_enable_width: u32,
        /// Per-phase timeout budget.
        timeout_cycles: Option<u32>,
    },
    /// A write beat was driven onto the bus.
    WriteIssued {
        /// Beat id.
        id: TransactionId,
        /// Byte address.
        address: u64,
        /// Driven word address.
        word_address: u64,
        /// Driven write data.
        data: Vec<u8>,
    },
    /// A read beat was driven onto the bus.
    ReadIssued {
        /// Beat id.
        id: TransactionId,
        /// Byte address.
        address: u64,
        /// Driven word address.
        word_address: u64,
    },
    /// Read data was captured.
    ReadCompleted {
        /// Beat id.
        id: TransactionId,
        /// Byte address.
        address: u64,
        /// Captured data.
        data: Vec<u8>,
    },
    /// Response code contradicted the caller's expectation.
    ProtocolViolation {
        /// Direction of the offending beat.
        direction: Direction,
        /// Byte address of the offending beat.
        address: u64,
        /// Sampled response code.
        response: u8,
        /// Whether an error was expected.
        error_expected: bool,
        /// Whether the violation aborted the beat.
        fatal: bool,
    },
    /// The engine latched a fatal error.
    Fault {
        /// The latched error.
        error: DriverError,
    },
    /// A blocking read dropped a result that belonged to another call.
    ResponseDiscarded {
        /// Id of the dropped result.
        id: TransactionId,
    },
    /// Queues were cleared by the caller.
    Cleared {
        /// Pending beats dropped.
        pending: usize,
        /// Completed reads dropped.
        completed: usize,
    },
    /// The engine was restarted.
    Restarted {
        /// In-flight beat dropped by the restart.
        dropped: Option<TransactionId>,
    },
}

/// Sink for driver trace events, injected per driver instance.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: &TraceEvent);
}

#[cfg(test)]
mod tests {
    use super::{MasterConfig, ReadCorrelation, DEFAULT_MASTER_NAME, DEFAULT_TIMEOUT_CYCLES};

    #[test]
    fn default_config_matches_driver_contract() {
        let config = MasterConfig::default();

        assert_eq!(config.name, DEFAULT_MASTER_NAME);
        assert_eq!(config.timeout_cycles, Some(DEFAULT_TIMEOUT_CYCLES));
        assert!(config.raise_on_error);
        assert_eq!(config.correlation, ReadCorrelation::Retain);
    }

    #[test]
    fn negative_signed_timeout_disables_budget() {
        let config = MasterConfig::named("dut").with_signed_timeout(-1);
        assert_eq!(config.name, "dut");
        assert_eq!(config.timeout_cycles, None);
    }

    #[test]
    fn non_negative_signed_timeout_is_kept() {
        assert_eq!(
            MasterConfig::default().with_signed_timeout(0).timeout_cycles,
            Some(0)
        );
        assert_eq!(
            MasterConfig::default().with_signed_timeout(250).timeout_cycles,
            Some(250)
        );
        assert_eq!(
            MasterConfig::default()
                .with_signed_timeout(i64::MAX)
                .timeout_cycles,
            Some(u32::MAX)
        );
    }
}
