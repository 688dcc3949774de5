//! Cycle-accurate Avalon-MM manager driver.
//!
//! Payloads are split into bus-width beats, queued, and driven one at a time
//! against a bound [`AvalonBus`], advancing a [`Clock`] edge by edge.

/// Error taxonomy and classification.
pub mod error;
pub use error::{hex_le, DriverError, ErrorKind};

/// Payloads, beats, and the beat splitter.
pub mod beat;
pub use beat::{
    split_read, split_write, Beat, BeatOp, CompletedRead, Direction, Payload, ReadChunk,
    TransactionId, WriteChunk,
};

/// Configuration, bus and clock seams, and trace surface.
pub mod api;
pub use api::{
    AvalonBus, Clock, MasterConfig, ReadCorrelation, TraceEvent, TraceSink, DEFAULT_MASTER_NAME,
    DEFAULT_TIMEOUT_CYCLES, RESPONSE_OKAY,
};

/// Pending-beat and completed-read queues.
pub mod queue;
pub use queue::{ResponseQueue, TransactionQueue};

/// Single-beat transaction engine.
pub mod engine;
pub use engine::{BusWidths, DriverEngine, InFlight, Phase};

/// Default `log`-backed trace sink.
pub mod trace;
pub use trace::{LogSink, LOG_TARGET};

/// Caller-facing manager front end.
pub mod master;
pub use master::{AvalonMaster, ReadOptions, WriteOptions};

/// Plain-value bus model and a memory subordinate for tests and demos.
pub mod sim;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
