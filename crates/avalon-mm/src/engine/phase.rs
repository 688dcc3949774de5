use crate::{Beat, DriverError};

/// A beat currently owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// The beat being driven.
    pub beat: Beat,
    /// Word address derived at issue.
    pub word_address: u64,
}

/// Engine control-flow position; every variant except `WaitForWork` waits on a clock edge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// Freshly (re)started; serves nothing until the first edge.
    #[default]
    Reset,
    /// Idle; picks up the next beat as soon as one is queued.
    WaitForWork,
    /// Read setup cycle before the request strobe is driven.
    ReadSetup(InFlight),
    /// Request driven; sampled after the next edge.
    Issued(InFlight),
    /// Subordinate is holding `waitrequest`.
    WaitAccept {
        /// Beat waiting for acceptance.
        flight: InFlight,
        /// Edges counted in this phase.
        cycles: u32,
    },
    /// Request accepted; waiting for the response strobe.
    WaitResponse {
        /// Beat waiting for its response.
        flight: InFlight,
        /// Edges counted in this phase.
        cycles: u32,
    },
    /// Beat finished; one edge before the next beat may issue.
    Retire,
    /// A fatal error was raised; only a restart leaves this state.
    Halted(DriverError),
}

impl Phase {
    /// Returns the beat owned by the engine in this phase, if any.
    #[must_use]
    pub const fn in_flight(&self) -> Option<&Beat> {
        match self {
            Self::ReadSetup(flight)
            | Self::Issued(flight)
            | Self::WaitAccept { flight, .. }
            | Self::WaitResponse { flight, .. } => Some(&flight.beat),
            Self::Reset | Self::WaitForWork | Self::Retire | Self::Halted(_) => None,
        }
    }

    /// Returns the latched error, if this phase is halted.
    #[must_use]
    pub const fn latched_error(&self) -> Option<&DriverError> {
        match self {
            Self::Halted(error) => Some(error),
            _ => None,
        }
    }

    /// Returns `true` when the engine can accept new work without an edge.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Reset | Self::WaitForWork)
    }
}
