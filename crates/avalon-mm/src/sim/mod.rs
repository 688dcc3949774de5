//! [`SignalBundle`] stands in for a bound signal interface and
//! [`MemorySubordinate`] plays both the clock and the device behind it.

mod memory;
mod signals;

pub use memory::{BusTransfer, MemorySubordinate, RESPONSE_SLVERR};
pub use signals::SignalBundle;
