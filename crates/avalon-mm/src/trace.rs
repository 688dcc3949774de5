//! Default trace sink rendering driver events through the `log` facade.

use log::{debug, error, info, warn};

use crate::error::{hex_le, violation_message};
use crate::{TraceEvent, TraceSink};

/// Log target used for every record emitted by [`LogSink`].
pub const LOG_TARGET: &str = "avalon_mm";

/// Forwards [`TraceEvent`]s to `log`, prefixed with the instance name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Creates a sink scoped to `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Instance name used as the record prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TraceSink for LogSink {
    fn on_event(&mut self, event: &TraceEvent) {
        let name = &self.name;
        match event {
            TraceEvent::Configured {
                address_width,
                write_data_width,
                read_data_width,
                byte_enable_width,
                timeout_cycles,
            } => {
                info!(target: LOG_TARGET, "{name}: Avalon-MM master configuration:");
                info!(target: LOG_TARGET, "{name}:   Address width: {address_width} bits");
                info!(target: LOG_TARGET, "{name}:   Write data width: {write_data_width} bits");
                info!(target: LOG_TARGET, "{name}:   Read data width: {read_data_width} bits");
                info!(target: LOG_TARGET, "{name}:   Byte enable width: {byte_enable_width} bits");
                match timeout_cycles {
                    Some(cycles) => {
                        info!(target: LOG_TARGET, "{name}:   Timeout: {cycles} cycles");
                    }
                    None => info!(target: LOG_TARGET, "{name}:   Timeout: disabled"),
                }
            }
            TraceEvent::WriteIssued {
                id,
                address,
                word_address,
                data,
            } => info!(
                target: LOG_TARGET,
                "{name}: Write {id} start addr: 0x{address:08x} (word 0x{word_address:x}) data: 0x{}",
                hex_le(data)
            ),
            TraceEvent::ReadIssued {
                id,
                address,
                word_address,
            } => info!(
                target: LOG_TARGET,
                "{name}: Read {id} start addr: 0x{address:08x} (word 0x{word_address:x})"
            ),
            TraceEvent::ReadCompleted { id, address, data } => info!(
                target: LOG_TARGET,
                "{name}: Read {id} complete addr: 0x{address:08x} data: 0x{}",
                hex_le(data)
            ),
            TraceEvent::ProtocolViolation { .. } => {
                if let Some(line) = soft_violation_line(name, event) {
                    warn!(target: LOG_TARGET, "{line}");
                }
            }
            TraceEvent::Fault { error } => {
                error!(target: LOG_TARGET, "{name}: {error}");
            }
            TraceEvent::ResponseDiscarded { id } => {
                debug!(target: LOG_TARGET, "{name}: dropped unclaimed read {id}");
            }
            TraceEvent::Cleared { pending, completed } => debug!(
                target: LOG_TARGET,
                "{name}: cleared {pending} pending beat(s) and {completed} completed read(s)"
            ),
            TraceEvent::Restarted { dropped } => match dropped {
                Some(id) => debug!(target: LOG_TARGET, "{name}: restarted, dropped beat {id}"),
                None => debug!(target: LOG_TARGET, "{name}: restarted"),
            },
        }
    }
}

/// Renders a non-fatal protocol violation. Fatal ones are reported by the
/// `Fault` that follows them.
fn soft_violation_line(name: &str, event: &TraceEvent) -> Option<String> {
    match event {
        TraceEvent::ProtocolViolation {
            direction,
            address,
            response,
            error_expected,
            fatal: false,
        } => Some(format!(
            "{name}: {direction} 0x{address:08x}: {}",
            violation_message(response, error_expected)
        )),
        _ => None,
    }
}
