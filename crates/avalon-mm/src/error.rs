use std::fmt::Write as _;

use thiserror::Error;

use crate::Direction;

/// Error classes used for reporting and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorKind {
    /// Word address did not fit the bound address signal.
    AddressOutOfRange,
    /// `waitrequest` stayed asserted past the timeout budget.
    AcceptTimeout,
    /// The response strobe never arrived within the timeout budget.
    ResponseTimeout,
    /// Response code disagreed with the caller's `error_expected` flag.
    ProtocolViolation,
    /// Captured read data differed from the caller's expected value.
    VerificationMismatch,
    /// Bound bus signals have widths the driver cannot drive.
    Configuration,
}

/// Failure taxonomy for the transaction engine and its caller surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum DriverError {
    /// Byte address converts to a word address beyond `2^address_width`.
    #[error(
        "address out of range: byte_addr=0x{byte_address:x}, word_addr=0x{word_address:x} \
         ({address_width}-bit word address)"
    )]
    AddressOutOfRange {
        /// Byte address supplied by the caller.
        byte_address: u64,
        /// Word address derived from `byte_address`.
        word_address: u64,
        /// Width of the bound address signal in bits.
        address_width: u32,
    },
    /// A beat of a multi-beat payload would start past `u64::MAX`.
    #[error(
        "address out of range: byte_addr=0x{address:x} + 0x{offset:x} overflows the byte address space"
    )]
    AddressOverflow {
        /// Base byte address supplied by the caller.
        address: u64,
        /// Byte offset of the first beat that does not fit.
        offset: u64,
    },
    /// Subordinate kept `waitrequest` asserted for the whole budget.
    #[error("{direction} timeout: waitrequest asserted for {cycles} cycles (addr=0x{address:08x})")]
    AcceptTimeout {
        /// Direction of the stalled beat.
        direction: Direction,
        /// Byte address of the stalled beat.
        address: u64,
        /// Cycles counted since entering the accept wait.
        cycles: u32,
    },
    /// No `writeresponsevalid`/`readdatavalid` within the budget.
    #[error(
        "{direction} response timeout: no {} after {cycles} cycles (addr=0x{address:08x})",
        .direction.response_strobe()
    )]
    ResponseTimeout {
        /// Direction of the beat awaiting its response.
        direction: Direction,
        /// Byte address of the beat awaiting its response.
        address: u64,
        /// Cycles counted since entering the response wait.
        cycles: u32,
    },
    /// Response code contradicts the `error_expected` contract.
    #[error("{direction}: {}", violation_message(.response, .error_expected))]
    ProtocolViolation {
        /// Direction of the offending beat.
        direction: Direction,
        /// Byte address of the offending beat.
        address: u64,
        /// Response code sampled from the bus.
        response: u8,
        /// Whether the caller expected an error response.
        error_expected: bool,
    },
    /// Read data did not equal the caller-supplied expectation.
    #[error(
        "expected 0x{} doesn't match returned 0x{} (addr=0x{address:08x})",
        hex_le(.expected),
        hex_le(.actual)
    )]
    VerificationMismatch {
        /// Byte address of the verified beat.
        address: u64,
        /// Expected value, little-endian bytes.
        expected: Vec<u8>,
        /// Sampled `readdata`, little-endian bytes.
        actual: Vec<u8>,
    },
    /// A bound signal width is outside what the driver supports.
    #[error("unsupported {signal} width: {width} bits")]
    UnsupportedWidth {
        /// Signal name as listed in the bus contract.
        signal: &'static str,
        /// Width reported by the bus binding.
        width: u32,
    },
}

impl DriverError {
    /// Returns the reporting class for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AddressOutOfRange { .. } | Self::AddressOverflow { .. } => {
                ErrorKind::AddressOutOfRange
            }
            Self::AcceptTimeout { .. } => ErrorKind::AcceptTimeout,
            Self::ResponseTimeout { .. } => ErrorKind::ResponseTimeout,
            Self::ProtocolViolation { .. } => ErrorKind::ProtocolViolation,
            Self::VerificationMismatch { .. } => ErrorKind::VerificationMismatch,
            Self::UnsupportedWidth { .. } => ErrorKind::Configuration,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn violation_message(response: &u8, error_expected: &bool) -> String {
    if *error_expected {
        "Expected error but got OK response".to_string()
    } else {
        format!("Unexpected error response: 0x{response:x}")
    }
}

/// Formats little-endian bytes as a big-endian hex literal body.
///
/// Always prints at least eight digits so short words read like bus values.
#[must_use]
pub fn hex_le(bytes: &[u8]) -> String {
    let digits = bytes.iter().rev().fold(String::new(), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    });
    let trimmed = digits.trim_start_matches('0');
    format!("{trimmed:0>8}")
}
