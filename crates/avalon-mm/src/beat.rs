//! Beat model and the splitter that cuts caller payloads into bus-width beats.
//!
//! A beat is one bus word of a request. Payloads are little-endian: beat `i`
//! carries bytes `i * width .. (i + 1) * width` and targets byte address
//! `base + i * width`.

use std::fmt;

use crate::DriverError;

/// Transfer direction of a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// Manager drives `write`, `writedata` and `byteenable`.
    Write,
    /// Manager drives `read` and samples `readdata`.
    Read,
}

impl Direction {
    /// Name of the response strobe that completes a beat in this direction.
    #[must_use]
    pub const fn response_strobe(self) -> &'static str {
        match self {
            Self::Write => "writeresponsevalid",
            Self::Read => "readdatavalid",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("Write"),
            Self::Read => f.write_str("Read"),
        }
    }
}

/// Identifier assigned to a beat at enqueue time.
///
/// Ids are strictly increasing for the lifetime of an engine and are never
/// reused, not even after the queues are cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Data argument accepted by writes and read verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Payload {
    /// Unsigned integer of arbitrary size.
    Integer {
        /// Little-endian magnitude with no trailing zero bytes.
        value: Vec<u8>,
        /// Number of significant bits in `value` (0 for zero).
        bit_width: usize,
    },
    /// Explicit byte string, sent in order.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Builds an integer payload from little-endian bytes of any length.
    #[must_use]
    pub fn integer_le(bytes: impl Into<Vec<u8>>) -> Self {
        let mut value = bytes.into();
        while value.last() == Some(&0) {
            value.pop();
        }
        let bit_width = value.last().map_or(0, |top| {
            (value.len() - 1) * 8 + (8 - top.leading_zeros() as usize)
        });
        Self::Integer { value, bit_width }
    }

    /// Builds an explicit byte-string payload.
    #[must_use]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Number of beats this payload occupies on a bus of `width_bytes`.
    ///
    /// Integers take at least one beat, even when zero. Byte strings take
    /// `ceil(len / width_bytes)` beats, so an empty string takes none.
    #[must_use]
    pub fn beat_count(&self, width_bytes: usize) -> usize {
        match self {
            Self::Integer { bit_width, .. } => bit_width.div_ceil(width_bytes * 8).max(1),
            Self::Bytes(bytes) => bytes.len().div_ceil(width_bytes),
        }
    }

    fn raw(&self) -> &[u8] {
        match self {
            Self::Integer { value, .. } => value,
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Returns bus word `index`, zero-padded to exactly `width_bytes`.
    #[must_use]
    pub fn word(&self, index: usize, width_bytes: usize) -> Vec<u8> {
        let raw = self.raw();
        let start = (index * width_bytes).min(raw.len());
        let end = ((index + 1) * width_bytes).min(raw.len());
        let mut word = raw[start..end].to_vec();
        word.resize(width_bytes, 0);
        word
    }
}

macro_rules! integer_payload_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Self::integer_le(value.to_le_bytes())
                }
            }
        )*
    };
}

integer_payload_from!(u8, u16, u32, u64, u128);

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Payload {
    fn from(bytes: [u8; N]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Request-specific part of a beat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BeatOp {
    /// Write one bus word.
    Write {
        /// Exactly one write-data word, little-endian.
        data: Vec<u8>,
        /// Byte-enable mask; `None` enables every byte.
        byte_enable: Option<u128>,
    },
    /// Read one bus word.
    Read {
        /// Value the returned data must equal, when verification is requested.
        expected: Option<Vec<u8>>,
    },
}

/// One queued bus-width transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Beat {
    /// Identifier assigned at enqueue time.
    pub id: TransactionId,
    /// Byte address; converted to a word address at issue.
    pub byte_address: u64,
    /// Direction-specific request data.
    pub op: BeatOp,
    /// Whether the subordinate is expected to answer with an error code.
    pub error_expected: bool,
}

impl Beat {
    /// Returns the beat's transfer direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self.op {
            BeatOp::Write { .. } => Direction::Write,
            BeatOp::Read { .. } => Direction::Read,
        }
    }
}

/// Result of a finished read beat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CompletedRead {
    /// Id of the read beat that produced this result.
    pub id: TransactionId,
    /// Sampled `readdata`, exactly one read-data word.
    pub data: Vec<u8>,
}

/// A write beat before an id has been assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteChunk {
    /// Byte address of this beat.
    pub byte_address: u64,
    /// One write-data word.
    pub data: Vec<u8>,
}

/// A read beat before an id has been assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadChunk {
    /// Byte address of this beat.
    pub byte_address: u64,
    /// Expected data for verification.
    pub expected: Option<Vec<u8>>,
}

fn beat_address(base: u64, index: usize, width_bytes: usize) -> Result<u64, DriverError> {
    let offset = index
        .checked_mul(width_bytes)
        .and_then(|offset| u64::try_from(offset).ok());
    offset
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| DriverError::AddressOverflow {
            address: base,
            offset: offset.unwrap_or(u64::MAX),
        })
}

/// Splits a write payload into bus-width chunks.
///
/// Concatenating the chunk data in order and reading it little-endian
/// reproduces `payload` (zero-padded up to the last beat).
///
/// # Errors
///
/// Returns [`DriverError::AddressOverflow`] when a beat would start past the
/// end of the 64-bit byte address space.
pub fn split_write(
    address: u64,
    payload: &Payload,
    width_bytes: usize,
) -> Result<Vec<WriteChunk>, DriverError> {
    (0..payload.beat_count(width_bytes))
        .map(|index| {
            Ok(WriteChunk {
                byte_address: beat_address(address, index, width_bytes)?,
                data: payload.word(index, width_bytes),
            })
        })
        .collect()
}

/// Splits a read request into bus-width chunks.
///
/// Without an expectation, or with an empty byte string, this is one
/// unverified beat. A byte-string expectation is one beat verified against
/// the whole string. An integer expectation is split with the read width
/// exactly like a write, and every beat is verified.
///
/// # Errors
///
/// Returns [`DriverError::AddressOverflow`] when a beat would start past the
/// end of the 64-bit byte address space.
pub fn split_read(
    address: u64,
    expected: Option<&Payload>,
    width_bytes: usize,
) -> Result<Vec<ReadChunk>, DriverError> {
    match expected {
        Some(payload @ Payload::Integer { .. }) => (0..payload.beat_count(width_bytes))
            .map(|index| {
                Ok(ReadChunk {
                    byte_address: beat_address(address, index, width_bytes)?,
                    expected: Some(payload.word(index, width_bytes)),
                })
            })
            .collect(),
        Some(Payload::Bytes(bytes)) if !bytes.is_empty() => Ok(vec![ReadChunk {
            byte_address: address,
            expected: Some(bytes.clone()),
        }]),
        Some(Payload::Bytes(_)) | None => Ok(vec![ReadChunk {
            byte_address: address,
            expected: None,
        }]),
    }
}

/// Compares two little-endian values, ignoring zero padding.
#[must_use]
pub fn le_value_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    (0..len).all(|i| a.get(i).copied().unwrap_or(0) == b.get(i).copied().unwrap_or(0))
}
