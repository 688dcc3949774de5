use crate::{AvalonBus, DriverError};

/// Bus geometry derived from the bound signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusWidths {
    /// Word address bits.
    pub address_width: u32,
    /// Bytes per write-data word; also the word-address divisor.
    pub write_bytes: usize,
    /// Bytes per read-data word.
    pub read_bytes: usize,
    /// Byte-enable bits.
    pub byte_enable_width: u32,
}

fn data_bytes(signal: &'static str, width: u32) -> Result<usize, DriverError> {
    if width == 0 || width % 8 != 0 {
        return Err(DriverError::UnsupportedWidth { signal, width });
    }
    usize::try_from(width / 8).map_err(|_| DriverError::UnsupportedWidth { signal, width })
}

impl BusWidths {
    /// Derives and validates widths from a bus binding.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::UnsupportedWidth`] when the address is not
    /// 1..=64 bits, a data bus is not a non-zero multiple of 8 bits, or the
    /// byte enable is not 1..=128 bits.
    pub fn from_bus<B: AvalonBus + ?Sized>(bus: &B) -> Result<Self, DriverError> {
        let address_width = bus.address_width();
        if !(1..=64).contains(&address_width) {
            return Err(DriverError::UnsupportedWidth {
                signal: "address",
                width: address_width,
            });
        }
        let byte_enable_width = bus.byte_enable_width();
        if !(1..=128).contains(&byte_enable_width) {
            return Err(DriverError::UnsupportedWidth {
                signal: "byteenable",
                width: byte_enable_width,
            });
        }

        Ok(Self {
            address_width,
            write_bytes: data_bytes("writedata", bus.write_data_width())?,
            read_bytes: data_bytes("readdata", bus.read_data_width())?,
            byte_enable_width,
        })
    }

    /// Converts a byte address to the driven word address.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AddressOutOfRange`] when the word address does
    /// not fit in `address_width` bits.
    pub fn word_address(&self, byte_address: u64) -> Result<u64, DriverError> {
        let divisor = u64::try_from(self.write_bytes).unwrap_or(u64::MAX);
        let word_address = byte_address / divisor;
        if self.address_width < 64 && word_address >> self.address_width != 0 {
            return Err(DriverError::AddressOutOfRange {
                byte_address,
                word_address,
                address_width: self.address_width,
            });
        }
        Ok(word_address)
    }

    /// Mask with every byte lane enabled.
    #[must_use]
    pub const fn all_enabled(&self) -> u128 {
        u128::MAX >> (128 - self.byte_enable_width)
    }

    /// Resolves a caller mask: `None` enables everything, otherwise truncate.
    #[must_use]
    pub const fn byte_enable(&self, mask: Option<u128>) -> u128 {
        match mask {
            Some(mask) => mask & self.all_enabled(),
            None => self.all_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BusWidths;
    use crate::sim::SignalBundle;
    use crate::{DriverError, ErrorKind};

    const WIDTHS_32: BusWidths = BusWidths {
        address_width: 16,
        write_bytes: 4,
        read_bytes: 4,
        byte_enable_width: 4,
    };

    #[test]
    fn widths_derive_from_signal_bundle() {
        let bus = SignalBundle::new(16, 32);
        assert_eq!(BusWidths::from_bus(&bus), Ok(WIDTHS_32));
    }

    #[test]
    fn non_byte_multiple_data_width_is_rejected() {
        let bus = SignalBundle::with_widths(16, 12, 32, 4);
        assert_eq!(
            BusWidths::from_bus(&bus),
            Err(DriverError::UnsupportedWidth {
                signal: "writedata",
                width: 12
            })
        );
    }

    #[test]
    fn oversized_address_and_byte_enable_are_rejected() {
        let wide_address = SignalBundle::with_widths(65, 32, 32, 4);
        assert_eq!(
            BusWidths::from_bus(&wide_address).map_err(|e| e.kind()),
            Err(ErrorKind::Configuration)
        );
        let wide_enable = SignalBundle::with_widths(16, 32, 32, 129);
        assert_eq!(
            BusWidths::from_bus(&wide_enable),
            Err(DriverError::UnsupportedWidth {
                signal: "byteenable",
                width: 129
            })
        );
    }

    #[test]
    fn word_address_divides_by_write_width() {
        assert_eq!(WIDTHS_32.word_address(0x10), Ok(0x4));
        assert_eq!(WIDTHS_32.word_address(0x13), Ok(0x4));
        assert_eq!(WIDTHS_32.word_address(0x3_FFFC), Ok(0xFFFF));
        assert_eq!(
            WIDTHS_32.word_address(0x4_0000),
            Err(DriverError::AddressOutOfRange {
                byte_address: 0x4_0000,
                word_address: 0x1_0000,
                address_width: 16
            })
        );
    }

    #[test]
    fn full_width_address_accepts_every_word() {
        let widths = BusWidths {
            address_width: 64,
            ..WIDTHS_32
        };
        assert_eq!(widths.word_address(u64::MAX), Ok(u64::MAX / 4));
    }

    #[test]
    fn byte_enable_defaults_to_all_and_truncates() {
        assert_eq!(WIDTHS_32.all_enabled(), 0xF);
        assert_eq!(WIDTHS_32.byte_enable(None), 0xF);
        assert_eq!(WIDTHS_32.byte_enable(Some(0b0101)), 0b0101);
        assert_eq!(WIDTHS_32.byte_enable(Some(0xFF3)), 0x3);

        let widest = BusWidths {
            byte_enable_width: 128,
            ..WIDTHS_32
        };
        assert_eq!(widest.all_enabled(), u128::MAX);
    }
}
