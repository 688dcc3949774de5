use crate::AvalonBus;

fn mask_bits(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1_u128 << width) - 1
    }
}

fn width_bytes(width: u32) -> usize {
    usize::try_from(width.div_ceil(8)).unwrap_or(usize::MAX)
}

/// Every Avalon-MM signal held as a plain value.
///
/// Master outputs are masked to their widths when driven through
/// [`AvalonBus`]. Subordinate outputs are public fields written directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalBundle {
    address_width: u32,
    write_data_width: u32,
    read_data_width: u32,
    byte_enable_width: u32,
    /// `read` strobe.
    pub read: bool,
    /// `write` strobe.
    pub write: bool,
    /// Word address.
    pub address: u64,
    /// Write payload, little-endian.
    pub writedata: Vec<u8>,
    /// Per-byte write mask.
    pub byteenable: u128,
    /// Backpressure from the subordinate.
    pub waitrequest: bool,
    /// Write response strobe.
    pub writeresponsevalid: bool,
    /// Read data strobe.
    pub readdatavalid: bool,
    /// Response code.
    pub response: u8,
    /// Read result, little-endian.
    pub readdata: Vec<u8>,
}

impl SignalBundle {
    /// Symmetric bus with `data_width`-bit read and write data and one
    /// byte-enable bit per data byte.
    #[must_use]
    pub fn new(address_width: u32, data_width: u32) -> Self {
        Self::with_widths(address_width, data_width, data_width, data_width / 8)
    }

    /// Bus with independent widths for every sized signal.
    #[must_use]
    pub fn with_widths(
        address_width: u32,
        write_data_width: u32,
        read_data_width: u32,
        byte_enable_width: u32,
    ) -> Self {
        Self {
            address_width,
            write_data_width,
            read_data_width,
            byte_enable_width,
            read: false,
            write: false,
            address: 0,
            writedata: vec![0; width_bytes(write_data_width)],
            byteenable: 0,
            waitrequest: false,
            writeresponsevalid: false,
            readdatavalid: false,
            response: 0,
            readdata: vec![0; width_bytes(read_data_width)],
        }
    }

    /// Bytes carried by `writedata`.
    #[must_use]
    pub fn write_bytes(&self) -> usize {
        width_bytes(self.write_data_width)
    }

    /// Bytes carried by `readdata`.
    #[must_use]
    pub fn read_bytes(&self) -> usize {
        width_bytes(self.read_data_width)
    }

    /// Returns `true` while the master drives neither strobe.
    #[must_use]
    pub const fn request_idle(&self) -> bool {
        !self.read && !self.write
    }
}

impl AvalonBus for SignalBundle {
    fn address_width(&self) -> u32 {
        self.address_width
    }

    fn write_data_width(&self) -> u32 {
        self.write_data_width
    }

    fn read_data_width(&self) -> u32 {
        self.read_data_width
    }

    fn byte_enable_width(&self) -> u32 {
        self.byte_enable_width
    }

    fn set_read(&mut self, asserted: bool) {
        self.read = asserted;
    }

    fn set_write(&mut self, asserted: bool) {
        self.write = asserted;
    }

    fn set_address(&mut self, word_address: u64) {
        self.address = if self.address_width >= 64 {
            word_address
        } else {
            word_address & ((1_u64 << self.address_width) - 1)
        };
    }

    fn set_writedata(&mut self, data: &[u8]) {
        let mut driven = data.to_vec();
        driven.resize(self.write_bytes(), 0);
        self.writedata = driven;
    }

    fn set_byteenable(&mut self, mask: u128) {
        self.byteenable = mask & mask_bits(self.byte_enable_width);
    }

    fn waitrequest(&self) -> bool {
        self.waitrequest
    }

    fn writeresponsevalid(&self) -> bool {
        self.writeresponsevalid
    }

    fn readdatavalid(&self) -> bool {
        self.readdatavalid
    }

    fn response(&self) -> u8 {
        self.response
    }

    fn readdata(&self) -> Vec<u8> {
        self.readdata.clone()
    }
}
