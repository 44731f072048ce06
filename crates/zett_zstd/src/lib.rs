use zett_foundation::const_assert;

mod block;
mod codes;
mod compress;
mod context;
mod decompress;
mod errors;
mod execution;
mod frame;
mod literals;
mod sequences;

pub use compress::{Compressor, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL};
pub use decompress::Decompressor;
pub use errors::{Error, FrameError};

pub const MAGIC_NUMBER: u32 = 0xFD2F_B528;

/// Legacy v0.7 frames are recognized only to produce a diagnostic.
pub const MAGIC_NUMBER_V07: u32 = 0xFD2F_B527;

/// Skippable frames occupy sixteen magic values; the low nibble is free.
pub const SKIPPABLE_MAGIC_BASE: u32 = 0x184D_2A50;

pub const MIN_WINDOW_LOG: u8 = 10;
pub const MAX_WINDOW_LOG: u8 = 23;
pub const MIN_WINDOW_SIZE: u64 = 1 << MIN_WINDOW_LOG;
pub const MAX_WINDOW_SIZE: u64 = 1 << MAX_WINDOW_LOG;
pub const WINDOW_SIZE_RANGE: std::ops::RangeInclusive<u64> =
    MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE;

pub const MAX_BLOCK_SIZE: usize = 128 * 1024;
pub const MIN_BLOCK_SIZE: usize = 3;
pub const SIZE_OF_BLOCK_HEADER: usize = 3;

/// Per-channel FSE configuration: the accuracy-log ceiling for tables read
/// from the stream, and the predefined distribution from RFC 8878.
pub struct SequenceChannel {
    max_accuracy_log: u8,
    predefined_accuracy_log: u8,
    predefined_counts: &'static [i16],
    max_symbol: u8,
}

impl SequenceChannel {
    pub const fn max_accuracy_log(&self) -> u8 {
        self.max_accuracy_log
    }

    pub const fn predefined_accuracy_log(&self) -> u8 {
        self.predefined_accuracy_log
    }

    pub const fn predefined_counts(&self) -> &'static [i16] {
        self.predefined_counts
    }

    pub const fn max_symbol(&self) -> u8 {
        self.max_symbol
    }

    pub const fn table_size(&self) -> usize {
        1 << self.max_accuracy_log
    }
}

pub const LITERALS_LENGTH_CHANNEL: SequenceChannel = SequenceChannel {
    max_accuracy_log: 9,
    predefined_accuracy_log: 6,
    max_symbol: 35,
    predefined_counts: &[
        4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2,
        1, 1, 1, 1, 1, -1, -1, -1, -1,
    ],
};
const_assert!(LITERALS_LENGTH_CHANNEL.predefined_counts().len() == 36);

pub const MATCH_LENGTH_CHANNEL: SequenceChannel = SequenceChannel {
    max_accuracy_log: 9,
    predefined_accuracy_log: 6,
    max_symbol: 52,
    predefined_counts: &[
        1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1,
        -1,
    ],
};
const_assert!(MATCH_LENGTH_CHANNEL.predefined_counts().len() == 53);

pub const OFFSET_CHANNEL: SequenceChannel = SequenceChannel {
    max_accuracy_log: 8,
    predefined_accuracy_log: 5,
    max_symbol: 31,
    predefined_counts: &[
        1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1,
        -1, -1, -1,
    ],
};
const_assert!(OFFSET_CHANNEL.predefined_counts().len() == 29);

pub(crate) const LITERALS_LENGTH_TABLE_SIZE: usize =
    LITERALS_LENGTH_CHANNEL.table_size();
pub(crate) const MATCH_LENGTH_TABLE_SIZE: usize = MATCH_LENGTH_CHANNEL.table_size();
pub(crate) const OFFSET_TABLE_SIZE: usize = OFFSET_CHANNEL.table_size();
