mod decode;
mod encode;
mod errors;

pub use decode::{Decoder, DecodingTable};
pub use encode::{
    compress_four_streams, compress_single_stream, CompressionTable, Workspace,
};
pub use errors::Error;

/// Largest code length the literals alphabet may use (RFC 8478 §4.2.1).
pub const MAX_BITS: u8 = 11;

/// Absolute ceiling on any Huffman code length; weights must stay below
/// 13 so they fit a 4-bit nibble.
pub const MAX_TABLE_LOG: u8 = 12;

pub const MAX_SYMBOL: u8 = 255;
pub const MAX_SYMBOL_COUNT: usize = 256;
