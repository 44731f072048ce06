mod decode;
mod encode;
mod errors;

pub use decode::{Decoder, DecodingTable, NormalizedDistribution};
pub use encode::{
    compress, normalize_counts, optimal_table_log, write_normalized_counts,
    CompressionTable, Encoder,
};
pub use errors::Error;

pub const MIN_TABLE_LOG: u8 = 5;
pub const MAX_TABLE_LOG: u8 = 12;
pub const MAX_SYMBOLS: usize = 256;
