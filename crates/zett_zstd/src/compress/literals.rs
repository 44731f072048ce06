use zett_foundation::Histogram;

use super::parameters::{CompressionParameters, Strategy};
use crate::Error;

const RAW_LITERALS_BLOCK: u32 = 0;
const RLE_LITERALS_BLOCK: u32 = 1;
const COMPRESSED_LITERALS_BLOCK: u32 = 2;
const TREELESS_LITERALS_BLOCK: u32 = 3;

/// Skip Huffman coding below this size; the table rarely pays for itself.
const MINIMUM_LITERALS_SIZE: usize = 63;

/// Huffman state carried across the blocks of one frame: the confirmed
/// table of the last compressed literals section (reusable via TREELESS
/// blocks) plus a scratch table for candidate code books. The swap between
/// them only happens when the surrounding block commits.
pub(crate) struct HuffmanContext {
    tables: [zett_huff0::CompressionTable; 2],
    previous: usize,
    previous_valid: bool,
    pending_swap: bool,
    counts: [u32; 256],
    workspace: zett_huff0::Workspace,
}

impl HuffmanContext {
    pub fn new() -> Self {
        Self {
            tables: [
                zett_huff0::CompressionTable::new(),
                zett_huff0::CompressionTable::new(),
            ],
            previous: 0,
            previous_valid: false,
            pending_swap: false,
            counts: [0; 256],
            workspace: zett_huff0::Workspace::new(),
        }
    }

    pub fn reset_frame(&mut self) {
        self.previous_valid = false;
        self.pending_swap = false;
    }

    /// The block was emitted as compressed; whatever table it used becomes
    /// the previous table.
    pub fn save_changes(&mut self) {
        if self.pending_swap {
            self.previous ^= 1;
            self.previous_valid = true;
        }
        self.pending_swap = false;
    }

    /// The block fell back to raw; the candidate table never reached the
    /// wire.
    pub fn rollback(&mut self) {
        self.pending_swap = false;
    }
}

/// Encode one block's literals: raw, RLE, or Huffman (fresh table or
/// treeless reuse), whichever is estimated cheapest. Returns the bytes
/// written to `dst`.
pub(crate) fn encode_literals(
    huffman: &mut HuffmanContext,
    params: &CompressionParameters,
    dst: &mut [u8],
    literals: &[u8],
) -> Result<usize, Error> {
    let bypass_compression =
        params.strategy == Strategy::Fast && params.target_length > 0;
    if bypass_compression || literals.len() <= MINIMUM_LITERALS_SIZE {
        return raw_literals(dst, literals);
    }

    let header_size = 3
        + (literals.len() >= 1024) as usize
        + (literals.len() >= 16384) as usize;

    if dst.len() < header_size + 1 {
        return Err(Error::OutputTooSmall {
            required: header_size + 1,
        });
    }

    let HuffmanContext {
        tables,
        previous,
        previous_valid,
        pending_swap,
        counts,
        workspace,
    } = huffman;

    Histogram::count(literals, counts);
    let max_symbol = Histogram::find_max_symbol(counts, 255);
    let largest_count = Histogram::find_largest_count(counts, max_symbol);

    if largest_count as usize == literals.len() {
        // all bytes equal
        return rle_literals(dst, literals);
    }
    if largest_count as usize <= (literals.len() >> 7) + 4 {
        // too flat to be worth a table
        return raw_literals(dst, literals);
    }

    let can_reuse = *previous_valid && tables[*previous].is_valid(counts, max_symbol);
    let prefer_reuse =
        params.strategy == Strategy::Fast && literals.len() <= 1024;

    let temp = *previous ^ 1;
    let (table_index, reuse, serialized_size);

    if prefer_reuse && can_reuse {
        table_index = *previous;
        reuse = true;
        serialized_size = 0;
    } else {
        let table_log = zett_huff0::CompressionTable::optimal_number_of_bits(
            zett_huff0::MAX_BITS,
            literals.len(),
            max_symbol,
        );

        if tables[temp]
            .initialize(counts, max_symbol, table_log, workspace)
            .is_err()
        {
            return raw_literals(dst, literals);
        }

        let new_size = match tables[temp].write(&mut dst[header_size..], workspace) {
            Ok(size) => size,
            Err(_) => return raw_literals(dst, literals),
        };

        // an existing table may beat a fresh one once its description
        // cost is counted
        if can_reuse
            && tables[*previous].estimate_compressed_size(counts, max_symbol)
                <= new_size + tables[temp].estimate_compressed_size(counts, max_symbol)
        {
            table_index = *previous;
            reuse = true;
            serialized_size = 0;
        } else {
            table_index = temp;
            reuse = false;
            serialized_size = new_size;
        }
    }

    let table = &tables[table_index];
    let single_stream = literals.len() < 256;
    let payload = &mut dst[header_size + serialized_size..];

    let compressed_size = match if single_stream {
        zett_huff0::compress_single_stream(payload, literals, table)
    } else {
        zett_huff0::compress_four_streams(payload, literals, table)
    } {
        Ok(size) => size,
        Err(_) => return raw_literals(dst, literals),
    };

    let total_size = serialized_size + compressed_size;
    let minimum_gain = (literals.len() >> 6) + 2;

    if compressed_size == 0 || total_size >= literals.len() - minimum_gain {
        // incompressible or no savings
        return raw_literals(dst, literals);
    }

    if !reuse {
        *pending_swap = true;
    }

    let encoding_type = if reuse {
        TREELESS_LITERALS_BLOCK
    } else {
        COMPRESSED_LITERALS_BLOCK
    };

    let lit_len = literals.len() as u32;
    let total = total_size as u32;
    match header_size {
        3 => {
            // 2-2-10-10
            let stream_flag = u32::from(!single_stream);
            let header = encoding_type | (stream_flag << 2) | (lit_len << 4) | (total << 14);
            dst[..3].copy_from_slice(&header.to_le_bytes()[..3]);
        }
        4 => {
            // 2-2-14-14
            let header = encoding_type | (2 << 2) | (lit_len << 4) | (total << 18);
            dst[..4].copy_from_slice(&header.to_le_bytes());
        }
        _ => {
            // 2-2-18-18
            let header = encoding_type | (3 << 2) | (lit_len << 4) | (total << 22);
            dst[..4].copy_from_slice(&header.to_le_bytes());
            dst[4] = (total >> 10) as u8;
        }
    }

    Ok(header_size + total_size)
}

fn raw_literals(dst: &mut [u8], literals: &[u8]) -> Result<usize, Error> {
    let size = literals.len();
    let header_size = 1 + (size >= 32) as usize + (size >= 4096) as usize;

    if dst.len() < header_size + size {
        return Err(Error::OutputTooSmall {
            required: header_size + size,
        });
    }

    match header_size {
        1 => dst[0] = (RAW_LITERALS_BLOCK | ((size as u32) << 3)) as u8,
        2 => {
            let header = (RAW_LITERALS_BLOCK | (1 << 2) | ((size as u32) << 4)) as u16;
            dst[..2].copy_from_slice(&header.to_le_bytes());
        }
        _ => {
            let header = RAW_LITERALS_BLOCK | (3 << 2) | ((size as u32) << 4);
            dst[..3].copy_from_slice(&header.to_le_bytes()[..3]);
        }
    }

    dst[header_size..header_size + size].copy_from_slice(literals);
    Ok(header_size + size)
}

fn rle_literals(dst: &mut [u8], literals: &[u8]) -> Result<usize, Error> {
    let size = literals.len();
    let header_size = 1 + (size > 31) as usize + (size > 4095) as usize;

    if dst.len() < header_size + 1 {
        return Err(Error::OutputTooSmall {
            required: header_size + 1,
        });
    }

    match header_size {
        1 => dst[0] = (RLE_LITERALS_BLOCK | ((size as u32) << 3)) as u8,
        2 => {
            let header = (RLE_LITERALS_BLOCK | (1 << 2) | ((size as u32) << 4)) as u16;
            dst[..2].copy_from_slice(&header.to_le_bytes());
        }
        _ => {
            let header = RLE_LITERALS_BLOCK | (3 << 2) | ((size as u32) << 4);
            dst[..3].copy_from_slice(&header.to_le_bytes()[..3]);
        }
    }

    dst[header_size] = literals[0];
    Ok(header_size + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DecodeContext;

    fn params() -> CompressionParameters {
        CompressionParameters::compute(3, 1 << 16).unwrap()
    }

    fn decode_roundtrip(encoded: &[u8], ctx: &mut DecodeContext, expected: &[u8]) {
        let consumed = crate::literals::decode(ctx, encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(&ctx.literals_buf[..ctx.literals_len], expected);
    }

    #[test]
    fn test_small_literals_stay_raw() {
        let mut huffman = HuffmanContext::new();
        let mut dst = vec![0u8; 256];

        let literals = b"tiny";
        let written =
            encode_literals(&mut huffman, &params(), &mut dst, literals).unwrap();

        let mut ctx = DecodeContext::new();
        decode_roundtrip(&dst[..written], &mut ctx, literals);
    }

    #[test]
    fn test_constant_literals_become_rle() {
        let mut huffman = HuffmanContext::new();
        let mut dst = vec![0u8; 4096];

        let literals = vec![0x42u8; 2000];
        let written =
            encode_literals(&mut huffman, &params(), &mut dst, &literals).unwrap();
        assert!(written < 5);

        let mut ctx = DecodeContext::new();
        decode_roundtrip(&dst[..written], &mut ctx, &literals);
    }

    #[test]
    fn test_compressible_literals_roundtrip() {
        let mut huffman = HuffmanContext::new();
        let mut dst = vec![0u8; 1 << 16];

        let literals: Vec<u8> = b"the quick brown fox jumps over the lazy dog "
            .iter()
            .copied()
            .cycle()
            .take(10_000)
            .collect();

        let written =
            encode_literals(&mut huffman, &params(), &mut dst, &literals).unwrap();
        assert!(written < literals.len());

        let mut ctx = DecodeContext::new();
        decode_roundtrip(&dst[..written], &mut ctx, &literals);
    }

    #[test]
    fn test_treeless_reuse_across_blocks() {
        let mut huffman = HuffmanContext::new();
        let mut ctx = DecodeContext::new();

        let block1: Vec<u8> = b"repeatable english text, block one "
            .iter()
            .copied()
            .cycle()
            .take(4000)
            .collect();
        // small follow-up block drawn from the same alphabet
        let block2: Vec<u8> = b"text block one repeatable "
            .iter()
            .copied()
            .cycle()
            .take(900)
            .collect();

        let mut dst = vec![0u8; 1 << 16];
        let written =
            encode_literals(&mut huffman, &params(), &mut dst, &block1).unwrap();
        huffman.save_changes();
        decode_roundtrip(&dst[..written], &mut ctx, &block1);

        let written =
            encode_literals(&mut huffman, &params(), &mut dst, &block2).unwrap();
        huffman.save_changes();

        // a treeless section reuses the table the decoder still holds
        assert_eq!(dst[0] & 0x3, TREELESS_LITERALS_BLOCK as u8);
        decode_roundtrip(&dst[..written], &mut ctx, &block2);
    }

    #[test]
    fn test_random_literals_stay_raw() {
        let mut huffman = HuffmanContext::new();
        let mut dst = vec![0u8; 1 << 16];

        let mut literals = Vec::with_capacity(8192);
        let mut x: u32 = 0xDEAD_BEEF;
        for _ in 0..2048 {
            x = x.wrapping_mul(1664525).wrapping_add(1013904223);
            literals.extend_from_slice(&x.to_le_bytes());
        }

        let written =
            encode_literals(&mut huffman, &params(), &mut dst, &literals).unwrap();
        // raw: header + verbatim bytes
        assert_eq!(written, 3 + literals.len());

        let mut ctx = DecodeContext::new();
        decode_roundtrip(&dst[..written], &mut ctx, &literals);
    }
}
