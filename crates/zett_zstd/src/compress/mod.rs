mod literals;
mod matcher;
mod parameters;
mod sequences;
mod store;

use xxhash_rust::xxh64::xxh64;
use zett_foundation::highest_bit;

pub use parameters::{DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL};
pub(crate) use parameters::{CompressionParameters, Strategy};

use literals::HuffmanContext;
use matcher::{BlockCompressionState, RepeatedOffsets};
use sequences::SequenceEncodingContext;
use store::SequenceStore;

use crate::{
    block, Error, MAGIC_NUMBER, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, MIN_WINDOW_LOG,
    SIZE_OF_BLOCK_HEADER,
};

const MAX_FRAME_HEADER_SIZE: usize = 14;

const CHECKSUM_FLAG: u8 = 0b100;
const SINGLE_SEGMENT_FLAG: u8 = 0b10_0000;

impl Strategy {
    /// The one operation a block-matching strategy must provide: fill the
    /// sequence store from the block and return the literal tail size.
    #[allow(clippy::too_many_arguments)]
    fn compress_block(
        &self,
        src: &[u8],
        block_start: usize,
        block_size: usize,
        store: &mut SequenceStore,
        state: &mut BlockCompressionState,
        offsets: &mut RepeatedOffsets,
        params: &CompressionParameters,
    ) -> usize {
        match self {
            Strategy::Fast => matcher::compress_block(
                src,
                block_start,
                block_size,
                store,
                state,
                offsets,
                params,
            ),
        }
    }
}

/// Scratch state for one frame's worth of block compression. Entropy
/// tables and repeated offsets accumulate tentatively per block and are
/// committed only when the block is emitted in compressed form.
struct CompressionContext {
    store: SequenceStore,
    state: BlockCompressionState,
    offsets: RepeatedOffsets,
    huffman: HuffmanContext,
    sequence_ctx: SequenceEncodingContext,
}

impl CompressionContext {
    fn new() -> Self {
        Self {
            store: SequenceStore::new(),
            state: BlockCompressionState::new(),
            offsets: RepeatedOffsets::new(),
            huffman: HuffmanContext::new(),
            sequence_ctx: SequenceEncodingContext::new(),
        }
    }

    fn reset(&mut self, params: &CompressionParameters) {
        self.state.reset(params);
        self.offsets.reset();
        self.huffman.reset_frame();
    }
}

/// One-shot frame encoder. Owns all scratch state (sequence store, hash
/// tables, entropy workspaces), which is reused across blocks and frames.
/// Not safe for concurrent use; hold one instance per thread.
pub struct Compressor {
    context: CompressionContext,
}

impl Compressor {
    pub fn new() -> Self {
        Self {
            context: CompressionContext::new(),
        }
    }

    /// Worst-case frame size for `uncompressed_size` input bytes.
    pub fn max_compressed_length(uncompressed_size: usize) -> usize {
        let mut result = uncompressed_size + (uncompressed_size >> 8);

        if uncompressed_size < MAX_BLOCK_SIZE {
            result += (MAX_BLOCK_SIZE - uncompressed_size) >> 11;
        }

        result
    }

    /// Compress `input` into a single frame at the default level.
    pub fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, Error> {
        self.compress_with_level(input, output, DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn compress_with_level(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        level: i32,
    ) -> Result<usize, Error> {
        let params = CompressionParameters::compute(level, input.len())?;

        let required = Self::max_compressed_length(input.len());
        if output.len() < required {
            return Err(Error::OutputTooSmall { required });
        }

        let mut pos = 0;
        pos += write_magic(&mut output[pos..]);
        pos += write_frame_header(&mut output[pos..], input.len(), params.window_size());
        pos += self.compress_frame(input, &mut output[pos..], &params)?;
        pos += write_checksum(&mut output[pos..], input);

        Ok(pos)
    }

    fn compress_frame(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        params: &CompressionParameters,
    ) -> Result<usize, Error> {
        let block_size = MAX_BLOCK_SIZE.min(params.window_size());

        self.context.reset(params);

        let mut in_pos = 0;
        let mut out_pos = 0;
        let mut remaining = input.len();

        loop {
            let last_block = block_size >= remaining;
            let this_block = block_size.min(remaining);

            let mut compressed_size = 0;
            if remaining > 0 {
                compressed_size = compress_block(
                    &mut self.context,
                    input,
                    in_pos,
                    this_block,
                    &mut output[out_pos + SIZE_OF_BLOCK_HEADER..],
                    params,
                )?;
            }

            if compressed_size == 0 {
                // not compressible; store the block verbatim
                block::write_header(
                    &mut output[out_pos..],
                    last_block,
                    block::RAW_BLOCK,
                    this_block,
                );
                output[out_pos + SIZE_OF_BLOCK_HEADER..][..this_block]
                    .copy_from_slice(&input[in_pos..in_pos + this_block]);
                out_pos += SIZE_OF_BLOCK_HEADER + this_block;
            } else {
                block::write_header(
                    &mut output[out_pos..],
                    last_block,
                    block::COMPRESSED_BLOCK,
                    compressed_size,
                );
                out_pos += SIZE_OF_BLOCK_HEADER + compressed_size;
            }

            in_pos += this_block;
            remaining -= this_block;

            if last_block {
                break;
            }
        }

        Ok(out_pos)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

fn compress_block(
    context: &mut CompressionContext,
    src: &[u8],
    block_start: usize,
    block_size: usize,
    output: &mut [u8],
    params: &CompressionParameters,
) -> Result<usize, Error> {
    if block_size < MIN_BLOCK_SIZE + SIZE_OF_BLOCK_HEADER + 1 {
        // not worth attempting compression
        return Ok(0);
    }

    let CompressionContext {
        store,
        state,
        offsets,
        huffman,
        sequence_ctx,
    } = context;

    state.enforce_max_distance(block_start + block_size, params.window_size());
    store.reset();

    let last_literals_size = params.strategy.compress_block(
        src,
        block_start,
        block_size,
        store,
        state,
        offsets,
        params,
    );

    let last_literals_start = block_start + block_size - last_literals_size;
    store.append_literals(&src[last_literals_start..block_start + block_size]);
    store.generate_codes();

    let mut pos = 0;

    pos += match literals::encode_literals(huffman, params, output, &store.literals) {
        Ok(size) => size,
        Err(Error::OutputTooSmall { .. }) => {
            huffman.rollback();
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    pos += match sequences::compress_sequences(&mut output[pos..], store, sequence_ctx) {
        Ok(size) => size,
        Err(Error::OutputTooSmall { .. }) => {
            huffman.rollback();
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    // a compressed block must beat raw by a real margin
    let max_compressed_size = block_size - minimum_gain(block_size);
    if pos > max_compressed_size {
        huffman.rollback();
        return Ok(0);
    }

    // the block is final; confirm repeated offsets and entropy tables
    offsets.commit();
    huffman.save_changes();

    Ok(pos)
}

fn minimum_gain(input_size: usize) -> usize {
    (input_size >> 6) + 2
}

fn write_magic(dst: &mut [u8]) -> usize {
    dst[..4].copy_from_slice(&MAGIC_NUMBER.to_le_bytes());
    4
}

fn write_frame_header(dst: &mut [u8], input_size: usize, window_size: usize) -> usize {
    debug_assert!(dst.len() >= MAX_FRAME_HEADER_SIZE);
    debug_assert!(input_size <= u32::MAX as usize);

    let content_size_descriptor =
        (input_size >= 256) as u8 + (input_size >= 65536 + 256) as u8;
    let mut descriptor = (content_size_descriptor << 6) | CHECKSUM_FLAG;

    let single_segment = window_size >= input_size;
    if single_segment {
        descriptor |= SINGLE_SEGMENT_FLAG;
    }

    let mut pos = 0;
    dst[pos] = descriptor;
    pos += 1;

    if !single_segment {
        let exponent = highest_bit(window_size as u32) as u8;
        assert!(exponent >= MIN_WINDOW_LOG, "window below the format minimum");

        let base = 1usize << exponent;
        let remainder = window_size - base;
        assert!(
            remainder % (base / 8) == 0,
            "window size not expressible as base + mantissa * base/8"
        );
        let mantissa = (remainder / (base / 8)) as u8;

        dst[pos] = ((exponent - MIN_WINDOW_LOG) << 3) | mantissa;
        pos += 1;
    }

    match content_size_descriptor {
        0 => {
            if single_segment {
                dst[pos] = input_size as u8;
                pos += 1;
            }
        }
        1 => {
            dst[pos..pos + 2].copy_from_slice(&((input_size - 256) as u16).to_le_bytes());
            pos += 2;
        }
        _ => {
            dst[pos..pos + 4].copy_from_slice(&(input_size as u32).to_le_bytes());
            pos += 4;
        }
    }

    pos
}

fn write_checksum(dst: &mut [u8], content: &[u8]) -> usize {
    let hash = xxh64(content, 0) as u32;
    dst[..4].copy_from_slice(&hash.to_le_bytes());
    4
}
