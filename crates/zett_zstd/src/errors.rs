use crate::MAGIC_NUMBER;

/// API-level error. Decode failures carry the input byte offset at which
/// the problem was detected; caller errors are raised before any state
/// visible to later calls is mutated.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("Malformed input near byte {offset}: {source}")]
    #[diagnostic(code(zett::zstd::malformed))]
    Malformed {
        offset: usize,
        #[source]
        #[diagnostic_source]
        source: FrameError,
    },

    #[error("Output buffer too small, {required} bytes required")]
    #[diagnostic(
        code(zett::zstd::output_too_small),
        help(
            "Size compression buffers with Compressor::max_compressed_length; for decompression, consult Decompressor::decompressed_size."
        )
    )]
    OutputTooSmall { required: usize },

    #[error("Unsupported compression level {0}")]
    #[diagnostic(
        code(zett::zstd::unsupported_level),
        help("Supported levels are 1 through 9; 0 selects the default level.")
    )]
    UnsupportedLevel(i32),
}

/// Everything that can go wrong inside a frame. Wrapped into
/// [`Error::Malformed`] (with the input offset) at the API boundary.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum FrameError {
    #[error("Invalid magic number. Expected: {MAGIC_NUMBER:x}, got: {0:x}")]
    #[diagnostic(
        code(zett::zstd::invalid_magic_num),
        help("The input data does not start with the Zstandard magic number.")
    )]
    InvalidMagicNumber(u32),

    #[error("Zstandard v0.7 frames are not supported")]
    #[diagnostic(
        code(zett::zstd::legacy_frame),
        help("The payload uses the pre-1.0 v0.7 format; re-compress it with a current encoder.")
    )]
    LegacyFrameUnsupported,

    #[error("Skippable frame ({0:x}) is not supported")]
    #[diagnostic(
        code(zett::zstd::skippable_frame),
        help("Skippable frames are detected but not decoded.")
    )]
    SkippableFrameUnsupported(u32),

    #[error("Custom dictionaries are not supported (dictionary id: {0})")]
    #[diagnostic(
        code(zett::zstd::dictionary_unsupported),
        help("Frames that reference an external dictionary cannot be decoded.")
    )]
    DictionaryUnsupported(u32),

    #[error("Reserved bit is set")]
    #[diagnostic(
        code(zett::zstd::reserved_bit_set),
        help("A reserved bit in the frame header is set, which is not allowed.")
    )]
    ReservedBitSet,

    #[error("Window size {0} is out of bounds")]
    #[diagnostic(
        code(zett::zstd::window_size_out_of_bounds),
        help("Window sizes are limited to 8 MiB by this implementation.")
    )]
    WindowSizeOutOfBounds(u64),

    #[error("Reserved block type")]
    #[diagnostic(
        code(zett::zstd::reserved_block),
        help("Encountered a block type that is reserved.")
    )]
    ReservedBlock,

    #[error("Block size {0} is out of bounds")]
    #[diagnostic(
        code(zett::zstd::block_size_out_of_bounds),
        help("The declared block size exceeds the 128 KiB maximum.")
    )]
    BlockSizeOutOfBounds(u32),

    #[error("Compressed block decoded to {0} bytes, beyond the block limit")]
    #[diagnostic(
        code(zett::zstd::block_content_too_large),
        help("A single block must not regenerate more than 128 KiB.")
    )]
    BlockContentTooLarge(usize),

    #[error("Literals size {0} exceeds max block size")]
    #[diagnostic(
        code(zett::zstd::literals_size_too_large),
        help(
            "The regenerated size of the literals section exceeds the maximum allowed block size."
        )
    )]
    LiteralsSizeTooLarge(u32),

    #[error("Compressed literals size {0} exceeds max block size")]
    #[diagnostic(
        code(zett::zstd::compressed_size_too_large),
        help(
            "The compressed size of the literals section exceeds the maximum allowed block size."
        )
    )]
    CompressedSizeTooLarge(u32),

    #[error("Treeless literals block without a previous Huffman table")]
    #[diagnostic(
        code(zett::zstd::missing_huffman_table),
        help(
            "A treeless block reuses the table of an earlier compressed literals block; none was seen in this frame."
        )
    )]
    MissingHuffmanTable,

    #[error("Expected literals length table to be present")]
    #[diagnostic(
        code(zett::zstd::missing_literals_length_table),
        help("Repeat mode requires a table installed by an earlier block of this frame.")
    )]
    MissingLiteralsLengthTable,

    #[error("Expected offset table to be present")]
    #[diagnostic(
        code(zett::zstd::missing_offset_table),
        help("Repeat mode requires a table installed by an earlier block of this frame.")
    )]
    MissingOffsetTable,

    #[error("Expected match length table to be present")]
    #[diagnostic(
        code(zett::zstd::missing_match_length_table),
        help("Repeat mode requires a table installed by an earlier block of this frame.")
    )]
    MissingMatchLengthTable,

    #[error("Extra bits remaining in stream: {0}")]
    #[diagnostic(
        code(zett::zstd::extra_bits),
        help("The entropy stream should be fully consumed, but bits remain.")
    )]
    ExtraBitsInStream(usize),

    #[error("Invalid 4-stream jump table")]
    #[diagnostic(
        code(zett::zstd::jump_table_invalid),
        help("The jump-table offsets of a 4-stream literals section exceed the payload.")
    )]
    JumpTableInvalid,

    #[error("Invalid sequence code: {0}")]
    #[diagnostic(
        code(zett::zstd::invalid_sequence_code),
        help("A decoded FSE symbol is out of range for its channel.")
    )]
    InvalidSequenceCode(u8),

    #[error("Literals buffer overread: idx {idx}, len {len}")]
    #[diagnostic(
        code(zett::zstd::literals_buffer_overread),
        help(
            "Attempted to read past the end of the literals buffer during sequence execution."
        )
    )]
    LiteralsBufferOverread { idx: usize, len: usize },

    #[error("Match offset {offset} reaches before the frame start ({produced} bytes produced)")]
    #[diagnostic(
        code(zett::zstd::offset_before_frame),
        help("Sequences may only reference bytes already produced by the current frame.")
    )]
    OffsetBeforeFrameStart { offset: usize, produced: usize },

    #[error("Zero offset detected")]
    #[diagnostic(
        code(zett::zstd::zero_offset),
        help("An offset of zero is invalid in Zstandard.")
    )]
    ZeroOffset,

    #[error("Checksum mismatch: stored {expected:08x}, computed {actual:08x}")]
    #[diagnostic(
        code(zett::zstd::checksum_mismatch),
        help("The frame content does not hash to the stored checksum.")
    )]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Frame declared {declared} content bytes but produced {actual}")]
    #[diagnostic(
        code(zett::zstd::content_size_mismatch),
        help("The decoded frame does not match the content size in its header.")
    )]
    ContentSizeMismatch { declared: u64, actual: u64 },

    #[error("Destination buffer exhausted")]
    #[diagnostic(
        code(zett::zstd::destination_full),
        help("The output buffer cannot hold the decompressed data.")
    )]
    DestinationFull,

    #[error("Corrupted data")]
    #[diagnostic(
        code(zett::zstd::corruption),
        help("Generic data corruption detected.")
    )]
    Corruption,

    #[error(transparent)]
    #[diagnostic(code(zett::zstd::io))]
    IO(#[from] zett_io::Error),

    #[error(transparent)]
    #[diagnostic(code(zett::zstd::huff0))]
    Huff0(#[from] zett_huff0::Error),

    #[error(transparent)]
    #[diagnostic(code(zett::zstd::fse))]
    FSE(#[from] zett_fse::Error),
}
