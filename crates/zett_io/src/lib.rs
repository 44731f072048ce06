mod bit_reader;
mod bit_writer;
mod cursor;
mod reverse_bit_reader;

pub use bit_reader::BitReader;
pub use bit_writer::BitWriter;
pub use cursor::InputCursor;
pub use reverse_bit_reader::ReverseBitReader;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("Stream is empty")]
    #[diagnostic(
        code(zett::io::empty_stream),
        help("The input stream ended unexpectedly. Verify the input data is complete.")
    )]
    EmptyStream,

    #[error("Stream end sentinel is missing")]
    #[diagnostic(
        code(zett::io::missing_sentinel),
        help("A backward bit stream must end with a non-zero byte carrying the padding bit.")
    )]
    MissingSentinel,

    #[error(
        "Not enough bits in stream. Requested: {requested:?}, Remaining: {remaining:?}"
    )]
    #[diagnostic(
        code(zett::io::not_enough_bits),
        help("Attempted to read more bits than are available in the stream.")
    )]
    NotEnoughBits { requested: usize, remaining: usize },

    #[error("Input truncated. Requested: {requested} bytes, remaining: {remaining}")]
    #[diagnostic(
        code(zett::io::truncated),
        help("A fixed-size field extends past the end of the input.")
    )]
    Truncated { requested: usize, remaining: usize },

    #[error("Not enough space in output. Needed: {needed} bytes, available: {available}")]
    #[diagnostic(
        code(zett::io::not_enough_space),
        help("The destination buffer cannot hold the bits queued for flushing.")
    )]
    NotEnoughSpace { needed: usize, available: usize },
}
