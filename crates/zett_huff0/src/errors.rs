#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] zett_io::Error),

    #[error(transparent)]
    FSE(#[from] zett_fse::Error),

    #[error("Huffman weight {0} exceeds the maximum of {1}")]
    #[diagnostic(
        code(zett::huff0::weight_too_large),
        help("Decoded weights must stay within the declared table capability.")
    )]
    WeightTooLarge(u8, u8),

    #[error("Huffman weights sum to zero")]
    #[diagnostic(
        code(zett::huff0::zero_weight_sum),
        help("At least one symbol must carry a non-zero weight.")
    )]
    ZeroWeightSum,

    #[error("Cannot infer the last Huffman weight (remainder: {0})")]
    #[diagnostic(
        code(zett::huff0::invalid_inferred_weight),
        help("The implicit last weight must complete the total to a power of two.")
    )]
    InvalidInferredWeight(u32),

    #[error("Data corruption detected")]
    Corruption,

    #[error("Table overflow")]
    TableOverflow,

    #[error("Table underflow")]
    TableUnderflow,
}
