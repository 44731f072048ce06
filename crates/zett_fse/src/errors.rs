#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(code(zett::fse::io))]
    IO(#[from] zett_io::Error),

    #[error("Invalid accuracy log: {0}")]
    #[diagnostic(
        code(zett::fse::invalid_accuracy_log),
        help("The accuracy log must be within valid bounds.")
    )]
    InvalidAccuracyLog(u8),

    #[error("FSE accuracy log mismatch. Expected <= {0}, got {1}")]
    #[diagnostic(
        code(zett::fse::accuracy_log_mismatch),
        help("The decoded accuracy log exceeds the table's maximum capability.")
    )]
    AccuracyLogMismatch(u8, u8),

    #[error("Too many symbols")]
    #[diagnostic(
        code(zett::fse::too_many_symbols),
        help("The number of symbols exceeds the maximum allowed.")
    )]
    TooManySymbols,

    #[error("FSE sum mismatch. Expected 0 remaining, got {0}")]
    #[diagnostic(
        code(zett::fse::sum_mismatch),
        help("The sum of probabilities does not match the expected power of 2.")
    )]
    SumMismatch(i32),

    #[error("Fast-spread alignment error (pos: {0})")]
    #[diagnostic(
        code(zett::fse::fast_spread_alignment),
        help(
            "Alignment error during spread table construction. This usually implies the distribution is invalid."
        )
    )]
    SpreadAlignment(usize),

    #[error("Table underfilled")]
    #[diagnostic(
        code(zett::fse::table_underfilled),
        help("The FSE table was not completely filled.")
    )]
    TableUnderfilled,

    #[error("Invalid state")]
    #[diagnostic(
        code(zett::fse::invalid_state),
        help("The FSE state is invalid or out of bounds (state was 0).")
    )]
    InvalidState,

    #[error("Invalid normalized distribution")]
    #[diagnostic(
        code(zett::fse::invalid_distribution),
        help("The normalized counts cannot describe a valid table of the requested size.")
    )]
    InvalidDistribution,

    #[error("Data corruption detected")]
    #[diagnostic(
        code(zett::fse::corruption),
        help("The FSE encoded data appears to be corrupted.")
    )]
    Corruption,
}
