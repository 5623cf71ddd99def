//! Error types for the static rANS coder.

use thiserror::Error;

/// Error variants for table construction, coding and persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// More symbols have nonzero probability than the table has slots.
    #[error("degenerate distribution: {nonzero} nonzero symbols do not fit a table of total {total}")]
    DegenerateDistribution {
        /// Number of symbols with nonzero probability.
        nonzero: usize,
        /// Table total `M`.
        total: u32,
    },

    /// Provided probability is invalid (negative or non-finite), or all are zero.
    #[error("invalid probability: {0}")]
    InvalidProbability(f64),

    /// The symbol has frequency 0 in the table and cannot be encoded.
    #[error("invalid symbol: {0} has zero frequency")]
    InvalidSymbol(u8),

    /// The stream ended before the caller's expected number of symbols.
    #[error("stream underflow: expected {expected} symbols, stream ended after {decoded}")]
    StreamUnderflow {
        /// Symbols the caller asked for.
        expected: usize,
        /// Symbols actually decoded before the end marker.
        decoded: usize,
    },

    /// The caller declared the stream finished but symbols remain.
    #[error("trailing data: stream holds more symbols than expected")]
    TrailingData,

    /// The compressed bytes or terminal state are not a valid stream.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// A persisted frequency table is malformed.
    #[error("corrupt table: {0}")]
    CorruptTable(String),

    /// Reciprocal division disagrees with true division.
    #[error("divider mismatch: {dividend} / {divisor} gave {fast}, expected {exact}")]
    DividerMismatch {
        /// Dividend that exposed the mismatch.
        dividend: u64,
        /// Divisor under test.
        divisor: u32,
        /// Result of the multiply-and-shift.
        fast: u64,
        /// Result of true division.
        exact: u64,
    },

    /// The seeded state is too small for the first symbol encoded into it.
    #[error("initial state too small: encoding symbol {symbol} would leave the state below the renormalization floor")]
    InitialStateTooSmall {
        /// Symbol that could not be encoded.
        symbol: u8,
    },

    /// The bonus value does not fit below `2^(l_bits - 1)`.
    #[error("invalid bonus: {bonus} exceeds limit {limit}")]
    InvalidBonus {
        /// Bonus that was supplied.
        bonus: u64,
        /// Exclusive upper limit.
        limit: u64,
    },

    /// Configuration or parameter errors.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An I/O error occurred while reading or writing configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for rANS operations.
pub type Result<T> = std::result::Result<T, Error>;
