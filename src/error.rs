//! Crate-wide error type.

use thiserror::Error as ThisError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All ways an M17 modem operation can fail.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// CRC-16 mismatch on an assembled LSF or frame payload.
    #[error("CRC mismatch")]
    CrcMismatch,

    /// Golay(24,12) codeword carried more bit errors than the code can correct.
    #[error("Golay codeword uncorrectable")]
    GolayUncorrectable,

    /// Viterbi decode exceeded the configured accumulated-error threshold.
    #[error("Viterbi decode exceeded error threshold: {0} errors")]
    ViterbiThresholdExceeded(u32),

    /// A syncword search found no candidate within the allowed Hamming distance.
    #[error("no syncword found within Hamming distance")]
    SyncNotFound,

    /// A caller-supplied buffer had the wrong size for the operation.
    #[error("wrong size: expected {expected}, got {got}")]
    WrongSize {
        /// Expected size.
        expected: usize,
        /// Size actually given.
        got: usize,
    },

    /// A callsign string contained a character outside the base-40 alphabet.
    #[error("invalid callsign character: {0:?}")]
    InvalidCallsignChar(char),

    /// A callsign string was too long to encode.
    #[error("callsign too long: {0:?}")]
    CallsignTooLong(String),

    /// A meta-text block index was out of range.
    #[error("meta-text block index out of range: {0}")]
    MetaTextBlockOutOfRange(usize),

    /// An LSF was given the all-ones broadcast pattern as its *source*
    /// callsign. Broadcast is a valid destination, never a valid source.
    #[error("source callsign cannot be the broadcast address")]
    SourceCallsignBroadcast,

    /// A demodulator/decoder buffer received samples faster than the prior
    /// frame could be consumed; oldest samples were dropped to recover.
    #[error("sample buffer overflow, dropped oldest samples")]
    BufferOverflow,

    /// A bounded-retry hardware fault (e.g. RNG self-test) exceeded its
    /// retry budget. Surfaced for completeness; this core has no RNG use
    /// today (GNSS/encryption metadata fields are opaque payload here).
    #[error("hardware fault after {0} retries")]
    RngFault(u32),

    /// Stream plumbing fault: a refcount invariant was violated.
    ///
    /// Always a coding bug in how blocks were wired into a graph, never a
    /// condition a caller can hit by feeding bad radio data.
    #[error("stream plumbing error: {0}")]
    Graph(String),

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Catch-all for ad-hoc error messages, constructed via [`Error::msg`].
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an ad-hoc error from a message.
    #[must_use]
    pub fn msg(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::Graph(e.to_string())
    }
}
