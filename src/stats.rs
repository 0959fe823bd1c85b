//! Frame/error counters exposed by [`crate::frame_decoder`] and
//! [`crate::demodulator`].
//!
//! The core does not log or display anything on its own behalf; it
//! accumulates counters and leaves rendering to the caller. The struct is
//! `serde::Serialize` so a host can dump it straight into a status message
//! or metrics exporter.

use serde::Serialize;

/// Running counters for a decode session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Frames successfully decoded and accepted.
    pub frames_decoded: u64,

    /// Frames dropped for any reason (CRC, Viterbi threshold, unknown
    /// syncword, Golay failure).
    pub frames_dropped: u64,

    /// CRC-16 mismatches encountered.
    pub crc_errors: u64,

    /// Golay(24,12) codewords that could not be corrected (4+ bit errors).
    pub golay_errors: u64,

    /// Total bit errors the Viterbi decoder corrected across all accepted
    /// frames.
    pub viterbi_corrected_errors: u64,

    /// Number of times the demodulator lost symbol-timing lock.
    pub sync_losses: u64,
}

impl Counters {
    /// New, all-zero counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully decoded frame.
    pub fn record_decoded(&mut self, viterbi_errors: u32) {
        self.frames_decoded += 1;
        self.viterbi_corrected_errors += u64::from(viterbi_errors);
    }

    /// Record a dropped frame.
    pub fn record_dropped(&mut self) {
        self.frames_dropped += 1;
    }

    /// Record a CRC mismatch (also counts as a dropped frame).
    pub fn record_crc_error(&mut self) {
        self.crc_errors += 1;
        self.record_dropped();
    }

    /// Record an uncorrectable Golay codeword.
    pub fn record_golay_error(&mut self) {
        self.golay_errors += 1;
    }

    /// Record a loss of symbol-timing lock.
    pub fn record_sync_loss(&mut self) {
        self.sync_losses += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let c = Counters::new();
        assert_eq!(c.frames_decoded, 0);
        assert_eq!(c.frames_dropped, 0);
    }

    #[test]
    fn crc_error_also_counts_as_dropped() {
        let mut c = Counters::new();
        c.record_crc_error();
        assert_eq!(c.crc_errors, 1);
        assert_eq!(c.frames_dropped, 1);
    }

    #[test]
    fn serializes_to_json() {
        let mut c = Counters::new();
        c.record_decoded(2);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"frames_decoded\":1"));
        assert!(json.contains("\"viterbi_corrected_errors\":2"));
    }
}
