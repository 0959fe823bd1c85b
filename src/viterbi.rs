//! Hard-decision Viterbi decoder for M17's rate-1/2, K=5 convolutional
//! code.
//!
//! The trellis has 16 states (one per possible 4-bit shift register
//! content). Received bits are treated as hard 0/1 decisions scaled to
//! `{0, 2}` so branch metrics are plain absolute differences; a punctured
//! position that's missing from the input is filled with the neutral value
//! `1`, which costs the same regardless of which symbol was actually sent.
//!
//! A frame's worth of encoded bits never exceeds 244 (the longest is an LSF:
//! 240 data bits plus 4 flush bits), so chainback always walks the whole
//! decoded history rather than using a sliding traceback window.

use crate::conv::bits_to_bytes;

/// Number of trellis states (`2^(K-1)`).
pub const NUM_STATES: usize = 16;

/// Upper bound on bits decoded in a single call, matching the longest M17
/// frame segment (an LSF).
pub const MAX_HISTORY: usize = 244;

const G1: u8 = 0x19;
const G2: u8 = 0x17;

/// `(K-1) >> 1`: the branch-metric cost of a single corrected bit error,
/// used to turn an accumulated path metric into an error count.
const COST_PER_ERROR: u32 = 2;

fn branch_outputs(state: u8, bit: u8) -> (u8, u8) {
    let reg = ((state << 1) | bit) & 0x1F;
    let g1 = (reg & G1).count_ones() % 2;
    let g2 = (reg & G2).count_ones() % 2;
    ((g1 * 2) as u8, (g2 * 2) as u8)
}

/// Hard-decision Viterbi decoder state.
pub struct ViterbiDecoder {
    metrics: [u32; NUM_STATES],
    history: Vec<u16>,
}

impl Default for ViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ViterbiDecoder {
    /// New decoder, ready to decode starting from the all-zero state.
    #[must_use]
    pub fn new() -> Self {
        let mut d = Self { metrics: [0; NUM_STATES], history: Vec::new() };
        d.reset();
        d
    }

    /// Reset the decoder to start a new, independent frame decode.
    pub fn reset(&mut self) {
        self.metrics = [u32::MAX / 2; NUM_STATES];
        self.metrics[0] = 0;
        self.history.clear();
    }

    fn decode_bit(&mut self, r0: u8, r1: u8) {
        let mut new_metrics = [u32::MAX; NUM_STATES];
        let mut decisions: u16 = 0;
        for n in 0..NUM_STATES {
            let bit = (n & 1) as u8;
            for p3 in 0u8..=1 {
                let p = ((p3 as usize) << 3 | (n >> 1)) as u8;
                let (o0, o1) = branch_outputs(p, bit);
                let branch = u32::from(r0.abs_diff(o0)) + u32::from(r1.abs_diff(o1));
                let cand = self.metrics[p as usize].saturating_add(branch);
                if cand < new_metrics[n] {
                    new_metrics[n] = cand;
                    if p3 == 1 {
                        decisions |= 1 << n;
                    } else {
                        decisions &= !(1 << n);
                    }
                }
            }
        }
        self.metrics = new_metrics;
        self.history.push(decisions);
    }

    fn chainback(&self) -> (Vec<bool>, u32) {
        let num_bits = self.history.len();
        let mut state = (0..NUM_STATES as u8).min_by_key(|&s| self.metrics[s as usize]).unwrap();
        let cost = self.metrics[state as usize];
        let mut bits = vec![false; num_bits];
        for i in (0..num_bits).rev() {
            let decisions = self.history[i];
            bits[i] = (state & 1) == 1;
            let p3 = (decisions >> state) & 1;
            state = (p3 << 3) | (state >> 1);
        }
        (bits, cost)
    }

    /// Decode an unpunctured, hard-decision encoded bit stream (`r0, r1,
    /// r0, r1, ...`). Returns the decoded data bytes and the number of
    /// corrected bit errors.
    pub fn decode(&mut self, bits: &[bool]) -> (Vec<u8>, u32) {
        self.reset();
        for pair in bits.chunks_exact(2) {
            let r0 = if pair[0] { 2 } else { 0 };
            let r1 = if pair[1] { 2 } else { 0 };
            self.decode_bit(r0, r1);
        }
        let (decoded_bits, cost) = self.chainback();
        (bits_to_bytes(&decoded_bits), cost / COST_PER_ERROR)
    }

    /// Decode a punctured encoded bit stream, reinserting the puncturing
    /// `pattern`'s dropped positions as neutral metric inputs before
    /// running the trellis. `total_bits` is the pre-puncturing bit count.
    pub fn decode_punctured(
        &mut self,
        punctured_bits: &[bool],
        pattern: &[bool],
        total_bits: usize,
    ) -> (Vec<u8>, u32) {
        self.reset();
        let (values, punctured_count) = reinsert_neutral(punctured_bits, pattern, total_bits);
        for pair in values.chunks_exact(2) {
            self.decode_bit(pair[0], pair[1]);
        }
        let (decoded_bits, cost) = self.chainback();
        let errors = cost.saturating_sub(punctured_count as u32) / COST_PER_ERROR;
        (bits_to_bytes(&decoded_bits), errors)
    }
}

/// Rebuild a full-length `{0, 1, neutral}` metric stream from a punctured
/// bit stream, returning it alongside the number of positions that were
/// punctured.
fn reinsert_neutral(punctured: &[bool], pattern: &[bool], total_bits: usize) -> (Vec<u8>, usize) {
    const NEUTRAL: u8 = 1;
    let mut out = vec![NEUTRAL; total_bits];
    let mut src = punctured.iter();
    let mut punctured_count = 0;
    for (i, slot) in out.iter_mut().enumerate() {
        if pattern[i % pattern.len()] {
            if let Some(&b) = src.next() {
                *slot = if b { 2 } else { 0 };
            }
        } else {
            punctured_count += 1;
        }
    }
    (out, punctured_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conv::ConvolutionalEncoder;
    use crate::puncture::{puncture, DATA_PUNCTURE};

    fn bytes_to_bits(data: &[u8]) -> Vec<bool> {
        let mut out = Vec::with_capacity(data.len() * 8);
        for &b in data {
            for i in (0..8).rev() {
                out.push((b >> i) & 1 == 1);
            }
        }
        out
    }

    #[test]
    fn decodes_clean_unpunctured_stream() {
        let data = b"M17TEST!";
        let mut enc = ConvolutionalEncoder::new();
        let encoded_bytes = enc.encode(data);
        let flush_bits = enc.flush();
        let mut bits = bytes_to_bits(&encoded_bytes);
        bits.extend(flush_bits);

        let mut dec = ViterbiDecoder::new();
        let (decoded, errors) = dec.decode(&bits);
        assert_eq!(&decoded[..data.len()], data);
        assert_eq!(errors, 0);
    }

    #[test]
    fn corrects_a_bit_flip() {
        let data = b"HELLO!!!";
        let mut enc = ConvolutionalEncoder::new();
        let encoded_bytes = enc.encode(data);
        let flush_bits = enc.flush();
        let mut bits = bytes_to_bits(&encoded_bytes);
        bits.extend(flush_bits);
        bits[10] = !bits[10];

        let mut dec = ViterbiDecoder::new();
        let (decoded, errors) = dec.decode(&bits);
        assert_eq!(&decoded[..data.len()], data);
        assert!(errors >= 1);
    }

    #[test]
    fn decodes_punctured_stream() {
        let data = b"PKT";
        let mut enc = ConvolutionalEncoder::new();
        let encoded_bytes = enc.encode(data);
        let flush_bits = enc.flush();
        let mut bits = bytes_to_bits(&encoded_bytes);
        bits.extend(flush_bits);
        let total_bits = bits.len();

        let punctured = puncture(&bits, &DATA_PUNCTURE);

        let mut dec = ViterbiDecoder::new();
        let (decoded, errors) = dec.decode_punctured(&punctured, &DATA_PUNCTURE, total_bits);
        assert_eq!(&decoded[..data.len()], data);
        assert_eq!(errors, 0);
    }
}
