//! Quadratic permutation polynomial (QPP) bit interleaver.
//!
//! Bit `i` of the input moves to position `(45*i + 92*i*i) % (8*N)` of the
//! output, where `N` is the buffer length in bytes. Because the permutation
//! is fixed per buffer size, [`deinterleave`] just inverts the same index
//! map rather than computing a separate polynomial.

use crate::bits::{get_bit, set_bit};

const F1: usize = 45;
const F2: usize = 92;

fn index(i: usize, total_bits: usize) -> usize {
    (F1 * i + F2 * i * i) % total_bits
}

/// Interleave an `N`-byte buffer in place (returns a new buffer of the same
/// size).
#[must_use]
pub fn interleave(data: &[u8]) -> Vec<u8> {
    let total_bits = data.len() * 8;
    let mut out = vec![0u8; data.len()];
    for i in 0..total_bits {
        set_bit(&mut out, index(i, total_bits), get_bit(data, i));
    }
    out
}

/// Invert [`interleave`].
#[must_use]
pub fn deinterleave(data: &[u8]) -> Vec<u8> {
    let total_bits = data.len() * 8;
    let mut out = vec![0u8; data.len()];
    for i in 0..total_bits {
        set_bit(&mut out, i, get_bit(data, index(i, total_bits)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data: Vec<u8> = (0..46u8).collect();
        let interleaved = interleave(&data);
        assert_eq!(deinterleave(&interleaved), data);
    }

    #[test]
    fn permutation_is_a_bijection() {
        let total_bits = 46 * 8;
        let mut seen = vec![false; total_bits];
        for i in 0..total_bits {
            let idx = index(i, total_bits);
            assert!(!seen[idx], "index {idx} hit twice");
            seen[idx] = true;
        }
    }

    #[test]
    fn actually_permutes() {
        let mut data = vec![0u8; 46];
        data[0] = 0x80;
        let interleaved = interleave(&data);
        assert_ne!(interleaved, data);
    }
}
