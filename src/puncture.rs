//! Code puncturing: dropping a fixed, periodic subset of convolutionally
//! encoded bits to trade error-correcting strength for bit rate.
//!
//! LSF and LICH segments use [`LSF_PUNCTURE`] (61 bits wide), stream/packet
//! payload uses [`DATA_PUNCTURE`] (12 bits wide). In both, a `1` keeps the
//! bit and a `0` drops it; the pattern repeats for as long as the input
//! lasts.

use crate::bits::{get_bit, set_bit};

/// Puncturing pattern for LSF and LICH segments.
pub const LSF_PUNCTURE: [bool; 61] = [
    true, true, false, true, true, true, false, true, true, true, false, true, true, true, false,
    true, true, true, false, true, true, true, false, true, true, true, false, true, true, true,
    false, true, true, true, false, true, true, true, false, true, true, true, false, true, true,
    true, false, true, true, true, false, true, true, true, false, true, true, true, false, true,
    true,
];

/// Puncturing pattern for stream/packet payload segments.
pub const DATA_PUNCTURE: [bool; 12] =
    [true, true, true, true, true, true, true, true, true, true, true, false];

/// Puncturing pattern for packet frames.
///
/// A packet frame's 26-byte body, rate-1/2 encoded and flushed, is 424 bits
/// wide; the fixed 46-byte frame body only has room for 368. This pattern
/// drops 7 bits per 53-bit cycle (46 kept), evenly spaced at `floor(53*k/7)`
/// for `k` in `0..7`, so eight clean cycles (`53*8 == 424`) land exactly on
/// the 368 transmitted bits (a resolved design decision, see DESIGN.md).
pub const PACKET_PUNCTURE: [bool; 53] = {
    let mut pat = [true; 53];
    let drops = [0usize, 7, 15, 22, 30, 37, 45];
    let mut i = 0;
    while i < drops.len() {
        pat[drops[i]] = false;
        i += 1;
    }
    pat
};

/// Drop the bits the pattern marks `false`, cycling through `pattern` for
/// the length of `bits`.
#[must_use]
pub fn puncture(bits: &[bool], pattern: &[bool]) -> Vec<bool> {
    bits.iter()
        .enumerate()
        .filter(|(i, _)| pattern[i % pattern.len()])
        .map(|(_, &b)| b)
        .collect()
}

/// Reinsert neutral (`false`) placeholders at the positions `pattern`
/// punctured out, restoring the original bit count implied by
/// `original_len`.
#[must_use]
pub fn depuncture(punctured: &[bool], pattern: &[bool], original_len: usize) -> Vec<bool> {
    let mut out = vec![false; original_len];
    let mut src = punctured.iter();
    for (i, slot) in out.iter_mut().enumerate() {
        if pattern[i % pattern.len()] {
            if let Some(&bit) = src.next() {
                *slot = bit;
            }
        }
    }
    out
}

/// Byte-slice variants of [`puncture`]/[`depuncture`], operating bit by bit
/// via [`get_bit`]/[`set_bit`] over an `N`-byte buffer, matching the layout
/// used when punctured data is packed back into frame bytes.
#[must_use]
pub fn puncture_bytes(data: &[u8], total_bits: usize, pattern: &[bool]) -> Vec<bool> {
    let bits: Vec<bool> = (0..total_bits).map(|i| get_bit(data, i)).collect();
    puncture(&bits, pattern)
}

/// Pack depunctured bits back MSB-first into a byte buffer of
/// `original_len.div_ceil(8)` bytes.
#[must_use]
pub fn depuncture_to_bytes(punctured: &[bool], pattern: &[bool], original_len: usize) -> Vec<u8> {
    let bits = depuncture(punctured, pattern, original_len);
    let mut out = vec![0u8; original_len.div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        set_bit(&mut out, i, bit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn puncture_drops_marked_bits() {
        let pattern = [true, false, true];
        let bits = [true, true, true, false, false, false];
        assert_eq!(puncture(&bits, &pattern), vec![true, false, false]);
    }

    #[test]
    fn depuncture_roundtrips_kept_bits() {
        let pattern = DATA_PUNCTURE;
        let original: Vec<bool> = (0..96).map(|i| i % 3 == 0).collect();
        let punctured = puncture(&original, &pattern);
        let restored = depuncture(&punctured, &pattern, original.len());
        for i in 0..original.len() {
            if pattern[i % pattern.len()] {
                assert_eq!(restored[i], original[i]);
            }
        }
    }

    #[test]
    fn lsf_puncture_pattern_length() {
        assert_eq!(LSF_PUNCTURE.len(), 61);
        assert_eq!(DATA_PUNCTURE.len(), 12);
        assert_eq!(PACKET_PUNCTURE.len(), 53);
    }

    #[test]
    fn packet_puncture_keeps_368_of_424_bits() {
        let kept = PACKET_PUNCTURE.iter().filter(|&&b| b).count();
        assert_eq!(kept, 46);
        let bits = vec![true; 424];
        assert_eq!(puncture(&bits, &PACKET_PUNCTURE).len(), 368);
    }
}
