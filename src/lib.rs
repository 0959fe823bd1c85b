#![warn(missing_docs)]
/*! M17 digital voice/data modem core.

This crate implements the M17 baseband processing chain: framing (LSF,
stream and packet frames), convolutional coding, Golay(24,12) LICH coding,
quadratic bit interleaving, fixed-sequence decorrelation, 4-FSK symbol
mapping and pulse shaping, Viterbi decoding, and syncword correlation/timing
recovery, plus the auxiliary codecs (base-40 callsign, CRC-16/0x5935,
multi-block meta-text) the protocol is built from.

# Architecture overview

Like its ancestor SDR framework, this crate is built out of blocks
connected by unidirectional streams. Each block has zero or more input
streams and zero or more output streams; a [`graph::Graph`] owns a set of
blocks and drives them until none of them can make further progress.

```text
   [ bit/byte payload ]
           ↓
     [ FrameEncoder ]          (LSF / stream / packet framing, FEC, interleave, decorrelate)
           ↓
     [ Modulator ]             (4-FSK symbol mapping, RRC pulse shaping)
           ↓
   [ baseband samples ]
```

and, for reception:

```text
   [ baseband samples ]
           ↓
     [ Demodulator ]          (timing recovery, syncword correlation, symbol slicing)
           ↓
     [ FrameDecoder ]         (de-interleave, Viterbi decode, Golay decode, CRC check)
           ↓
   [ bit/byte payload ]
```

The pure, stateless transforms the protocol is built from (CRC, Golay,
convolutional coding, puncturing, interleaving, decorrelation, the callsign
codec, bit packing) are plain functions usable outside of any graph; the
blocks above are thin stateful adapters around them.

See `DESIGN.md` in the repository root for the rationale behind each part.
*/

pub mod error;

// Auxiliary codecs and pure transforms.
pub mod bits;
pub mod callsign;
pub mod conv;
pub mod crc;
pub mod decorrelate;
pub mod golay;
pub mod interleave;
pub mod metatext;
pub mod puncture;
pub mod viterbi;

// Protocol data model and framing.
pub mod frame;
pub mod lsf;
pub mod packet_frame;
pub mod stream_frame;

// Block-graph scaffolding: blocks connected by streams, driven by a graph.
pub mod block;
pub mod blocks;
pub mod circular_buffer;
pub mod graph;
pub mod stream;

// Blocks.
pub mod demodulator;
pub mod frame_decoder;
pub mod frame_encoder;
pub mod modulator;
pub mod shaping;
pub mod stats;

pub use error::{Error, Result};

/// Float type used for baseband shaping and filter coefficients.
pub type Float = f32;

/// Baseband sample type: 16-bit signed PCM.
pub type Sample16 = i16;

/// Trivial trait for types that have `.len()`, used generically by streams
/// of framed ("non-copy") data such as `Vec<u8>` frames.
#[allow(clippy::len_without_is_empty)]
pub trait Len {
    /// Get the length.
    fn len(&self) -> usize;
}
impl<T> Len for Vec<T> {
    fn len(&self) -> usize {
        self.len()
    }
}

pub(crate) static NEXT_STREAM_ID: std::sync::atomic::AtomicUsize =
    std::sync::atomic::AtomicUsize::new(1);

#[cfg(test)]
pub(crate) mod tests {
    //! Test helper functions.

    /// Assert that two float slices are almost equal.
    ///
    /// Floating point numbers are almost never exactly equal.
    pub fn assert_almost_equal_f32(left: &[f32], right: &[f32]) {
        assert_eq!(
            left.len(),
            right.len(),
            "\nleft: {:?}\nright: {:?}",
            left,
            right
        );
        for i in 0..left.len() {
            let dist = (left[i] - right[i]).abs();
            if dist > 0.001 {
                assert_eq!(left[i], right[i], "\nElement {i}:\nleft: {:?}\nright: {:?}", left, right);
            }
        }
    }
}
