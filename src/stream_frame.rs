//! Stream data frame: `{frameNum[2], payload[16]}`, 18 bytes before coding.

use crate::{Error, Result};

/// Wire size of a stream frame, before coding.
pub const STREAM_FRAME_LEN: usize = 18;

/// Size of a stream frame's opaque payload.
pub const STREAM_PAYLOAD_LEN: usize = 16;

/// EOS (end-of-stream) bit in `frameNum`, bit 15.
const EOS_BIT: u16 = 0x8000;

/// Frame-number counter wraps at `0x8000` (15 bits).
pub const FRAME_NUM_MODULUS: u16 = 0x8000;

/// One stream data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFrame {
    frame_num: u16,
    eos: bool,
    payload: [u8; STREAM_PAYLOAD_LEN],
}

impl StreamFrame {
    /// New stream frame. `frame_num` is masked to 15 bits (bit 15 is
    /// reserved for [`StreamFrame::set_eos`]).
    #[must_use]
    pub fn new(frame_num: u16, payload: [u8; STREAM_PAYLOAD_LEN]) -> Self {
        Self { frame_num: frame_num & !EOS_BIT, eos: false, payload }
    }

    /// Monotonic frame counter, 0..0x7FFF.
    #[must_use]
    pub fn frame_num(&self) -> u16 {
        self.frame_num
    }

    /// End-of-stream flag: set only on the final frame of a transmission.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.eos
    }

    /// Set the end-of-stream flag.
    pub fn set_eos(&mut self, eos: bool) {
        self.eos = eos;
    }

    /// The opaque 16-byte payload.
    #[must_use]
    pub fn payload(&self) -> &[u8; STREAM_PAYLOAD_LEN] {
        &self.payload
    }

    /// Pack into the 18-byte wire form: `frameNum` big-endian with the EOS
    /// bit folded into bit 15, followed by the 16-byte payload.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; STREAM_FRAME_LEN] {
        let mut out = [0u8; STREAM_FRAME_LEN];
        let word = (self.frame_num & !EOS_BIT) | if self.eos { EOS_BIT } else { 0 };
        out[0..2].copy_from_slice(&word.to_be_bytes());
        out[2..].copy_from_slice(&self.payload);
        out
    }

    /// Parse an 18-byte wire-format stream frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != STREAM_FRAME_LEN {
            return Err(Error::WrongSize { expected: STREAM_FRAME_LEN, got: bytes.len() });
        }
        let word = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut payload = [0u8; STREAM_PAYLOAD_LEN];
        payload.copy_from_slice(&bytes[2..]);
        Ok(Self { frame_num: word & !EOS_BIT, eos: word & EOS_BIT != 0, payload })
    }

    /// Return the frame number that follows this one, wrapping at
    /// [`FRAME_NUM_MODULUS`].
    #[must_use]
    pub fn next_frame_num(&self) -> u16 {
        (self.frame_num + 1) % FRAME_NUM_MODULUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let payload = [0xABu8; STREAM_PAYLOAD_LEN];
        let mut f = StreamFrame::new(42, payload);
        f.set_eos(true);
        let bytes = f.to_bytes();
        let parsed = StreamFrame::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.frame_num(), 42);
        assert!(parsed.is_last());
        assert_eq!(parsed.payload(), &payload);
    }

    #[test]
    fn eos_bit_does_not_leak_into_counter() {
        let f = StreamFrame::new(0x7FFF, [0u8; STREAM_PAYLOAD_LEN]);
        assert_eq!(f.frame_num(), 0x7FFF);
        let bytes = f.to_bytes();
        assert_eq!(bytes[0] & 0x80, 0);
    }

    #[test]
    fn frame_num_wraps() {
        let f = StreamFrame::new(0x7FFF, [0u8; STREAM_PAYLOAD_LEN]);
        assert_eq!(f.next_frame_num(), 0);
    }

    #[test]
    fn rejects_wrong_size() {
        assert!(matches!(
            StreamFrame::from_bytes(&[0u8; 10]),
            Err(Error::WrongSize { expected: STREAM_FRAME_LEN, got: 10 })
        ));
    }
}
