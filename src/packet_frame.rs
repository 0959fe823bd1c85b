//! Packet data frame: a 26-byte chunk of a variable-length packet payload,
//! with no sequence number (unlike stream frames).
//!
//! The final transmitted chunk of a packet marks itself with an EOF bit
//! plus a valid-byte count in its last byte (`M17PacketFrame.hpp` only
//! models the opaque payload; the last-byte convention below is a resolved
//! design decision — see DESIGN.md).

use crate::{Error, Result};

/// Wire size of a packet frame chunk, before coding.
pub const PACKET_FRAME_LEN: usize = 26;

/// Bytes of payload a non-final chunk carries.
pub const PACKET_CHUNK_LEN: usize = 25;

/// EOF marker bit in the final byte of the last chunk of a packet.
const EOF_BIT: u8 = 0x80;

/// One 26-byte packet frame chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketFrame {
    data: [u8; PACKET_CHUNK_LEN],
    is_last: bool,
    /// Number of valid bytes in `data`, when `is_last` is set (0..=25).
    valid_len: u8,
}

impl PacketFrame {
    /// A non-final chunk: all 25 bytes are opaque payload.
    #[must_use]
    pub fn middle(data: [u8; PACKET_CHUNK_LEN]) -> Self {
        Self { data, is_last: false, valid_len: PACKET_CHUNK_LEN as u8 }
    }

    /// The final chunk of a packet. `valid_len` (0..=25) is the number of
    /// meaningful bytes at the start of `data`; the rest is padding.
    pub fn last(data: [u8; PACKET_CHUNK_LEN], valid_len: u8) -> Result<Self> {
        if valid_len as usize > PACKET_CHUNK_LEN {
            return Err(Error::WrongSize { expected: PACKET_CHUNK_LEN, got: valid_len as usize });
        }
        Ok(Self { data, is_last: true, valid_len })
    }

    /// True if this is the final chunk of the packet.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// The chunk's payload bytes, trimmed to [`PacketFrame::valid_len`]
    /// when this is the final chunk.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        if self.is_last {
            &self.data[..self.valid_len as usize]
        } else {
            &self.data
        }
    }

    /// Pack into the 26-byte wire form: 25 payload bytes followed by the
    /// EOF/length byte (`0x00` for a non-final chunk).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PACKET_FRAME_LEN] {
        let mut out = [0u8; PACKET_FRAME_LEN];
        out[..PACKET_CHUNK_LEN].copy_from_slice(&self.data);
        out[PACKET_CHUNK_LEN] = if self.is_last { EOF_BIT | self.valid_len } else { 0 };
        out
    }

    /// Parse a 26-byte wire-format packet frame chunk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PACKET_FRAME_LEN {
            return Err(Error::WrongSize { expected: PACKET_FRAME_LEN, got: bytes.len() });
        }
        let mut data = [0u8; PACKET_CHUNK_LEN];
        data.copy_from_slice(&bytes[..PACKET_CHUNK_LEN]);
        let last_byte = bytes[PACKET_CHUNK_LEN];
        let is_last = last_byte & EOF_BIT != 0;
        let valid_len = if is_last {
            (last_byte & !EOF_BIT).min(PACKET_CHUNK_LEN as u8)
        } else {
            PACKET_CHUNK_LEN as u8
        };
        Ok(Self { data, is_last, valid_len })
    }

    /// Fragment a complete packet payload into a sequence of 26-byte
    /// chunks, the last one marked with [`PacketFrame::last`].
    ///
    /// # Panics
    /// Panics if `payload` is empty.
    #[must_use]
    pub fn fragment(payload: &[u8]) -> Vec<Self> {
        assert!(!payload.is_empty(), "cannot fragment an empty packet payload");
        let mut out = Vec::with_capacity(payload.len().div_ceil(PACKET_CHUNK_LEN));
        let mut chunks = payload.chunks(PACKET_CHUNK_LEN).peekable();
        while let Some(chunk) = chunks.next() {
            let mut data = [0u8; PACKET_CHUNK_LEN];
            data[..chunk.len()].copy_from_slice(chunk);
            if chunks.peek().is_none() {
                out.push(Self::last(data, chunk.len() as u8).expect("chunk.len() <= 25"));
            } else {
                out.push(Self::middle(data));
            }
        }
        out
    }

    /// Reassemble a sequence of chunks (in order) back into the original
    /// packet payload.
    #[must_use]
    pub fn reassemble(frames: &[Self]) -> Vec<u8> {
        let mut out = Vec::new();
        for f in frames {
            out.extend_from_slice(f.payload());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_chunk_roundtrip() {
        let data = [0x5Au8; PACKET_CHUNK_LEN];
        let f = PacketFrame::middle(data);
        let bytes = f.to_bytes();
        let parsed = PacketFrame::from_bytes(&bytes).unwrap();
        assert!(!parsed.is_last());
        assert_eq!(parsed.payload(), &data[..]);
    }

    #[test]
    fn last_chunk_trims_to_valid_len() {
        let mut data = [0u8; PACKET_CHUNK_LEN];
        data[..5].copy_from_slice(b"hello");
        let f = PacketFrame::last(data, 5).unwrap();
        let bytes = f.to_bytes();
        assert_eq!(bytes[PACKET_CHUNK_LEN], 0x80 | 5);
        let parsed = PacketFrame::from_bytes(&bytes).unwrap();
        assert!(parsed.is_last());
        assert_eq!(parsed.payload(), b"hello");
    }

    #[test]
    fn fragment_and_reassemble_roundtrip() {
        let payload: Vec<u8> = (0..70u16).map(|i| (i % 256) as u8).collect();
        let frames = PacketFrame::fragment(&payload);
        assert_eq!(frames.len(), 3);
        assert!(!frames[0].is_last());
        assert!(!frames[1].is_last());
        assert!(frames[2].is_last());
        assert_eq!(PacketFrame::reassemble(&frames), payload);
    }

    #[test]
    fn single_short_chunk_fragment() {
        let payload = b"hi";
        let frames = PacketFrame::fragment(payload);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_last());
        assert_eq!(PacketFrame::reassemble(&frames), payload);
    }

    #[test]
    fn rejects_wrong_size() {
        assert!(matches!(
            PacketFrame::from_bytes(&[0u8; 20]),
            Err(Error::WrongSize { expected: PACKET_FRAME_LEN, got: 20 })
        ));
    }
}
