//! Outbound frame assembly: LSF/stream/packet/EOT framing, convolutional
//! coding, puncturing, interleaving and decorrelation, producing 48-byte
//! on-air frames (2-byte syncword + 46 coded bytes).
//!
//! [`FrameEncoderCore`] is the plain, non-graph API; [`FrameEncoder`] is a
//! thin [`crate::block::Block`] wrapper around it that a caller drives
//! through a [`crate::graph::Graph`] instead, taking [`EncoderCommand`]s
//! off a non-copy input stream and pushing coded frame bytes onto a
//! non-copy output stream.

use log::debug;

use crate::bits::{get_bit, set_bit};
use crate::block::{Block, BlockName, BlockRet};
use crate::conv::ConvolutionalEncoder;
use crate::decorrelate::decorrelate;
use crate::frame::{SYNC_EOT, SYNC_LSF, SYNC_PACKET, SYNC_STREAM};
use crate::interleave::interleave;
use crate::lsf::{lsf_to_lich_segment, Lsf};
use crate::packet_frame::{PacketFrame, PACKET_FRAME_LEN};
use crate::puncture::{puncture, DATA_PUNCTURE, LSF_PUNCTURE, PACKET_PUNCTURE};
use crate::stream::{NCReadStream, NCWriteStream};
use crate::stream_frame::{StreamFrame, STREAM_PAYLOAD_LEN};
use crate::{Error, Result};

/// Size of one on-air frame (2-byte syncword + 46 coded bytes).
pub const ON_AIR_FRAME_LEN: usize = 48;

fn bytes_to_bits(data: &[u8]) -> Vec<bool> {
    (0..data.len() * 8).map(|i| get_bit(data, i)).collect()
}

fn pack_frame(syncword: [u8; 2], coded: &[u8; 46]) -> [u8; ON_AIR_FRAME_LEN] {
    let mut out = [0u8; ON_AIR_FRAME_LEN];
    out[0..2].copy_from_slice(&syncword);
    out[2..].copy_from_slice(coded);
    out
}

/// Convolutionally encode, flush, puncture and pack `data` down to a
/// 46-byte frame body using `pattern`.
fn code_and_puncture(data: &[u8], pattern: &[bool]) -> [u8; 46] {
    let mut enc = ConvolutionalEncoder::new();
    let encoded_bytes = enc.encode(data);
    let flush_bits = enc.flush();
    let mut bits = bytes_to_bits(&encoded_bytes);
    bits.extend(flush_bits);
    let punctured = puncture(&bits, pattern);
    let mut out = [0u8; 46];
    for (i, bit) in punctured.iter().enumerate() {
        set_bit(&mut out, i, *bit);
    }
    out
}

/// Commands a caller feeds to [`FrameEncoder`] through its input stream.
#[derive(Debug, Clone)]
pub enum EncoderCommand {
    /// Start (or restart) a session by transmitting a fresh LSF frame.
    Lsf(Lsf),
    /// Emit the next stream data frame for the current session.
    StreamFrame {
        /// 16-byte opaque payload.
        payload: [u8; STREAM_PAYLOAD_LEN],
        /// Set on the final frame of the transmission.
        is_last: bool,
    },
    /// Emit one packet data frame chunk.
    PacketFrame(PacketFrame),
    /// Stage a new LSF; the swap happens at the next LICH segment-0
    /// boundary so a receiver never sees a half-updated LICH cycle.
    UpdateLsf(Lsf),
    /// Emit the end-of-transmission marker frame.
    Eot,
}

/// Plain (non-graph) M17 frame encoder.
pub struct FrameEncoderCore {
    current_lsf: Option<Lsf>,
    pending_lsf: Option<Lsf>,
    frame_num: u16,
}

impl Default for FrameEncoderCore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoderCore {
    /// New encoder with no session started yet.
    #[must_use]
    pub fn new() -> Self {
        Self { current_lsf: None, pending_lsf: None, frame_num: 0 }
    }

    /// Start a session: frame the given LSF, make it the current
    /// session LSF, and reset the frame/LICH sequence.
    pub fn encode_lsf(&mut self, lsf: &Lsf) -> [u8; ON_AIR_FRAME_LEN] {
        self.current_lsf = Some(*lsf);
        self.frame_num = 0;
        let bytes = lsf.to_bytes();
        let coded = code_and_puncture(&bytes, &LSF_PUNCTURE);
        let interleaved = interleave(&coded);
        let mut body: [u8; 46] = interleaved.try_into().unwrap();
        decorrelate(&mut body);
        pack_frame(SYNC_LSF, &body)
    }

    /// Encode the next stream data frame for the current session,
    /// folding in a LICH segment of the current LSF (segment index =
    /// `frame_num mod 6`). If the LICH cycle just rolled from segment 5
    /// back to 0 and a new LSF was staged via
    /// [`FrameEncoderCore::update_lsf_data`], the swap happens now.
    pub fn encode_stream_frame(
        &mut self,
        payload: &[u8; STREAM_PAYLOAD_LEN],
        is_last: bool,
    ) -> Result<[u8; ON_AIR_FRAME_LEN]> {
        let lsf = self.current_lsf.ok_or_else(|| Error::msg("no session LSF; call encode_lsf first"))?;

        let mut frame = StreamFrame::new(self.frame_num, *payload);
        frame.set_eos(is_last);
        let bytes = frame.to_bytes();
        let coded_payload = code_and_puncture(&bytes, &DATA_PUNCTURE);

        let seg_idx = (self.frame_num % 6) as u8;
        let lich = lsf_to_lich_segment(&lsf, seg_idx);

        let mut composite = [0u8; 46];
        composite[..12].copy_from_slice(&lich);
        composite[12..].copy_from_slice(&coded_payload[..34]);

        let interleaved = interleave(&composite);
        let mut body: [u8; 46] = interleaved.try_into().unwrap();
        decorrelate(&mut body);

        self.frame_num = frame.next_frame_num();
        if seg_idx == 5 {
            if let Some(pending) = self.pending_lsf.take() {
                debug!("FrameEncoder: swapping to staged LSF at LICH boundary");
                self.current_lsf = Some(pending);
            }
        }

        Ok(pack_frame(SYNC_STREAM, &body))
    }

    /// Encode one packet data frame chunk.
    pub fn encode_packet_frame(&mut self, frame: &PacketFrame) -> [u8; ON_AIR_FRAME_LEN] {
        let bytes = frame.to_bytes();
        debug_assert_eq!(bytes.len(), PACKET_FRAME_LEN);
        let coded = code_and_puncture(&bytes, &PACKET_PUNCTURE);
        let interleaved = interleave(&coded);
        let mut body: [u8; 46] = interleaved.try_into().unwrap();
        decorrelate(&mut body);
        pack_frame(SYNC_PACKET, &body)
    }

    /// Emit the end-of-transmission marker frame: the EOT syncword
    /// followed by a zeroed payload.
    #[must_use]
    pub fn encode_eot_frame(&self) -> [u8; ON_AIR_FRAME_LEN] {
        pack_frame(SYNC_EOT, &[0u8; 46])
    }

    /// Stage a new LSF; the swap is deferred to the next LICH segment-0
    /// boundary.
    pub fn update_lsf_data(&mut self, lsf: Lsf) {
        self.pending_lsf = Some(lsf);
    }
}

/// Block-graph wrapper around [`FrameEncoderCore`]: reads
/// [`EncoderCommand`]s and writes coded 48-byte on-air frames.
pub struct FrameEncoder {
    core: FrameEncoderCore,
    src: NCReadStream<EncoderCommand>,
    dst: NCWriteStream<Vec<u8>>,
    dst_out: NCReadStream<Vec<u8>>,
}

impl FrameEncoder {
    /// New frame encoder block reading commands from `src`.
    #[must_use]
    pub fn new(src: NCReadStream<EncoderCommand>) -> Self {
        let (dst, dst_out) = crate::stream::new_nocopy_stream();
        Self { core: FrameEncoderCore::new(), src, dst, dst_out }
    }

    /// The stream of coded 48-byte on-air frames.
    #[must_use]
    pub fn out(&self) -> NCReadStream<Vec<u8>> {
        self.dst_out.clone()
    }
}

impl BlockName for FrameEncoder {
    fn block_name(&self) -> &str {
        "FrameEncoder"
    }
}

impl Block for FrameEncoder {
    fn work(&mut self) -> Result<BlockRet> {
        let Some((cmd, tags)) = self.src.pop() else {
            return Ok(if self.src.eof() { BlockRet::EOF } else { BlockRet::Noop });
        };
        let frame = match cmd {
            EncoderCommand::Lsf(lsf) => self.core.encode_lsf(&lsf),
            EncoderCommand::StreamFrame { payload, is_last } => {
                match self.core.encode_stream_frame(&payload, is_last) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("FrameEncoder: dropping stream frame command: {e}");
                        return Ok(BlockRet::Ok);
                    }
                }
            }
            EncoderCommand::PacketFrame(pf) => self.core.encode_packet_frame(&pf),
            EncoderCommand::UpdateLsf(lsf) => {
                self.core.update_lsf_data(lsf);
                return Ok(BlockRet::Ok);
            }
            EncoderCommand::Eot => self.core.encode_eot_frame(),
        };
        self.dst.push(frame.to_vec(), tags);
        Ok(BlockRet::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsign::encode_callsign;

    fn test_lsf() -> Lsf {
        Lsf::new(encode_callsign("ALL").unwrap(), encode_callsign("N0CALL").unwrap()).unwrap()
    }

    #[test]
    fn encode_lsf_produces_48_byte_frame_with_syncword() {
        let mut enc = FrameEncoderCore::new();
        let frame = enc.encode_lsf(&test_lsf());
        assert_eq!(frame.len(), ON_AIR_FRAME_LEN);
        assert_eq!(&frame[..2], &SYNC_LSF);
    }

    #[test]
    fn encode_stream_frame_requires_lsf_first() {
        let mut enc = FrameEncoderCore::new();
        let result = enc.encode_stream_frame(&[0u8; STREAM_PAYLOAD_LEN], false);
        assert!(result.is_err());
    }

    #[test]
    fn encode_stream_frame_after_lsf_has_stream_syncword() {
        let mut enc = FrameEncoderCore::new();
        enc.encode_lsf(&test_lsf());
        let frame = enc.encode_stream_frame(&[0xAB; STREAM_PAYLOAD_LEN], false).unwrap();
        assert_eq!(&frame[..2], &SYNC_STREAM);
    }

    #[test]
    fn lsf_swap_happens_only_at_lich_boundary() {
        let mut enc = FrameEncoderCore::new();
        enc.encode_lsf(&test_lsf());
        let other =
            Lsf::new(encode_callsign("N2CALL").unwrap(), encode_callsign("N1CALL").unwrap())
                .unwrap();
        enc.update_lsf_data(other);

        // Frames 0..4 (segments 0..4): LSF hasn't swapped yet.
        for _ in 0..5 {
            enc.encode_stream_frame(&[0u8; STREAM_PAYLOAD_LEN], false).unwrap();
        }
        assert_eq!(enc.current_lsf.unwrap().destination(), test_lsf().destination());

        // Frame 5 (segment 5, the LICH boundary): swap happens after this call.
        enc.encode_stream_frame(&[0u8; STREAM_PAYLOAD_LEN], false).unwrap();
        assert_eq!(enc.current_lsf.unwrap().destination(), other.destination());
    }

    #[test]
    fn eot_frame_has_eot_syncword_and_zero_body() {
        let enc = FrameEncoderCore::new();
        let frame = enc.encode_eot_frame();
        assert_eq!(&frame[..2], &SYNC_EOT);
        assert!(frame[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn packet_frame_has_packet_syncword() {
        let mut enc = FrameEncoderCore::new();
        let pf = PacketFrame::last([0x11u8; 25], 10).unwrap();
        let frame = enc.encode_packet_frame(&pf);
        assert_eq!(&frame[..2], &SYNC_PACKET);
    }

    #[test]
    fn block_wrapper_emits_frame_per_command() {
        let (src_w, src_r) = crate::stream::new_nocopy_stream();
        let mut block = FrameEncoder::new(src_r);
        src_w.push(EncoderCommand::Lsf(test_lsf()), vec![]);
        let ret = block.work().unwrap();
        assert_eq!(ret, BlockRet::Ok);
        let (frame, _) = block.out().pop().unwrap();
        assert_eq!(frame.len(), ON_AIR_FRAME_LEN);
    }
}
