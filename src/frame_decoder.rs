//! Inbound frame decoding: syncword classification, reverse-decorrelation
//! and deinterleaving, depuncturing, Viterbi decoding, and per-kind
//! payload extraction, turning a candidate 48-byte on-air frame into a
//! [`DecodedFrame`] the caller acts on.
//!
//! [`FrameDecoderCore`] is the plain, non-graph API; [`FrameDecoder`] is a
//! thin [`crate::block::Block`] wrapper that drives it from a non-copy
//! stream of candidate frames.

use log::{debug, trace};

use crate::bits::{get_bit, hamming_distance_bytes};
use crate::block::{Block, BlockName, BlockRet};
use crate::decorrelate::decorrelate;
use crate::frame::{ALL_SYNCWORDS, SYNCWORD_BYTES, SYNC_BERT, SYNC_EOT, SYNC_LSF, SYNC_PACKET, SYNC_STREAM};
use crate::frame_encoder::ON_AIR_FRAME_LEN;
use crate::interleave::deinterleave;
use crate::lsf::{lich_segment_to_chunk, LichReassembler, Lsf, LICH_SEGMENT_LEN, LSF_LEN};
use crate::packet_frame::{PacketFrame, PACKET_FRAME_LEN};
use crate::puncture::{DATA_PUNCTURE, LSF_PUNCTURE, PACKET_PUNCTURE};
use crate::stats::Counters;
use crate::stream::{NCReadStream, NCWriteStream};
use crate::stream_frame::{StreamFrame, STREAM_FRAME_LEN, STREAM_PAYLOAD_LEN};
use crate::viterbi::ViterbiDecoder;

/// Default ceiling on Viterbi-corrected bit errors before a frame is
/// dropped, matching `M17FrameDecoder.hpp`.
pub const DEFAULT_MAX_VITERBI_ERRORS: u32 = 15;

/// Default ceiling on syncword Hamming distance before a candidate frame
/// is reported `Unknown`.
pub const DEFAULT_MAX_SYNC_HAMM_DISTANCE: u32 = 4;

/// The preamble is a fixed bit pattern (alternating `0111 0111`), not one
/// of the correlation syncwords; it is recognized by exact match.
const PREAMBLE_PATTERN: [u8; SYNCWORD_BYTES] = [0x77, 0x77];

fn bytes_to_bits(data: &[u8]) -> Vec<bool> {
    (0..data.len() * 8).map(|i| get_bit(data, i)).collect()
}

/// Outcome of decoding one candidate on-air frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    /// The fixed preamble pattern, not a framed syncword.
    Preamble,
    /// A Link Setup Frame, CRC-valid.
    Lsf(Lsf),
    /// A stream data frame.
    Stream {
        /// Monotonic frame counter, 0..0x7FFF.
        frame_num: u16,
        /// End-of-stream flag.
        is_last: bool,
        /// 16-byte opaque payload.
        payload: [u8; STREAM_PAYLOAD_LEN],
    },
    /// A packet data frame chunk's payload (after EOF/length trimming).
    Packet(Vec<u8>),
    /// End-of-transmission marker.
    Eot,
    /// Syncword search found no candidate within the allowed Hamming
    /// distance, or the frame failed CRC/Viterbi-threshold validation.
    Unknown,
}

fn classify_syncword(header: &[u8], max_distance: u32) -> Option<usize> {
    ALL_SYNCWORDS
        .iter()
        .map(|sw| hamming_distance_bytes(header, sw))
        .enumerate()
        .min_by_key(|&(_, d)| d)
        .filter(|&(_, d)| d <= max_distance)
        .map(|(i, _)| i)
}

/// Plain (non-graph) M17 frame decoder.
pub struct FrameDecoderCore {
    max_viterbi_errors: u32,
    max_sync_distance: u32,
    lich: LichReassembler,
    current_lsf: Option<Lsf>,
    counters: Counters,
}

impl Default for FrameDecoderCore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoderCore {
    /// New decoder with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_viterbi_errors: DEFAULT_MAX_VITERBI_ERRORS,
            max_sync_distance: DEFAULT_MAX_SYNC_HAMM_DISTANCE,
            lich: LichReassembler::new(),
            current_lsf: None,
            counters: Counters::new(),
        }
    }

    /// Override the Viterbi-corrected-error drop threshold.
    #[must_use]
    pub fn with_max_viterbi_errors(mut self, max: u32) -> Self {
        self.max_viterbi_errors = max;
        self
    }

    /// Override the syncword Hamming-distance acceptance threshold.
    #[must_use]
    pub fn with_max_sync_distance(mut self, max: u32) -> Self {
        self.max_sync_distance = max;
        self
    }

    /// The LSF most recently validated, from either an LSF frame or a
    /// fully reassembled LICH cycle.
    #[must_use]
    pub fn current_lsf(&self) -> Option<Lsf> {
        self.current_lsf
    }

    /// Running decode counters.
    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Decode one candidate 48-byte on-air frame.
    pub fn push_frame(&mut self, bytes: &[u8; ON_AIR_FRAME_LEN]) -> DecodedFrame {
        if bytes[0..SYNCWORD_BYTES] == PREAMBLE_PATTERN {
            return DecodedFrame::Preamble;
        }

        let Some(kind) = classify_syncword(&bytes[0..SYNCWORD_BYTES], self.max_sync_distance) else {
            trace!("FrameDecoder: no syncword within Hamming distance {}", self.max_sync_distance);
            self.counters.record_dropped();
            return DecodedFrame::Unknown;
        };

        let mut body = bytes[SYNCWORD_BYTES..].to_vec();
        decorrelate(&mut body);
        let body = deinterleave(&body);

        match ALL_SYNCWORDS[kind] {
            s if s == SYNC_LSF => self.decode_lsf(&body),
            s if s == SYNC_STREAM => self.decode_stream(&body),
            s if s == SYNC_PACKET => self.decode_packet(&body),
            s if s == SYNC_EOT => DecodedFrame::Eot,
            s if s == SYNC_BERT => {
                debug!("FrameDecoder: BERT test frame, not surfaced to caller");
                self.counters.record_dropped();
                DecodedFrame::Unknown
            }
            _ => unreachable!("classify_syncword returned an index outside ALL_SYNCWORDS"),
        }
    }

    fn decode_lsf(&mut self, body: &[u8]) -> DecodedFrame {
        let total_bits = LSF_LEN * 16 + 8;
        let bits = bytes_to_bits(body);
        let mut dec = ViterbiDecoder::new();
        let (decoded, errors) = dec.decode_punctured(&bits, &LSF_PUNCTURE, total_bits);
        if errors > self.max_viterbi_errors {
            debug!("FrameDecoder: LSF frame exceeded Viterbi threshold ({errors} errors)");
            self.counters.record_dropped();
            return DecodedFrame::Unknown;
        }
        let mut lsf_bytes = [0u8; LSF_LEN];
        lsf_bytes.copy_from_slice(&decoded[..LSF_LEN]);
        match Lsf::from_bytes(&lsf_bytes) {
            Ok(lsf) => {
                self.current_lsf = Some(lsf);
                self.counters.record_decoded(errors);
                DecodedFrame::Lsf(lsf)
            }
            Err(_) => {
                debug!("FrameDecoder: LSF frame CRC mismatch");
                self.counters.record_crc_error();
                DecodedFrame::Unknown
            }
        }
    }

    fn decode_stream(&mut self, body: &[u8]) -> DecodedFrame {
        let mut lich_segment = [0u8; LICH_SEGMENT_LEN];
        lich_segment.copy_from_slice(&body[..LICH_SEGMENT_LEN]);
        match lich_segment_to_chunk(&lich_segment) {
            Ok((payload, idx, _errors)) => {
                if let Some(lsf) = self.lich.feed(&payload, idx) {
                    self.current_lsf = Some(lsf);
                }
            }
            Err(_) => {
                debug!("FrameDecoder: LICH segment uncorrectable, dropping this cycle's segment");
                self.counters.record_golay_error();
            }
        }

        let payload_coded = &body[LICH_SEGMENT_LEN..];
        let total_bits = STREAM_FRAME_LEN * 16 + 8;
        let bits = bytes_to_bits(payload_coded);
        let mut dec = ViterbiDecoder::new();
        let (decoded, errors) = dec.decode_punctured(&bits, &DATA_PUNCTURE, total_bits);
        if errors > self.max_viterbi_errors {
            debug!("FrameDecoder: stream frame exceeded Viterbi threshold ({errors} errors)");
            self.counters.record_dropped();
            return DecodedFrame::Unknown;
        }
        match StreamFrame::from_bytes(&decoded[..STREAM_FRAME_LEN]) {
            Ok(frame) => {
                self.counters.record_decoded(errors);
                DecodedFrame::Stream {
                    frame_num: frame.frame_num(),
                    is_last: frame.is_last(),
                    payload: *frame.payload(),
                }
            }
            Err(_) => {
                self.counters.record_dropped();
                DecodedFrame::Unknown
            }
        }
    }

    fn decode_packet(&mut self, body: &[u8]) -> DecodedFrame {
        let total_bits = PACKET_FRAME_LEN * 16 + 8;
        let bits = bytes_to_bits(body);
        let mut dec = ViterbiDecoder::new();
        let (decoded, errors) = dec.decode_punctured(&bits, &PACKET_PUNCTURE, total_bits);
        if errors > self.max_viterbi_errors {
            debug!("FrameDecoder: packet frame exceeded Viterbi threshold ({errors} errors)");
            self.counters.record_dropped();
            return DecodedFrame::Unknown;
        }
        match PacketFrame::from_bytes(&decoded[..PACKET_FRAME_LEN]) {
            Ok(frame) => {
                self.counters.record_decoded(errors);
                DecodedFrame::Packet(frame.payload().to_vec())
            }
            Err(_) => {
                self.counters.record_dropped();
                DecodedFrame::Unknown
            }
        }
    }
}

/// Block-graph wrapper around [`FrameDecoderCore`]: reads candidate
/// 48-byte on-air frames and writes [`DecodedFrame`]s.
pub struct FrameDecoder {
    core: FrameDecoderCore,
    src: NCReadStream<Vec<u8>>,
    dst: NCWriteStream<DecodedFrame>,
    dst_out: NCReadStream<DecodedFrame>,
}

impl FrameDecoder {
    /// New frame decoder block reading candidate frames from `src`.
    #[must_use]
    pub fn new(src: NCReadStream<Vec<u8>>) -> Self {
        let (dst, dst_out) = crate::stream::new_nocopy_stream();
        Self { core: FrameDecoderCore::new(), src, dst, dst_out }
    }

    /// The stream of decoded frames.
    #[must_use]
    pub fn out(&self) -> NCReadStream<DecodedFrame> {
        self.dst_out.clone()
    }

    /// Running decode counters.
    #[must_use]
    pub fn counters(&self) -> &Counters {
        self.core.counters()
    }
}

impl BlockName for FrameDecoder {
    fn block_name(&self) -> &str {
        "FrameDecoder"
    }
}

impl Block for FrameDecoder {
    fn work(&mut self) -> crate::Result<BlockRet> {
        let Some((bytes, tags)) = self.src.pop() else {
            return Ok(if self.src.eof() { BlockRet::EOF } else { BlockRet::Noop });
        };
        if bytes.len() != ON_AIR_FRAME_LEN {
            debug!("FrameDecoder: dropping malformed candidate frame ({} bytes)", bytes.len());
            return Ok(BlockRet::Ok);
        }
        let mut arr = [0u8; ON_AIR_FRAME_LEN];
        arr.copy_from_slice(&bytes);
        let decoded = self.core.push_frame(&arr);
        self.dst.push(decoded, tags);
        Ok(BlockRet::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsign::encode_callsign;
    use crate::frame_encoder::FrameEncoderCore;

    fn test_lsf() -> Lsf {
        Lsf::new(encode_callsign("ALL").unwrap(), encode_callsign("N0CALL").unwrap()).unwrap()
    }

    #[test]
    fn roundtrip_lsf_frame() {
        let mut enc = FrameEncoderCore::new();
        let frame = enc.encode_lsf(&test_lsf());

        let mut dec = FrameDecoderCore::new();
        match dec.push_frame(&frame) {
            DecodedFrame::Lsf(lsf) => {
                assert_eq!(lsf.destination(), test_lsf().destination());
                assert_eq!(lsf.source(), test_lsf().source());
            }
            other => panic!("expected Lsf, got {other:?}"),
        }
        assert_eq!(dec.counters().frames_decoded, 1);
    }

    #[test]
    fn roundtrip_stream_frame_reassembles_lich_over_six_frames() {
        let mut enc = FrameEncoderCore::new();
        enc.encode_lsf(&test_lsf());

        let mut dec = FrameDecoderCore::new();
        let mut last_result = None;
        for i in 0..6u16 {
            let payload = [i as u8; STREAM_PAYLOAD_LEN];
            let frame = enc.encode_stream_frame(&payload, false).unwrap();
            match dec.push_frame(&frame) {
                DecodedFrame::Stream { frame_num, is_last, payload: got } => {
                    assert_eq!(frame_num, i);
                    assert!(!is_last);
                    assert_eq!(got, payload);
                }
                other => panic!("expected Stream, got {other:?}"),
            }
            last_result = dec.current_lsf();
        }
        assert_eq!(last_result.unwrap().destination(), test_lsf().destination());
    }

    #[test]
    fn last_stream_frame_sets_eos() {
        let mut enc = FrameEncoderCore::new();
        enc.encode_lsf(&test_lsf());
        let frame = enc.encode_stream_frame(&[0xAB; STREAM_PAYLOAD_LEN], true).unwrap();

        let mut dec = FrameDecoderCore::new();
        match dec.push_frame(&frame) {
            DecodedFrame::Stream { is_last, .. } => assert!(is_last),
            other => panic!("expected Stream, got {other:?}"),
        }
    }

    #[test]
    fn roundtrip_packet_frame() {
        let mut enc = FrameEncoderCore::new();
        let pf = PacketFrame::last(
            {
                let mut d = [0u8; 25];
                d[..5].copy_from_slice(b"hello");
                d
            },
            5,
        )
        .unwrap();
        let frame = enc.encode_packet_frame(&pf);

        let mut dec = FrameDecoderCore::new();
        match dec.push_frame(&frame) {
            DecodedFrame::Packet(payload) => assert_eq!(payload, b"hello"),
            other => panic!("expected Packet, got {other:?}"),
        }
    }

    #[test]
    fn eot_frame_recognized() {
        let enc = FrameEncoderCore::new();
        let frame = enc.encode_eot_frame();
        let mut dec = FrameDecoderCore::new();
        assert_eq!(dec.push_frame(&frame), DecodedFrame::Eot);
    }

    #[test]
    fn preamble_pattern_recognized() {
        let mut frame = [0u8; ON_AIR_FRAME_LEN];
        frame[0] = 0x77;
        frame[1] = 0x77;
        let mut dec = FrameDecoderCore::new();
        assert_eq!(dec.push_frame(&frame), DecodedFrame::Preamble);
    }

    #[test]
    fn garbage_syncword_reported_unknown() {
        let mut frame = [0xAAu8; ON_AIR_FRAME_LEN];
        frame[0] = 0x12;
        frame[1] = 0x34;
        let mut dec = FrameDecoderCore::new();
        assert_eq!(dec.push_frame(&frame), DecodedFrame::Unknown);
        assert_eq!(dec.counters().frames_dropped, 1);
    }

    #[test]
    fn excessive_bit_errors_drop_the_frame() {
        let mut enc = FrameEncoderCore::new();
        let mut frame = enc.encode_lsf(&test_lsf());
        // Flip enough payload bits that Viterbi can't plausibly recover,
        // without disturbing the syncword itself.
        for b in &mut frame[2..20] {
            *b ^= 0xFF;
        }

        let mut dec = FrameDecoderCore::new().with_max_viterbi_errors(1);
        assert_eq!(dec.push_frame(&frame), DecodedFrame::Unknown);
    }

    #[test]
    fn block_wrapper_emits_decoded_frame() {
        let mut enc = FrameEncoderCore::new();
        let frame = enc.encode_lsf(&test_lsf());

        let (src_w, src_r) = crate::stream::new_nocopy_stream();
        let mut block = FrameDecoder::new(src_r);
        src_w.push(frame.to_vec(), vec![]);
        let ret = block.work().unwrap();
        assert_eq!(ret, BlockRet::Ok);
        let (decoded, _) = block.out().pop().unwrap();
        assert!(matches!(decoded, DecodedFrame::Lsf(_)));
    }
}
