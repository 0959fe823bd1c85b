//! Baseband demodulator: syncword correlation, symbol timing recovery,
//! per-symbol quantization and frame assembly, turning a stream of
//! [`Sample16`] baseband samples back into candidate 48-byte on-air frames
//! for [`crate::frame_decoder::FrameDecoder`].
//!
//! [`DemodulatorCore`] is the plain, non-graph API; [`Demodulator`] is the
//! [`crate::block::Block`] wrapper, draining a sample
//! [`crate::stream::ReadStream`] and pushing candidate frames onto a
//! non-copy output stream.
//!
//! The correlator treats each candidate syncword as an ideal, unfiltered
//! symbol-amplitude template (the same `{-3,-1,+1,+3}` levels
//! [`crate::bits::byte_to_symbols`] produces), repeated over the 5
//! samples/symbol RX rate, and scores a window by its dot product against
//! that template: a fixed-pattern sliding-window match in the style of a
//! bit-level access-code correlator, generalized here to amplitude
//! correlation. The running mean/stddev of the correlation output and the
//! symbol envelope trackers both use a single-pole EMA recurrence
//! (`o = alpha*x + (1-alpha)*o`).

use std::collections::VecDeque;

use log::{debug, trace, warn};

use crate::bits::{byte_to_symbols, set_symbol};
use crate::block::{Block, BlockName, BlockRet};
use crate::frame::{ALL_SYNCWORDS, FRAME_SYMBOLS, SYNCWORD_SYMBOLS};
use crate::frame_encoder::ON_AIR_FRAME_LEN;
use crate::shaping::SAMPLES_PER_SYMBOL_RX;
use crate::stats::Counters;
use crate::stream::{NCReadStream, NCWriteStream, ReadStream};
use crate::{Result, Sample16};

const SPS: usize = SAMPLES_PER_SYMBOL_RX;

/// Length, in samples, of one syncword's correlation template.
const SYNC_TEMPLATE_LEN: usize = SYNCWORD_SYMBOLS * SPS;

/// Length, in samples, of one full 48-byte on-air frame (syncword + body).
const FRAME_SAMPLES: usize = FRAME_SYMBOLS * SPS;

/// Number of distinct syncwords the correlator scores against.
const NUM_SYNCWORDS: usize = ALL_SYNCWORDS.len();

/// Default correlation threshold factor `k` in "|correlation| >
/// k·stddev(correlation)".
pub const DEFAULT_SYNC_THRESHOLD_K: f32 = 3.0;

/// Default count of consecutive missed frames before the EMAs are reset.
pub const DEFAULT_LOCK_LOSS_FRAMES: u32 = 8;

/// Cap on buffered-but-unconsumed samples before the oldest are dropped
/// (a [`crate::Error::BufferOverflow`] condition): the prior frame wasn't
/// consumed fast enough.
const MAX_BUFFERED_SAMPLES: usize = FRAME_SAMPLES * 8;

/// Which syncword a correlation search matched, in [`ALL_SYNCWORDS`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Link Setup Frame syncword.
    Lsf,
    /// BERT test-pattern syncword.
    Bert,
    /// Stream data frame syncword.
    Stream,
    /// Packet data frame syncword.
    Packet,
    /// End-of-transmission syncword.
    Eot,
}

impl SyncKind {
    fn from_index(i: usize) -> Self {
        match i {
            0 => SyncKind::Lsf,
            1 => SyncKind::Bert,
            2 => SyncKind::Stream,
            3 => SyncKind::Packet,
            4 => SyncKind::Eot,
            _ => unreachable!("ALL_SYNCWORDS has exactly {NUM_SYNCWORDS} entries"),
        }
    }
}

/// One fully quantized candidate frame, plus the syncword the correlator
/// matched to find it (informational only: [`crate::frame_decoder`]
/// reclassifies the recovered bytes independently).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFrame {
    /// The 48-byte candidate on-air frame (syncword + quantized body).
    pub bytes: [u8; ON_AIR_FRAME_LEN],
    /// Which syncword the correlator matched.
    pub kind: SyncKind,
}

/// Exponential moving average of a scalar and its variance.
#[derive(Debug, Clone, Copy)]
struct RunningStats {
    mean: f32,
    var: f32,
    alpha: f32,
}

impl RunningStats {
    fn new(alpha: f32) -> Self {
        Self { mean: 0.0, var: 1.0, alpha }
    }

    fn update(&mut self, x: f32) {
        let d = x - self.mean;
        self.mean += self.alpha * d;
        self.var = (1.0 - self.alpha) * (self.var + self.alpha * d * d);
    }

    fn stddev(&self) -> f32 {
        self.var.max(1e-6).sqrt()
    }
}

/// Peak-hold-with-decay envelope tracker for the `{-3,-1,+1,+3}` symbol
/// quantization midpoints.
#[derive(Debug, Clone, Copy)]
struct Envelope {
    max: f32,
    min: f32,
    decay: f32,
}

impl Envelope {
    fn new(decay: f32) -> Self {
        Self { max: 3.0, min: -3.0, decay }
    }

    fn update(&mut self, s: f32) {
        if s > self.max {
            self.max = s;
        } else {
            self.max *= 1.0 - self.decay;
        }
        if s < self.min {
            self.min = s;
        } else {
            self.min *= 1.0 - self.decay;
        }
    }

    fn quantize(&self, s: f32) -> i8 {
        let hi = self.max / 2.0;
        let lo = self.min / 2.0;
        if s > hi {
            3
        } else if s > 0.0 {
            1
        } else if s > lo {
            -1
        } else {
            -3
        }
    }
}

fn sync_templates() -> [[f32; SYNC_TEMPLATE_LEN]; NUM_SYNCWORDS] {
    let mut out = [[0f32; SYNC_TEMPLATE_LEN]; NUM_SYNCWORDS];
    for (t, sync) in out.iter_mut().zip(ALL_SYNCWORDS.iter()) {
        let mut sym_i = 0;
        for &byte in sync {
            for symbol in byte_to_symbols(byte) {
                for s in 0..SPS {
                    t[sym_i * SPS + s] = f32::from(symbol);
                }
                sym_i += 1;
            }
        }
    }
    out
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Plain (non-graph) M17 demodulator.
pub struct DemodulatorCore {
    templates: [[f32; SYNC_TEMPLATE_LEN]; NUM_SYNCWORDS],
    stats: RunningStats,
    envelope: Envelope,
    threshold_k: f32,
    max_lock_loss: u32,
    locked: bool,
    consecutive_misses: u32,
    buf: VecDeque<f32>,
    counters: Counters,
}

impl Default for DemodulatorCore {
    fn default() -> Self {
        Self::new()
    }
}

impl DemodulatorCore {
    /// New demodulator with default thresholds, unlocked.
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: sync_templates(),
            stats: RunningStats::new(0.05),
            envelope: Envelope::new(0.01),
            threshold_k: DEFAULT_SYNC_THRESHOLD_K,
            max_lock_loss: DEFAULT_LOCK_LOSS_FRAMES,
            locked: false,
            consecutive_misses: 0,
            buf: VecDeque::new(),
            counters: Counters::new(),
        }
    }

    /// Override the correlation threshold factor `k`.
    #[must_use]
    pub fn with_threshold_k(mut self, k: f32) -> Self {
        self.threshold_k = k;
        self
    }

    /// Override the consecutive-missed-frame count before EMAs reset.
    #[must_use]
    pub fn with_max_lock_loss(mut self, max: u32) -> Self {
        self.max_lock_loss = max;
        self
    }

    /// True once a syncword has been found and timing recovered.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Running decode counters.
    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Feed newly arrived baseband samples.
    ///
    /// If more samples have accumulated than fit in the internal window,
    /// the oldest are dropped: the prior frame was not consumed fast
    /// enough.
    pub fn push_samples(&mut self, samples: &[Sample16]) {
        self.buf.extend(samples.iter().map(|&s| f32::from(s)));
        if self.buf.len() > MAX_BUFFERED_SAMPLES {
            let excess = self.buf.len() - MAX_BUFFERED_SAMPLES;
            warn!("Demodulator: sample buffer overflow, dropping {excess} oldest samples");
            self.buf.drain(0..excess);
        }
    }

    /// Search the buffered samples for the next complete candidate frame.
    ///
    /// Returns `None` if no syncword has yet been found above threshold in
    /// the buffered window, or one has been found but not enough trailing
    /// samples have arrived yet to quantize the whole frame.
    pub fn try_next_frame(&mut self) -> Option<FoundFrame> {
        self.buf.make_contiguous();
        let samples = self.buf.as_slices().0;

        let max_start = samples.len().checked_sub(SYNC_TEMPLATE_LEN)?;
        let mut best: Option<(usize, usize, f32)> = None; // (offset, kind_index, |corr|)
        for offset in 0..=max_start {
            let window = &samples[offset..offset + SYNC_TEMPLATE_LEN];
            for (kind_index, template) in self.templates.iter().enumerate() {
                let corr = dot(window, template) / SYNC_TEMPLATE_LEN as f32;
                self.stats.update(corr);
                let mag = corr.abs();
                if best.is_none_or(|(_, _, b)| mag > b) {
                    best = Some((offset, kind_index, mag));
                }
            }
        }
        let (offset, kind_index, mag) = best?;

        if mag <= self.threshold_k * self.stats.stddev() {
            if samples.len() >= FRAME_SAMPLES {
                self.note_miss();
            }
            return None;
        }

        let symbol_start = offset + 2;
        let needed = symbol_start + (FRAME_SYMBOLS - 1) * SPS + 1;
        if needed > samples.len() {
            // Timing found, but the rest of the frame hasn't arrived yet.
            return None;
        }

        let mut bytes = [0u8; ON_AIR_FRAME_LEN];
        for sym_idx in 0..FRAME_SYMBOLS {
            let s = samples[symbol_start + sym_idx * SPS];
            self.envelope.update(s);
            let symbol = self.envelope.quantize(s);
            set_symbol(&mut bytes, sym_idx, symbol);
        }

        trace!(
            "Demodulator: syncword candidate {kind_index} found at sample offset {offset} (|corr|={mag:.2})"
        );
        self.locked = true;
        self.consecutive_misses = 0;
        self.buf.drain(0..needed);
        Some(FoundFrame { bytes, kind: SyncKind::from_index(kind_index) })
    }

    fn note_miss(&mut self) {
        self.consecutive_misses += 1;
        if self.consecutive_misses >= self.max_lock_loss {
            debug!(
                "Demodulator: lock loss after {} missed frames, resetting EMAs",
                self.consecutive_misses
            );
            self.stats = RunningStats::new(self.stats.alpha);
            self.envelope = Envelope::new(self.envelope.decay);
            self.locked = false;
            self.consecutive_misses = 0;
            self.counters.record_sync_loss();
        }
    }
}

/// Block-graph wrapper around [`DemodulatorCore`]: reads baseband samples
/// from a [`ReadStream<Sample16>`] and writes candidate 48-byte frames to a
/// non-copy output stream for [`crate::frame_decoder::FrameDecoder`].
pub struct Demodulator {
    core: DemodulatorCore,
    src: ReadStream<Sample16>,
    dst: NCWriteStream<Vec<u8>>,
    dst_out: NCReadStream<Vec<u8>>,
}

impl Demodulator {
    /// New demodulator block reading baseband samples from `src`.
    #[must_use]
    pub fn new(src: ReadStream<Sample16>) -> Self {
        let (dst, dst_out) = crate::stream::new_nocopy_stream();
        Self { core: DemodulatorCore::new(), src, dst, dst_out }
    }

    /// The stream of candidate on-air frames.
    #[must_use]
    pub fn out(&self) -> NCReadStream<Vec<u8>> {
        self.dst_out.clone()
    }

    /// Running decode counters.
    #[must_use]
    pub fn counters(&self) -> &Counters {
        self.core.counters()
    }
}

impl BlockName for Demodulator {
    fn block_name(&self) -> &str {
        "Demodulator"
    }
}

impl Block for Demodulator {
    fn work(&mut self) -> Result<BlockRet> {
        let (i, _tags) = self.src.read_buf()?;
        let got = i.len();
        if got > 0 {
            self.core.push_samples(i.slice());
            i.consume(got);
        }
        match self.core.try_next_frame() {
            Some(found) => {
                self.dst.push(found.bytes.to_vec(), vec![]);
                Ok(BlockRet::Ok)
            }
            None if got == 0 && self.src.eof() => Ok(BlockRet::EOF),
            None if got == 0 => Ok(BlockRet::Noop),
            None => Ok(BlockRet::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsign::encode_callsign;
    use crate::frame_encoder::FrameEncoderCore;
    use crate::lsf::Lsf;

    fn test_lsf() -> Lsf {
        Lsf::new(encode_callsign("ALL").unwrap(), encode_callsign("N0CALL").unwrap()).unwrap()
    }

    /// Turn a coded 48-byte on-air frame into the RX-rate (5
    /// samples/symbol) baseband waveform a perfect, noiseless receive
    /// chain would deliver: each symbol's ideal amplitude, held flat for
    /// `SPS` samples.
    fn frame_to_rx_samples(frame: &[u8; ON_AIR_FRAME_LEN]) -> Vec<Sample16> {
        let mut out = Vec::with_capacity(FRAME_SAMPLES);
        for &byte in frame {
            for symbol in byte_to_symbols(byte) {
                for _ in 0..SPS {
                    out.push(Sample16::from(symbol));
                }
            }
        }
        out
    }

    #[test]
    fn recovers_lsf_frame_from_clean_samples() {
        let mut enc = FrameEncoderCore::new();
        let frame = enc.encode_lsf(&test_lsf());
        let samples = frame_to_rx_samples(&frame);

        let mut demod = DemodulatorCore::new();
        demod.push_samples(&samples);
        let found = demod.try_next_frame().expect("demodulator should find the frame");
        assert_eq!(found.bytes, frame);
        assert!(demod.is_locked());
    }

    #[test]
    fn waits_for_the_full_frame_before_returning() {
        let mut enc = FrameEncoderCore::new();
        let frame = enc.encode_lsf(&test_lsf());
        let samples = frame_to_rx_samples(&frame);
        let half = samples.len() / 2;

        let mut demod = DemodulatorCore::new();
        demod.push_samples(&samples[..half]);
        assert!(demod.try_next_frame().is_none());

        demod.push_samples(&samples[half..]);
        assert!(demod.try_next_frame().is_some());
    }

    #[test]
    fn recovers_stream_frame_after_lsf() {
        let mut enc = FrameEncoderCore::new();
        enc.encode_lsf(&test_lsf());
        let frame = enc.encode_stream_frame(&[0x5Au8; crate::stream_frame::STREAM_PAYLOAD_LEN], false).unwrap();
        let samples = frame_to_rx_samples(&frame);

        let mut demod = DemodulatorCore::new();
        demod.push_samples(&samples);
        let found = demod.try_next_frame().expect("demodulator should find the frame");
        assert_eq!(found.bytes, frame);
    }

    #[test]
    fn lock_loss_resets_after_consistent_misses() {
        let mut demod = DemodulatorCore::new().with_max_lock_loss(3);
        let silence = vec![0i16; FRAME_SAMPLES + SYNC_TEMPLATE_LEN];
        for _ in 0..3 {
            demod.push_samples(&silence);
            assert!(demod.try_next_frame().is_none());
        }
        assert_eq!(demod.counters().sync_losses, 1);
    }

    #[test]
    fn buffer_overflow_drops_oldest_samples_without_panic() {
        let mut demod = DemodulatorCore::new();
        let chunk = vec![0i16; FRAME_SAMPLES];
        for _ in 0..20 {
            demod.push_samples(&chunk);
        }
        assert!(demod.buf.len() <= MAX_BUFFERED_SAMPLES);
    }

    #[test]
    fn block_wrapper_emits_candidate_frame() {
        let mut enc = FrameEncoderCore::new();
        let frame = enc.encode_lsf(&test_lsf());
        let samples = frame_to_rx_samples(&frame);

        let (src_w, src_r) = crate::stream::new_stream::<Sample16>();
        {
            let w = src_w.write_buf().unwrap();
            let mut w = w;
            let n = samples.len().min(w.len());
            w.slice()[..n].copy_from_slice(&samples[..n]);
            w.produce(n, &[]);
        }
        let mut block = Demodulator::new(src_r);
        let ret = block.work().unwrap();
        assert_eq!(ret, BlockRet::Ok);
        let (bytes, _tags) = block.out().pop().unwrap();
        assert_eq!(bytes, frame.to_vec());
    }
}
