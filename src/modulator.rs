//! Baseband modulator: 4-FSK symbol mapping plus RRC pulse shaping, turning
//! coded 48-byte on-air frames into a stream of [`Sample16`] baseband
//! samples.
//!
//! [`ModulatorCore`] is the plain, non-graph API; [`Modulator`] is the
//! [`crate::block::Block`] wrapper, which additionally reproduces a
//! double-buffered handoff: one frame is fully shaped into a pending
//! sample queue (the "idle" buffer) before any of it is handed to the
//! output stream (the "active" buffer being drained). The explicit
//! ping-pong of two fixed buffers a hardware target might use is collapsed
//! into one `VecDeque`, since this crate's `WriteStream` already provides
//! the backpressure (`write_buf()`/`free()`) that a hand-rolled
//! buffer-drained signal would otherwise exist to provide.

use std::collections::VecDeque;

use log::debug;

use crate::bits::byte_to_symbols;
use crate::block::{Block, BlockName, BlockRet};
use crate::frame::FRAME_SYMBOLS;
use crate::frame_encoder::ON_AIR_FRAME_LEN;
use crate::shaping::{Shaper, SAMPLES_PER_SYMBOL_TX};
use crate::stream::{NCReadStream, ReadStream, WriteStream};
use crate::{Result, Sample16};

/// Plain (non-graph) M17 modulator.
pub struct ModulatorCore {
    shaper: Shaper,
}

impl Default for ModulatorCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModulatorCore {
    /// New modulator, RRC shaper reset.
    #[must_use]
    pub fn new() -> Self {
        Self { shaper: Shaper::new_tx() }
    }

    /// Shape one coded 48-byte on-air frame into its full run of baseband
    /// samples (`FRAME_SYMBOLS * SAMPLES_PER_SYMBOL_TX` samples).
    pub fn send(&mut self, frame: &[u8; ON_AIR_FRAME_LEN]) -> Vec<Sample16> {
        let mut out = Vec::with_capacity(FRAME_SYMBOLS * SAMPLES_PER_SYMBOL_TX);
        for &byte in frame {
            for symbol in byte_to_symbols(byte) {
                out.extend(self.shaper.shape_symbol(symbol, SAMPLES_PER_SYMBOL_TX));
            }
        }
        out
    }
}

/// Block-graph wrapper around [`ModulatorCore`].
///
/// `start()`/`stop()` gate frame intake, matching a transmitter's
/// start/stop semantics: frames arriving before `start()` or after
/// `stop()` are ignored, but samples already queued from prior frames
/// continue draining.
pub struct Modulator {
    core: ModulatorCore,
    src: NCReadStream<Vec<u8>>,
    dst: WriteStream<Sample16>,
    dst_out: ReadStream<Sample16>,
    pending: VecDeque<Sample16>,
    started: bool,
    stopped: bool,
}

impl Modulator {
    /// New modulator block reading coded frames from `src`.
    #[must_use]
    pub fn new(src: NCReadStream<Vec<u8>>) -> Self {
        let (dst, dst_out) = crate::stream::new_stream();
        Self {
            core: ModulatorCore::new(),
            src,
            dst,
            dst_out,
            pending: VecDeque::new(),
            started: false,
            stopped: false,
        }
    }

    /// The stream of baseband samples.
    #[must_use]
    pub fn out(&self) -> ReadStream<Sample16> {
        self.dst_out.clone()
    }

    /// Begin accepting frames from `src`.
    pub fn start(&mut self) {
        self.started = true;
    }

    /// Stop accepting new frames. Samples already queued continue to
    /// drain; `work()` reports `EOF` once the queue empties.
    pub fn stop(&mut self) {
        self.stopped = true;
    }
}

impl BlockName for Modulator {
    fn block_name(&self) -> &str {
        "Modulator"
    }
}

impl Block for Modulator {
    fn work(&mut self) -> Result<BlockRet> {
        if !self.started {
            return Ok(BlockRet::Noop);
        }
        if self.pending.is_empty() {
            if self.stopped {
                return Ok(BlockRet::EOF);
            }
            let Some((bytes, _tags)) = self.src.pop() else {
                return Ok(if self.src.eof() { BlockRet::EOF } else { BlockRet::Noop });
            };
            if bytes.len() != ON_AIR_FRAME_LEN {
                debug!("Modulator: dropping malformed frame ({} bytes)", bytes.len());
                return Ok(BlockRet::Ok);
            }
            let mut arr = [0u8; ON_AIR_FRAME_LEN];
            arr.copy_from_slice(&bytes);
            self.pending.extend(self.core.send(&arr));
        }

        let mut o = self.dst.write_buf()?;
        let n = o.len().min(self.pending.len());
        if n == 0 {
            return Ok(BlockRet::Noop);
        }
        for place in o.slice()[..n].iter_mut() {
            *place = self.pending.pop_front().expect("n bounded by pending.len()");
        }
        o.produce(n, &[]);
        Ok(BlockRet::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_produces_expected_sample_count() {
        let mut modulator = ModulatorCore::new();
        let frame = [0xAAu8; ON_AIR_FRAME_LEN];
        let samples = modulator.send(&frame);
        assert_eq!(samples.len(), FRAME_SYMBOLS * SAMPLES_PER_SYMBOL_TX);
    }

    #[test]
    fn block_ignores_frames_before_start() {
        let (src_w, src_r) = crate::stream::new_nocopy_stream();
        let mut block = Modulator::new(src_r);
        src_w.push(vec![0u8; ON_AIR_FRAME_LEN], vec![]);
        assert_eq!(block.work().unwrap(), BlockRet::Noop);
    }

    #[test]
    fn block_drains_samples_after_start() {
        let (src_w, src_r) = crate::stream::new_nocopy_stream();
        let mut block = Modulator::new(src_r);
        block.start();
        src_w.push(vec![0u8; ON_AIR_FRAME_LEN], vec![]);
        let ret = block.work().unwrap();
        assert_eq!(ret, BlockRet::Ok);
        let (r, _tags) = block.out().read_buf().unwrap();
        assert!(r.len() > 0);
    }

    #[test]
    fn stop_drains_then_reports_eof() {
        let (src_w, src_r) = crate::stream::new_nocopy_stream();
        let mut block = Modulator::new(src_r);
        block.start();
        src_w.push(vec![0u8; ON_AIR_FRAME_LEN], vec![]);
        block.work().unwrap();
        drop(src_w);
        block.stop();
        // Drain remaining queued samples across as many calls as it takes.
        let mut saw_eof = false;
        for _ in 0..1000 {
            match block.work().unwrap() {
                BlockRet::EOF => {
                    saw_eof = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(saw_eof);
    }
}
