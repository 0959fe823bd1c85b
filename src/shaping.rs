//! Root-raised-cosine (RRC) pulse shaping: the 81-tap symmetric FIR that
//! turns a stream of 4-FSK symbols into a smooth baseband waveform (TX) or
//! matched-filters received baseband back down to one sample per symbol
//! (RX).
//!
//! `M17DSP.h` declares the canonical tap table as an `extern` array with no
//! defining source captured in the retrieved pack, so this implementation
//! computes the taps analytically from the standard RRC formula at the
//! M17 roll-off (β=0.5) instead of transcribing a missing constant table
//! (see DESIGN.md). [`Shaper`] is a straightforward streaming FIR, in the
//! style of a tap-reversed dot product over a delay line; [`IntegerShaper`]
//! precomputes the same filter as one lookup table per `(symbol, phase)`
//! pair, avoiding any per-sample multiply.

use std::f32::consts::PI;

use crate::Sample16;

/// Number of FIR taps.
pub const TAP_COUNT: usize = 81;

/// RRC roll-off factor specified for M17.
pub const ROLLOFF: f32 = 0.5;

/// Samples per symbol at the 48 kHz TX rate (symbol rate is fixed at
/// 4800 Bd).
pub const SAMPLES_PER_SYMBOL_TX: usize = 10;

/// Samples per symbol at the 24 kHz RX rate.
pub const SAMPLES_PER_SYMBOL_RX: usize = 5;

/// Scale applied to the unit-amplitude filter output before conversion to
/// `i16` baseband samples.
const AMPLITUDE_SCALE: f32 = 7168.0;

fn rrc_sample(t: f32, beta: f32) -> f32 {
    if t.abs() < 1e-8 {
        return 1.0 - beta + 4.0 * beta / PI;
    }
    let denom = 4.0 * beta * t;
    if (denom.abs() - 1.0).abs() < 1e-6 {
        let x = PI / (4.0 * beta);
        return (beta / std::f32::consts::SQRT_2) * ((1.0 + 2.0 / PI) * x.sin() + (1.0 - 2.0 / PI) * x.cos());
    }
    let num = (PI * t * (1.0 - beta)).sin() + 4.0 * beta * t * (PI * t * (1.0 + beta)).cos();
    let den = PI * t * (1.0 - denom * denom);
    num / den
}

/// Compute the `TAP_COUNT`-tap RRC filter, sampled at `samples_per_symbol`
/// samples per symbol period and normalized to unit DC gain.
#[must_use]
pub fn rrc_taps(samples_per_symbol: usize) -> [f32; TAP_COUNT] {
    let mut taps = [0f32; TAP_COUNT];
    let center = (TAP_COUNT / 2) as f32;
    let sps = samples_per_symbol as f32;
    for (k, tap) in taps.iter_mut().enumerate() {
        let t = (k as f32 - center) / sps;
        *tap = rrc_sample(t, ROLLOFF);
    }
    let dc_gain: f32 = taps.iter().sum::<f32>() / sps;
    if dc_gain.abs() > 1e-9 {
        for tap in &mut taps {
            *tap /= dc_gain;
        }
    }
    taps
}

/// Streaming RRC FIR. Consumes one zero-stuffed baseband sample at a time
/// (a real value for the first sample of a symbol's period, zero for the
/// rest) and produces one filtered output sample per input sample.
#[derive(Debug, Clone)]
pub struct Shaper {
    taps: [f32; TAP_COUNT],
    delay: [f32; TAP_COUNT],
}

impl Shaper {
    /// New shaper for the given samples-per-symbol ratio.
    #[must_use]
    pub fn new(samples_per_symbol: usize) -> Self {
        Self { taps: rrc_taps(samples_per_symbol), delay: [0.0; TAP_COUNT] }
    }

    /// New shaper configured for 48 kHz TX (10 samples/symbol).
    #[must_use]
    pub fn new_tx() -> Self {
        Self::new(SAMPLES_PER_SYMBOL_TX)
    }

    /// New shaper configured for 24 kHz RX (5 samples/symbol).
    #[must_use]
    pub fn new_rx() -> Self {
        Self::new(SAMPLES_PER_SYMBOL_RX)
    }

    /// Push one input sample through the filter, returning the filtered
    /// output.
    pub fn push(&mut self, x: f32) -> f32 {
        self.delay.copy_within(0..TAP_COUNT - 1, 1);
        self.delay[0] = x;
        self.delay.iter().zip(self.taps.iter()).map(|(d, t)| d * t).sum()
    }

    /// Shape one 4-FSK symbol (`{-3,-1,+1,+3}`) into its
    /// `samples_per_symbol` baseband samples, scaled and rounded to
    /// `i16`.
    pub fn shape_symbol(&mut self, symbol: i8, samples_per_symbol: usize) -> Vec<Sample16> {
        let mut out = Vec::with_capacity(samples_per_symbol);
        out.push(to_sample(self.push(f32::from(symbol))));
        for _ in 1..samples_per_symbol {
            out.push(to_sample(self.push(0.0)));
        }
        out
    }
}

fn to_sample(x: f32) -> Sample16 {
    (x * AMPLITUDE_SCALE).round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as Sample16
}

/// Multiply-free RRC shaper: precomputes, for each of the four symbol
/// values and each of `samples_per_symbol` output phases, that phase's
/// contribution to the filter's output, then accumulates contributions
/// across overlapping symbols with table lookups and adds instead of
/// per-sample multiplies.
#[derive(Debug, Clone)]
pub struct IntegerShaper {
    samples_per_symbol: usize,
    /// `table[symbol_index][phase][tap_group]`: contribution of one
    /// symbol to output phase `phase`, `TAP_COUNT.div_ceil(samples_per_symbol)`
    /// symbol-periods deep.
    table: Vec<[[i32; 4]; TAP_COUNT]>,
    history: std::collections::VecDeque<i8>,
}

const SYMBOL_VALUES: [i8; 4] = [-3, -1, 1, 3];

impl IntegerShaper {
    /// New integer shaper for the given samples-per-symbol ratio.
    #[must_use]
    pub fn new(samples_per_symbol: usize) -> Self {
        let taps = rrc_taps(samples_per_symbol);
        // table[phase][tap_index][symbol_index] = contribution
        let mut table = vec![[[0i32; 4]; TAP_COUNT]; samples_per_symbol];
        for (phase, phase_table) in table.iter_mut().enumerate() {
            for tap_index in 0..TAP_COUNT {
                for (sym_idx, &sym) in SYMBOL_VALUES.iter().enumerate() {
                    let delay_pos = tap_index * samples_per_symbol + phase;
                    if delay_pos < TAP_COUNT {
                        let contribution = taps[delay_pos] * f32::from(sym) * AMPLITUDE_SCALE;
                        phase_table[tap_index][sym_idx] = contribution.round() as i32;
                    }
                }
            }
        }
        let depth = TAP_COUNT.div_ceil(samples_per_symbol).max(1);
        Self {
            samples_per_symbol,
            table,
            history: std::collections::VecDeque::from(vec![0i8; depth]),
        }
    }

    fn symbol_index(symbol: i8) -> usize {
        SYMBOL_VALUES.iter().position(|&s| s == symbol).expect("unknown M17 symbol")
    }

    /// Shape one symbol using the precomputed contribution tables.
    pub fn shape_symbol(&mut self, symbol: i8) -> Vec<Sample16> {
        self.history.push_front(symbol);
        self.history.pop_back();

        let mut out = Vec::with_capacity(self.samples_per_symbol);
        for phase in 0..self.samples_per_symbol {
            let mut acc: i32 = 0;
            for (tap_index, &sym) in self.history.iter().enumerate() {
                let sym_idx = Self::symbol_index(sym);
                acc += self.table[phase][tap_index][sym_idx];
            }
            out.push(acc.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as Sample16);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taps_are_symmetric() {
        let taps = rrc_taps(SAMPLES_PER_SYMBOL_TX);
        for i in 0..TAP_COUNT / 2 {
            assert!((taps[i] - taps[TAP_COUNT - 1 - i]).abs() < 1e-4, "tap {i} not symmetric");
        }
    }

    #[test]
    fn float_and_integer_shapers_agree_within_3_lsb() {
        let mut float_shaper = Shaper::new_tx();
        let mut int_shaper = IntegerShaper::new(SAMPLES_PER_SYMBOL_TX);
        let symbols = [1i8, 3, -1, -3, 1, 1, -3, 3, -1, 1];

        for &sym in &symbols {
            let f = float_shaper.shape_symbol(sym, SAMPLES_PER_SYMBOL_TX);
            let i = int_shaper.shape_symbol(sym);
            for (a, b) in f.iter().zip(i.iter()) {
                assert!((i32::from(*a) - i32::from(*b)).abs() <= 3, "float={a} int={b}");
            }
        }
    }

    #[test]
    fn shaped_output_has_expected_sample_count() {
        let mut shaper = Shaper::new_rx();
        let out = shaper.shape_symbol(3, SAMPLES_PER_SYMBOL_RX);
        assert_eq!(out.len(), SAMPLES_PER_SYMBOL_RX);
    }
}
