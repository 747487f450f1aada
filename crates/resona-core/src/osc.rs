//! Sinusoidal oscillators.
//!
//! [`SineOsc`] is a phase-accumulator sine oscillator with the phase held in
//! cycles (one cycle = one period). Phase accumulates without wrapping so
//! that harmonic stacks stay coherent; callers that run an oscillator for a
//! long time call [`normalize`](SineOsc::normalize) once per block to keep
//! the accumulator bounded.
//!
//! [`AdditiveSquare`] sums a bank of odd-harmonic [`SineOsc`]s into a
//! band-limited square wave. It is the slowest and most exact way to make a
//! square wave: no aliasing at all, at the cost of one sine per harmonic.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec::Vec;

use core::f64::consts::{PI, TAU};

use libm::{floor, sin};

/// Relative overshoot of a truncated Fourier square wave at a jump
/// discontinuity (the Gibbs phenomenon).
pub const WILBRAHAM_GIBBS: f64 = 0.089_489_872_236_083_6;

/// Phase-accumulator sine oscillator.
///
/// Phase is measured in cycles: `tick()` returns `sin(2π·phase)` and then
/// advances the phase by `frequency / sample_rate`.
///
/// # Example
///
/// ```rust
/// use resona_core::SineOsc;
///
/// let mut osc = SineOsc::new(44100.0);
/// osc.set_frequency(441.0);
/// let first = osc.tick();
/// assert_eq!(first, 0.0); // sin(0)
/// ```
#[derive(Debug, Clone)]
pub struct SineOsc {
    sample_rate: f64,
    frequency: f64,
    phase: f64,
    phase_increment: f64,
}

impl SineOsc {
    /// Create an oscillator at the given sample rate. Frequency defaults to
    /// 440 Hz, phase to 0.
    pub fn new(sample_rate: f32) -> Self {
        let mut osc = Self {
            sample_rate: sample_rate as f64,
            frequency: 440.0,
            phase: 0.0,
            phase_increment: 0.0,
        };
        osc.set_frequency(440.0);
        osc
    }

    /// Set the frequency in Hz.
    #[inline]
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency as f64;
        self.phase_increment = self.frequency / self.sample_rate;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency as f32
    }

    /// Set the phase, in cycles. Values outside [0, 1) are legal; the sine
    /// of an unwrapped phase is identical to that of the wrapped one.
    #[inline]
    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase;
    }

    /// Current (unwrapped) phase in cycles.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Produce one sample, then advance the phase.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        let out = sin(TAU * self.phase);
        self.phase += self.phase_increment;
        out as f32
    }

    /// Fill `out` with consecutive samples.
    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out {
            *sample = self.tick();
        }
    }

    /// Advance the phase by `count` samples without producing output.
    ///
    /// Used to keep inactive modulators in step with active ones.
    pub fn skip_samples(&mut self, count: usize) {
        self.phase += self.phase_increment * count as f64;
    }

    /// Wrap the phase accumulator back into [0, 1).
    ///
    /// Long-running oscillators lose precision as the accumulator grows;
    /// wrapping once per block keeps the error bounded.
    pub fn normalize(&mut self) {
        self.phase -= floor(self.phase);
    }

    /// Return the phase to 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Band-limited additive square wave.
///
/// A square wave is `sin(f) + sin(3f)/3 + sin(5f)/5 + ...`. This type keeps
/// one [`SineOsc`] per odd harmonic and sums them on `tick()`.
///
/// The harmonic count is either explicit or automatic (`0`): the automatic
/// count fits as many odd harmonics as possible below Nyquist,
/// `floor((sr/2) / frequency)`, clamped to at least one.
///
/// The closed-form output scale `(4/π) · 1/(1 + 2·WILBRAHAM_GIBBS) ·
/// 1/1.08013` keeps the peak just below 1.0: overshooting is worse than
/// undershooting.
#[derive(Debug, Clone)]
pub struct AdditiveSquare {
    sample_rate: f32,
    oscillators: Vec<SineOsc>,
    /// Requested harmonic count; 0 means automatic.
    harmonics: usize,
    frequency: f32,
}

/// Peak normalization for the harmonic sum. See [`AdditiveSquare`].
const SQUARE_NORMALIZATION: f64 = (4.0 / PI) * (1.0 / (1.0 + 2.0 * WILBRAHAM_GIBBS)) * (1.0 / 1.08013);

impl AdditiveSquare {
    /// Create a square oscillator at the given sample rate, 100 Hz,
    /// automatic harmonic count.
    pub fn new(sample_rate: f32) -> Self {
        let mut square = Self {
            sample_rate,
            oscillators: Vec::new(),
            harmonics: 0,
            frequency: 100.0,
        };
        square.readjust_harmonics();
        square
    }

    /// Produce one sample, then advance every harmonic.
    pub fn tick(&mut self) -> f32 {
        let mut sum = 0.0f64;
        for (i, osc) in self.oscillators.iter_mut().enumerate() {
            sum += osc.tick() as f64 / (2 * (i + 1) - 1) as f64;
        }
        (sum * SQUARE_NORMALIZATION) as f32
    }

    /// Set the fundamental frequency in Hz.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.readjust_harmonics();
        for (i, osc) in self.oscillators.iter_mut().enumerate() {
            osc.set_frequency(frequency * (2 * (i + 1) - 1) as f32);
        }
    }

    /// Current fundamental frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Set the bank phase, in cycles of the fundamental. Harmonic `i` is
    /// placed at `(2i+1)` times the given phase so the partials stay
    /// aligned.
    pub fn set_phase(&mut self, phase: f64) {
        for (i, osc) in self.oscillators.iter_mut().enumerate() {
            osc.set_phase((2 * (i + 1) - 1) as f64 * phase);
        }
    }

    /// Bank phase: the fundamental oscillator's phase, in cycles.
    pub fn phase(&self) -> f64 {
        self.oscillators.first().map(|o| o.phase()).unwrap_or(0.0)
    }

    /// Set the harmonic count. 0 selects the automatic count.
    pub fn set_harmonics(&mut self, harmonics: usize) {
        self.harmonics = harmonics;
        self.readjust_harmonics();
    }

    /// The requested harmonic count (0 = automatic).
    pub fn harmonics(&self) -> usize {
        self.harmonics
    }

    /// The resolved size of the oscillator bank.
    pub fn effective_harmonics(&self) -> usize {
        self.oscillators.len()
    }

    /// Rephase every harmonic to the bank's default.
    pub fn reset(&mut self) {
        for osc in &mut self.oscillators {
            osc.reset();
        }
    }

    fn readjust_harmonics(&mut self) {
        let new_count = if self.harmonics == 0 {
            // Harmonics that fit between 0 and Nyquist.
            (((self.sample_rate / 2.0) / self.frequency) as usize).max(1)
        } else {
            self.harmonics
        };

        let phase = self.phase();
        let old_count = self.oscillators.len();
        let sample_rate = self.sample_rate;
        self.oscillators.resize_with(new_count, || SineOsc::new(sample_rate));
        for i in old_count..new_count {
            self.oscillators[i].set_phase((2 * (i + 1) - 1) as f64 * phase);
        }
        for (i, osc) in self.oscillators.iter_mut().enumerate() {
            osc.set_frequency(self.frequency * (2 * (i + 1) - 1) as f32);
        }
    }
}
