//! Delay line with click-free delay changes.
//!
//! [`CrossfadingDelay`] is a circular buffer with two read taps: the current
//! delay and a target delay. Changing the delay does not jump the read
//! position; instead the output crossfades linearly from the old tap to the
//! new one over a caller-configured interpolation time. Once the crossfade
//! completes the line snaps to the target and runs on a single tap again.
//!
//! This is the structure modulated reverbs want: the delay can be retargeted
//! every sample without zipper noise or dropped energy.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

use libm::roundf;

/// Circular delay line that crossfades between delay settings.
///
/// # Example
///
/// ```rust
/// use resona_core::CrossfadingDelay;
///
/// let sr = 44100.0;
/// let mut line = CrossfadingDelay::new(1.0, sr);
/// line.set_delay(3.0 / sr);
/// // Let the crossfade away from the initial zero delay finish.
/// for _ in 0..64 {
///     line.advance(0.0);
/// }
///
/// // An impulse comes back exactly 3 samples later.
/// assert_eq!(line.tick(1.0), 0.0);
/// assert_eq!(line.tick(0.0), 0.0);
/// assert_eq!(line.tick(0.0), 0.0);
/// assert_eq!(line.tick(0.0), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct CrossfadingDelay {
    line: Vec<f32>,
    write_head: usize,
    /// Current read tap, in samples behind the write head.
    delay: usize,
    /// Tap being crossfaded towards.
    target_delay: usize,
    weight_current: f32,
    weight_target: f32,
    /// Per-sample weight movement while interpolating.
    interpolation_delta: f32,
    interpolating: bool,
    sample_rate: f32,
}

impl CrossfadingDelay {
    /// Create a line holding up to `max_delay` seconds at `sample_rate`.
    pub fn new(max_delay: f32, sample_rate: f32) -> Self {
        let length = (sample_rate * max_delay) as usize + 1;
        Self {
            line: vec![0.0; length],
            write_head: 0,
            delay: 0,
            target_delay: 0,
            weight_current: 1.0,
            weight_target: 0.0,
            // 1 ms default crossfade.
            interpolation_delta: 1.0 / (sample_rate * 0.001),
            interpolating: false,
            sample_rate,
        }
    }

    /// Retarget the delay, in seconds.
    ///
    /// If a crossfade is already in flight the weights are left where they
    /// are; moving them back would be worse than finishing late.
    pub fn set_delay(&mut self, delay: f32) {
        let mut samples = roundf(delay * self.sample_rate) as usize;
        if samples >= self.line.len() {
            samples = self.line.len() - 1;
        }
        if !self.interpolating && samples == self.delay {
            return;
        }
        self.target_delay = samples;
        self.interpolating = true;
    }

    /// Set how long a delay change takes to crossfade, in seconds.
    pub fn set_interpolation_time(&mut self, seconds: f32) {
        if seconds > 0.0 {
            self.interpolation_delta = 1.0 / (self.sample_rate * seconds);
        } else {
            self.interpolation_delta = 1.0;
        }
    }

    /// The current read tap, in samples.
    pub fn delay_samples(&self) -> usize {
        self.delay
    }

    /// The line capacity, in samples.
    pub fn capacity(&self) -> usize {
        self.line.len()
    }

    /// Read the crossfaded output for the current sample.
    #[inline]
    pub fn read(&self) -> f32 {
        let out = self.weight_current * self.tap(self.delay);
        if self.interpolating {
            out + self.weight_target * self.tap(self.target_delay)
        } else {
            out
        }
    }

    /// Write the next input sample and move the crossfade forward.
    #[inline]
    pub fn advance(&mut self, sample: f32) {
        self.write_head = (self.write_head + 1) % self.line.len();
        self.line[self.write_head] = sample;
        if self.interpolating {
            self.weight_current = (self.weight_current - self.interpolation_delta).max(0.0);
            self.weight_target += self.interpolation_delta;
            if self.weight_target >= 1.0 {
                self.weight_current = 1.0;
                self.weight_target = 0.0;
                self.delay = self.target_delay;
                self.interpolating = false;
            }
        }
    }

    /// Write one sample and read the delayed output: a pure `k`-sample
    /// delay for a delay of `k / sample_rate`.
    #[inline]
    pub fn tick(&mut self, sample: f32) -> f32 {
        self.advance(sample);
        self.read()
    }

    /// Zero the stored audio. Delay settings are kept.
    pub fn reset(&mut self) {
        self.line.fill(0.0);
    }

    #[inline]
    fn tap(&self, delay: usize) -> f32 {
        let len = self.line.len();
        self.line[(self.write_head + len - delay) % len]
    }
}
