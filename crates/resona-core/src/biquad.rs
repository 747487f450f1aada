//! Biquad (bi-quadratic) filter.
//!
//! A second-order IIR filter in direct form II transposed, configurable to
//! any of the RBJ Audio EQ Cookbook responses. One `configure()` call
//! recomputes the coefficients; state survives reconfiguration so the
//! filter can be retuned per sample (modulated allpasses do exactly that).

use core::f32::consts::PI;
use libm::{cosf, powf, sinf, sqrtf};

/// The RBJ cookbook filter responses, plus an identity passthrough.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    /// Band-pass with constant 0 dB peak gain.
    Bandpass,
    Notch,
    /// Peaking EQ; `db_gain` sets the boost or cut.
    Peak,
    /// Low shelf; `db_gain` sets the shelf gain.
    Lowshelf,
    /// High shelf; `db_gain` sets the shelf gain.
    Highshelf,
    Allpass,
    /// `y[n] = x[n]`.
    #[default]
    Identity,
}

/// Second-order IIR filter, direct form II transposed.
///
/// ```text
/// y[n] = b0·x[n] + h1
/// h1   = b1·x[n] - a1·y[n] + h2
/// h2   = b2·x[n] - a2·y[n]
/// ```
///
/// Two state registers per instance; run one instance per channel.
#[derive(Debug, Clone)]
pub struct Biquad {
    sample_rate: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    h1: f32,
    h2: f32,
}

impl Biquad {
    /// Create a passthrough filter at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            h1: 0.0,
            h2: 0.0,
        }
    }

    /// Recompute coefficients for the given response.
    ///
    /// `frequency` is clamped just below Nyquist so that modulated
    /// configurations cannot push the filter unstable. `db_gain` only
    /// matters for the peak and shelf types.
    pub fn configure(&mut self, filter_type: FilterType, frequency: f32, db_gain: f32, q: f32) {
        let frequency = frequency.clamp(0.0, self.sample_rate * 0.499);
        let omega = 2.0 * PI * frequency / self.sample_rate;
        let cos_omega = cosf(omega);
        let sin_omega = sinf(omega);
        let alpha = sin_omega / (2.0 * q);
        // sqrt(10^(dB/20)), used by peak and shelf responses.
        let a = powf(10.0, db_gain / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Lowpass => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::Highpass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::Bandpass => (
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::Notch => (
                1.0,
                -2.0 * cos_omega,
                1.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_omega,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_omega,
                1.0 - alpha / a,
            ),
            FilterType::Lowshelf => {
                let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                    a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                    (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha,
                )
            }
            FilterType::Highshelf => {
                let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                    a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                    (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha,
                )
            }
            FilterType::Allpass => (
                1.0 - alpha,
                -2.0 * cos_omega,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::Identity => (1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
        };

        let a0_inv = 1.0 / a0;
        self.b0 = b0 * a0_inv;
        self.b1 = b1 * a0_inv;
        self.b2 = b2 * a0_inv;
        self.a1 = a1 * a0_inv;
        self.a2 = a2 * a0_inv;
    }

    /// Process one sample.
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.h1;
        self.h1 = self.b1 * input - self.a1 * output + self.h2;
        self.h2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Zero the two state registers without touching the coefficients.
    pub fn clear_histories(&mut self) {
        self.h1 = 0.0;
        self.h2 = 0.0;
    }
}
