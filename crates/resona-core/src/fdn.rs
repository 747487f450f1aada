//! Feedback delay network.
//!
//! A bank of [`CrossfadingDelay`] lines whose outputs are fed back through
//! an N×N mixing matrix. Per sample the caller:
//!
//! 1. reads the output frame with [`compute_frame`](FeedbackDelayNetwork::compute_frame),
//! 2. optionally processes that frame externally (shelving filters,
//!    allpasses — whatever sits inside the feedback loop),
//! 3. hands the processed frame plus the next input frame to
//!    [`advance`](FeedbackDelayNetwork::advance), which computes the matrix
//!    feedback and writes `input[i] + feedback[i]` into each line.
//!
//! Gain scaling is folded into the matrix; with an orthonormal matrix and
//! unit gains the network is lossless.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

use libm::sqrtf;

use crate::delay::CrossfadingDelay;

/// Bank of delay lines mixed through a feedback matrix.
#[derive(Debug, Clone)]
pub struct FeedbackDelayNetwork {
    order: usize,
    lines: Vec<CrossfadingDelay>,
    /// Row-major `order × order` feedback matrix.
    matrix: Vec<f32>,
    feedback: Vec<f32>,
}

impl FeedbackDelayNetwork {
    /// Create an `order`-line network; each line holds up to `max_delay`
    /// seconds. The matrix starts as identity.
    pub fn new(order: usize, max_delay: f32, sample_rate: f32) -> Self {
        let mut matrix = vec![0.0; order * order];
        for i in 0..order {
            matrix[i * order + i] = 1.0;
        }
        Self {
            order,
            lines: (0..order)
                .map(|_| CrossfadingDelay::new(max_delay, sample_rate))
                .collect(),
            matrix,
            feedback: vec![0.0; order],
        }
    }

    /// The number of delay lines.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Read every line's current output into `frame`.
    #[inline]
    pub fn compute_frame(&self, frame: &mut [f32]) {
        for (out, line) in frame.iter_mut().zip(&self.lines) {
            *out = line.read();
        }
    }

    /// Advance one sample: feedback = matrix · `processed`, then each line
    /// receives `input[i] + feedback[i]`.
    pub fn advance(&mut self, input: &[f32], processed: &[f32]) {
        for i in 0..self.order {
            let row = &self.matrix[i * self.order..(i + 1) * self.order];
            let mut acc = 0.0f32;
            for (w, s) in row.iter().zip(processed) {
                acc += w * s;
            }
            self.feedback[i] = acc;
        }
        for (i, line) in self.lines.iter_mut().enumerate() {
            line.advance(input[i] + self.feedback[i]);
        }
    }

    /// Retarget every line; `delays` holds one value in seconds per line.
    pub fn set_delays(&mut self, delays: &[f32]) {
        for (line, &delay) in self.lines.iter_mut().zip(delays) {
            line.set_delay(delay);
        }
    }

    /// Retarget a single line, in seconds.
    pub fn set_delay(&mut self, index: usize, delay: f32) {
        if let Some(line) = self.lines.get_mut(index) {
            line.set_delay(delay);
        }
    }

    /// Set the crossfade time used by every line's delay changes.
    pub fn set_interpolation_time(&mut self, seconds: f32) {
        for line in &mut self.lines {
            line.set_interpolation_time(seconds);
        }
    }

    /// Replace the feedback matrix (row-major, `order × order` values).
    pub fn set_matrix(&mut self, matrix: &[f32]) {
        self.matrix.copy_from_slice(&matrix[..self.order * self.order]);
    }

    /// Zero all delay lines.
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.reset();
        }
    }
}

/// Fill `out` with the order-N Hadamard matrix scaled by `1/sqrt(n)`.
///
/// Sylvester construction: entry (i, j) is `(-1)^popcount(i & j)`. The
/// scaling makes the matrix orthonormal, so it conserves energy when used
/// as an FDN feedback matrix with unit gains.
///
/// # Panics
///
/// Panics unless `order` is a power of two and `out` holds `order²` values.
pub fn hadamard(order: usize, out: &mut [f32]) {
    assert!(order.is_power_of_two(), "Hadamard order must be a power of two");
    assert_eq!(out.len(), order * order);

    let scale = 1.0 / sqrtf(order as f32);
    for i in 0..order {
        for j in 0..order {
            let sign = if (i & j).count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            out[i * order + j] = sign * scale;
        }
    }
}
