//! Resona Core - DSP primitives for the resona synthesis engine
//!
//! This crate provides the per-sample building blocks the graph engine's
//! nodes are made of:
//!
//! - [`SineOsc`] phase-accumulator sine oscillator
//! - [`AdditiveSquare`] odd-harmonic additive square wave
//! - [`CrossfadingDelay`] delay line with click-free delay changes
//! - [`Biquad`] second-order IIR filter (RBJ audio-EQ cookbook)
//! - [`FeedbackDelayNetwork`] delay bank wired through a mixing matrix
//! - [`kernels`] vectorizable buffer arithmetic
//!
//! Everything here is pure per-sample math: no allocation after
//! construction, no I/O, no knowledge of the graph.
//!
//! ## no_std Support
//!
//! This crate is `no_std` compatible. Use `default-features = false` in your
//! `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! resona-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod biquad;
pub mod delay;
pub mod fdn;
pub mod kernels;
pub mod math;
pub mod osc;

// Re-export main types at crate root
pub use biquad::{Biquad, FilterType};
pub use delay::CrossfadingDelay;
pub use fdn::{hadamard, FeedbackDelayNetwork};
pub use math::{db_to_gain, db_to_scalar, gain_to_db, scalar_to_db};
pub use osc::{AdditiveSquare, SineOsc, WILBRAHAM_GIBBS};
