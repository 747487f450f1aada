//! Decibel and gain conversion helpers.
//!
//! All conversions follow the audio convention that 0 dB corresponds to a
//! linear gain of 1.0. The reference-relative variants express one scalar
//! in dB relative to another, which is how the reverb derives its band
//! shelf gains.

use libm::{log10, pow};

/// Convert a linear gain to decibels. 0 dB = gain 1.0.
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    scalar_to_db(gain, 1.0)
}

/// Convert decibels to a linear gain. 0 dB = gain 1.0.
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    db_to_scalar(db, 1.0)
}

/// Express `scalar` in dB relative to `reference`.
#[inline]
pub fn scalar_to_db(scalar: f64, reference: f64) -> f64 {
    20.0 * log10(scalar / reference)
}

/// Convert a dB offset relative to `reference` back to a scalar.
#[inline]
pub fn db_to_scalar(db: f64, reference: f64) -> f64 {
    pow(10.0, db / 20.0) * reference
}
