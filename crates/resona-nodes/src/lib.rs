//! Resona Nodes - node kinds for the resona synthesis engine
//!
//! Concrete [`Processor`](resona_engine::Processor) implementations built
//! on the `resona-core` DSP primitives:
//!
//! - [`GainNode`] N-channel pass-through, shaped by the engine's MUL/ADD
//! - [`SineNode`] sine source with audio-rate frequency modulation
//! - [`SquareNode`] band-limited additive square source
//! - [`PullNode`] callback source with sample-rate conversion
//! - [`LateReflectionsNode`] order-16 FDN late-reflections reverb
//!
//! Each node declares its kind-specific property slots as constants in its
//! module (e.g. [`sine::FREQUENCY`]).

pub mod gain;
pub mod late_reflections;
pub mod pull;
pub mod sine;
pub mod square;

pub use gain::GainNode;
pub use late_reflections::LateReflectionsNode;
pub use pull::{PullCallback, PullNode, StreamResampler};
pub use sine::SineNode;
pub use square::SquareNode;
