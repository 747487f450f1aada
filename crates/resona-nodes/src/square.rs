//! Additive square wave node.
//!
//! One mono output driven by a bank of odd-harmonic sines. The harmonic
//! count is either explicit or automatic (0): automatic fits
//! `floor((sr/2) / frequency)` harmonics, so low fundamentals get hundreds
//! of partials and high ones degrade gracefully towards a plain sine.

use resona_core::AdditiveSquare;
use resona_engine::{NodeSpec, ProcessContext, Processor, PropertyDescriptor, PropertyStore, Server};

/// Float: fundamental frequency in Hz. Modulatable; range tracks Nyquist.
pub const FREQUENCY: u32 = 10;
/// Float: phase offset in cycles of the fundamental, applied when written.
pub const PHASE: u32 = 11;
/// Int: harmonic count; 0 selects the automatic count.
pub const HARMONICS: u32 = 12;

/// Band-limited square wave source.
pub struct SquareNode {
    sample_rate: f32,
    square: AdditiveSquare,
}

impl SquareNode {
    pub fn new(server: &Server) -> Self {
        let mut square = AdditiveSquare::new(server.sample_rate());
        square.set_frequency(440.0);
        Self {
            sample_rate: server.sample_rate(),
            square,
        }
    }
}

impl Processor for SquareNode {
    fn spec(&self) -> NodeSpec {
        let nyquist = self.sample_rate / 2.0;
        NodeSpec::new("square")
            .buffers(0, 1)
            .output_connection(0, 1)
            .keep_output_buffers()
            .property(
                FREQUENCY,
                PropertyDescriptor::float("frequency", 440.0, 1.0, nyquist)
                    .modulatable()
                    .dynamic_range(),
            )
            .property(PHASE, PropertyDescriptor::float("phase", 0.0, 0.0, 1.0))
            .property(
                HARMONICS,
                PropertyDescriptor::int("harmonics", 0, 0, 10_000),
            )
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        if ctx.properties.was_modified(HARMONICS) {
            self.square
                .set_harmonics(ctx.properties.int(HARMONICS).max(0) as usize);
        }
        if ctx.properties.was_modified(PHASE) {
            let offset = ctx.properties.float(PHASE) as f64;
            let phase = self.square.phase();
            self.square.set_phase(phase + offset);
        }

        let output = &mut ctx.outputs[0];
        if ctx.properties.needs_a_rate(FREQUENCY) {
            for (i, sample) in output.iter_mut().enumerate() {
                self.square
                    .set_frequency(ctx.properties.float_at(FREQUENCY, i));
                *sample = self.square.tick();
            }
        } else {
            let frequency = ctx.properties.float(FREQUENCY);
            if frequency != self.square.frequency() {
                self.square.set_frequency(frequency);
            }
            for sample in output.iter_mut() {
                *sample = self.square.tick();
            }
        }
    }

    fn reset(&mut self, properties: &PropertyStore) {
        self.square.reset();
        self.square.set_phase(properties.float(PHASE) as f64);
    }
}
