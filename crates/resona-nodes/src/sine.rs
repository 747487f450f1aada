//! Sine oscillator node.
//!
//! One mono output, no inputs. Frequency and the frequency multiplier both
//! accept audio-rate modulation; when either is a-rate for the block the
//! oscillator is retuned per sample, otherwise once per block. Writing the
//! phase property offsets the running phase rather than replacing it, so a
//! phase write never glitches backwards.

use resona_core::SineOsc;
use resona_engine::{NodeSpec, ProcessContext, Processor, PropertyDescriptor, PropertyStore, Server};

/// Float: oscillator frequency in Hz. Modulatable; range tracks Nyquist.
pub const FREQUENCY: u32 = 10;
/// Float: multiplier applied to the frequency. Modulatable. Useful as a
/// pitch-bend or FM input that leaves the base frequency alone.
pub const FREQUENCY_MULTIPLIER: u32 = 11;
/// Float: phase offset in cycles, applied when written.
pub const PHASE: u32 = 12;

/// Sine wave source.
pub struct SineNode {
    sample_rate: f32,
    oscillator: SineOsc,
}

impl SineNode {
    pub fn new(server: &Server) -> Self {
        Self {
            sample_rate: server.sample_rate(),
            oscillator: SineOsc::new(server.sample_rate()),
        }
    }
}

impl Processor for SineNode {
    fn spec(&self) -> NodeSpec {
        let nyquist = self.sample_rate / 2.0;
        NodeSpec::new("sine")
            .buffers(0, 1)
            .output_connection(0, 1)
            .keep_output_buffers()
            .property(
                FREQUENCY,
                PropertyDescriptor::float("frequency", 440.0, 0.0, nyquist)
                    .modulatable()
                    .dynamic_range(),
            )
            .property(
                FREQUENCY_MULTIPLIER,
                PropertyDescriptor::float("frequency_multiplier", 1.0, 0.0, 64.0).modulatable(),
            )
            .property(PHASE, PropertyDescriptor::float("phase", 0.0, 0.0, 1.0))
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        if ctx.properties.was_modified(PHASE) {
            let offset = ctx.properties.float(PHASE) as f64;
            let phase = self.oscillator.phase();
            self.oscillator.set_phase(phase + offset);
        }

        let output = &mut ctx.outputs[0];
        if ctx.properties.needs_a_rate(FREQUENCY)
            || ctx.properties.needs_a_rate(FREQUENCY_MULTIPLIER)
        {
            for (i, sample) in output.iter_mut().enumerate() {
                let frequency = ctx.properties.float_at(FREQUENCY, i)
                    * ctx.properties.float_at(FREQUENCY_MULTIPLIER, i);
                self.oscillator.set_frequency(frequency);
                *sample = self.oscillator.tick();
            }
        } else {
            let frequency =
                ctx.properties.float(FREQUENCY) * ctx.properties.float(FREQUENCY_MULTIPLIER);
            self.oscillator.set_frequency(frequency);
            self.oscillator.fill(output);
        }
        self.oscillator.normalize();
    }

    fn reset(&mut self, properties: &PropertyStore) {
        self.oscillator.reset();
        self.oscillator.set_phase(properties.float(PHASE) as f64);
    }
}
