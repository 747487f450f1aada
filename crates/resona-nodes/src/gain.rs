//! Pass-through gain node.
//!
//! Copies its inputs to its outputs; the audible gain and offset come from
//! the engine's standard `MUL`/`ADD` post-pass, both of which accept
//! audio-rate modulation. Also the simplest possible node, which makes it
//! the workhorse of routing (and of graph tests).

use resona_engine::{NodeSpec, ProcessContext, Processor};

/// N-channel pass-through.
pub struct GainNode {
    channels: usize,
}

impl GainNode {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl Processor for GainNode {
    fn spec(&self) -> NodeSpec {
        NodeSpec::new("gain")
            .buffers(self.channels, self.channels)
            .input_connection(0, self.channels)
            .output_connection(0, self.channels)
            .keep_output_buffers()
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        for (output, input) in ctx.outputs.iter_mut().zip(ctx.inputs) {
            output.copy_from_slice(input);
        }
    }
}
