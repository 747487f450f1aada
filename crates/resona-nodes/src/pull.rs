//! Pull node: audio from a host callback, resampled to the engine rate.
//!
//! The host supplies interleaved frames at its own sample rate; a
//! streaming linear resampler converts them to the engine's. The node asks
//! the resampler for a full block and tops it up from the callback until
//! the block is complete, so any rate ratio works. Without a callback the
//! node produces silence.

use resona_engine::{NodeSpec, ProcessContext, Processor, Server};

/// Host audio callback: fill the interleaved buffer completely.
pub type PullCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Streaming linear-interpolation resampler over interleaved frames.
///
/// Input is pushed with [`read`](Self::read); output is pulled with
/// [`write`](Self::write), which produces as many frames as the queued
/// input allows and reports how many it delivered.
pub struct StreamResampler {
    /// Input frames consumed per output frame.
    ratio: f64,
    /// Fractional read position into the queue, in frames.
    position: f64,
    channels: usize,
    queue: Vec<f32>,
}

impl StreamResampler {
    pub fn new(input_sample_rate: u32, output_sample_rate: u32, channels: usize) -> Self {
        Self {
            ratio: input_sample_rate as f64 / output_sample_rate as f64,
            position: 0.0,
            channels,
            queue: Vec::new(),
        }
    }

    /// Append interleaved input frames.
    pub fn read(&mut self, source: &[f32]) {
        debug_assert_eq!(source.len() % self.channels, 0);
        self.queue.extend_from_slice(source);
    }

    /// Produce up to `frames` interleaved output frames into `destination`.
    /// Returns the number of frames written; fewer than requested means
    /// the queue ran dry and more input is needed.
    pub fn write(&mut self, destination: &mut [f32], frames: usize) -> usize {
        let channels = self.channels;
        let mut written = 0;

        while written < frames {
            let base = self.position as usize;
            // Linear interpolation needs the frame after `base` too.
            if (base + 2) * channels > self.queue.len() {
                break;
            }
            let fraction = (self.position - base as f64) as f32;
            for channel in 0..channels {
                let a = self.queue[base * channels + channel];
                let b = self.queue[(base + 1) * channels + channel];
                destination[written * channels + channel] = a + (b - a) * fraction;
            }
            written += 1;
            self.position += self.ratio;
        }

        // Drop frames the read position has moved past.
        let consumed = (self.position as usize).min(self.queue.len() / channels);
        if consumed > 0 {
            self.queue.drain(..consumed * channels);
            self.position -= consumed as f64;
        }

        written
    }
}

/// Callback-driven source with sample-rate conversion.
pub struct PullNode {
    channels: usize,
    callback: Option<PullCallback>,
    resampler: StreamResampler,
    /// Interleaved staging for one callback's worth of input frames.
    incoming: Vec<f32>,
    /// Interleaved output at the engine rate, one block.
    resampled: Vec<f32>,
}

impl PullNode {
    /// Create a pull node producing `channels` channels from `callback`,
    /// which is invoked with interleaved buffers of `block_size` frames at
    /// `input_sample_rate`.
    pub fn new(
        server: &Server,
        input_sample_rate: u32,
        channels: usize,
        callback: Option<PullCallback>,
    ) -> Self {
        let block_size = server.block_size();
        Self {
            channels,
            callback,
            resampler: StreamResampler::new(
                input_sample_rate,
                server.sample_rate() as u32,
                channels,
            ),
            incoming: vec![0.0; block_size * channels],
            resampled: vec![0.0; block_size * channels],
        }
    }
}

impl Processor for PullNode {
    fn spec(&self) -> NodeSpec {
        NodeSpec::new("pull")
            .buffers(0, self.channels)
            .output_connection(0, self.channels)
            .keep_output_buffers()
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        let block_size = ctx.block_size;
        let channels = self.channels;

        let mut produced = 0;
        while produced < block_size {
            produced += self.resampler.write(
                &mut self.resampled[produced * channels..block_size * channels],
                block_size - produced,
            );
            if produced >= block_size {
                break;
            }
            match &mut self.callback {
                Some(callback) => callback(&mut self.incoming),
                None => self.incoming.fill(0.0),
            }
            self.resampler.read(&self.incoming);
        }

        // Deinterleave into the output buffers.
        for (channel, output) in ctx.outputs.iter_mut().enumerate().take(channels) {
            for (frame, sample) in output.iter_mut().enumerate() {
                *sample = self.resampled[frame * channels + channel];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resampler_identity_passes_frames() {
        let mut resampler = StreamResampler::new(44100, 44100, 1);
        resampler.read(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let mut out = [0.0f32; 5];
        let written = resampler.write(&mut out, 5);
        // The final frame stays queued: interpolation needs a successor.
        assert_eq!(written, 4);
        assert_eq!(&out[..4], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_resampler_upsampling_doubles_frames() {
        let mut resampler = StreamResampler::new(22050, 44100, 1);
        resampler.read(&[0.0, 1.0, 2.0, 3.0]);

        let mut out = [0.0f32; 8];
        let written = resampler.write(&mut out, 8);
        assert_eq!(written, 6);
        for (i, &sample) in out[..written].iter().enumerate() {
            let expected = i as f32 * 0.5;
            assert!((sample - expected).abs() < 1e-6, "frame {i}: {sample}");
        }
    }

    #[test]
    fn test_resampler_stereo_keeps_channels_apart() {
        let mut resampler = StreamResampler::new(44100, 44100, 2);
        resampler.read(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);

        let mut out = [0.0f32; 4];
        let written = resampler.write(&mut out, 2);
        assert_eq!(written, 2);
        assert_eq!(&out[..4], &[1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_resampler_streams_across_reads() {
        let mut resampler = StreamResampler::new(44100, 44100, 1);
        let mut produced = Vec::new();
        let mut out = [0.0f32; 16];

        for chunk in 0..4 {
            let base = chunk as f32 * 4.0;
            resampler.read(&[base, base + 1.0, base + 2.0, base + 3.0]);
            let written = resampler.write(&mut out, 16);
            produced.extend_from_slice(&out[..written]);
        }

        // A continuous ramp in, a continuous ramp out.
        for (i, &sample) in produced.iter().enumerate() {
            assert!((sample - i as f32).abs() < 1e-6, "frame {i}: {sample}");
        }
    }
}
