//! Shared PCM storage for `Buffer`-typed properties.
//!
//! Decoding audio files is a collaborator's job; the engine only needs a
//! place to hang interleaved PCM so that buffer-playing node kinds can
//! reference it through shared ownership (`Arc<AudioBuffer>`).

/// Interleaved PCM with its source sample rate and channel count.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    sample_rate: f32,
    channels: usize,
    data: Vec<f32>,
}

impl AudioBuffer {
    /// Wrap interleaved PCM. `data.len()` must be a multiple of `channels`.
    pub fn new(sample_rate: f32, channels: usize, data: Vec<f32>) -> Self {
        debug_assert!(channels > 0);
        debug_assert_eq!(data.len() % channels.max(1), 0);
        Self {
            sample_rate,
            channels,
            data,
        }
    }

    /// The sample rate the PCM was produced at.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Channel count of the interleaving.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.channels
    }

    /// The raw interleaved samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// One sample, by frame and channel. Out-of-range reads return silence.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data
            .get(frame * self.channels + channel)
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accounting() {
        let buffer = AudioBuffer::new(44100.0, 2, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.sample(0, 1), 0.2);
        assert_eq!(buffer.sample(1, 0), 0.3);
        assert_eq!(buffer.sample(9, 0), 0.0);
    }
}
