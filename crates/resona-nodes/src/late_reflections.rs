//! Late reflections: an order-16 feedback delay network reverb.
//!
//! The FDN feeds back through two high-shelf filters per line (band
//! separation) and optionally a modulated allpass (extra diffusion):
//!
//! ```text
//! fdn -> mid highshelf -> high highshelf -> modulated allpass -> fdn
//! ```
//!
//! Per-line gains are derived from the low-band T60; the two shelves then
//! shape the mid and high bands relative to the band below, because the
//! lowshelf biquad formulas misbehave at very low frequencies so the bands
//! are built bottom-up with highshelves. The gains are baked into the
//! feedback matrix (`diag(g) · H`).
//!
//! Delay lengths are powers of coprime integers near a density-controlled
//! base delay; the first/last and second/next-to-last pairs are swapped,
//! which audibly reduces a metallic panning artifact when the node sits
//! between panners. A per-line delay equalizes first arrivals across
//! channels.
//!
//! Every modulator keeps running (or is skipped forward) whether or not
//! its stage is enabled, so the same parameters always produce the same
//! reverb, including across enable/disable transitions.

use libm::{log, pow, round};

use resona_core::math::{db_to_gain, scalar_to_db};
use resona_core::{hadamard, kernels, Biquad, CrossfadingDelay, FeedbackDelayNetwork, FilterType, SineOsc};
use resona_engine::{NodeSpec, ProcessContext, Processor, PropertyDescriptor, PropertyStore, Server};

/// Float: overall decay time of the mid band, in seconds.
pub const T60: u32 = 10;
/// Float: echo density in [0, 1]; higher densities use shorter lines.
pub const DENSITY: u32 = 11;
/// Float: decay time of the high band, in seconds.
pub const HF_T60: u32 = 12;
/// Float: decay time of the low band, in seconds.
pub const LF_T60: u32 = 13;
/// Float: crossover between mid and high bands, in Hz.
pub const HF_REFERENCE: u32 = 14;
/// Float: crossover between low and mid bands, in Hz.
pub const LF_REFERENCE: u32 = 15;
/// Float: rate of the per-channel amplitude modulators, in Hz.
pub const AMPLITUDE_MODULATION_FREQUENCY: u32 = 16;
/// Float: amplitude modulation depth in [0, 1]; 0 disables the stage.
pub const AMPLITUDE_MODULATION_DEPTH: u32 = 17;
/// Float: rate of the delay-length modulators, in Hz.
pub const DELAY_MODULATION_FREQUENCY: u32 = 18;
/// Float: delay modulation depth in [0, 1]; 0 leaves lines unmodulated.
pub const DELAY_MODULATION_DEPTH: u32 = 19;
/// Int: 1 enables the diffusing allpasses.
pub const ALLPASS_ENABLED: u32 = 20;
/// Float: lower bound of the allpass center sweep, in Hz.
pub const ALLPASS_MINFREQ: u32 = 21;
/// Float: upper bound of the allpass center sweep, in Hz.
pub const ALLPASS_MAXFREQ: u32 = 22;
/// Float: Q of the diffusing allpasses.
pub const ALLPASS_Q: u32 = 23;
/// Float: rate of the allpass center sweep, in Hz.
pub const ALLPASS_MODULATION_FREQUENCY: u32 = 24;

/// The FDN order.
const ORDER: usize = 16;

/// Coprime integers whose powers approximate the line delays.
const COPRIMES: [u32; ORDER] = [3, 4, 5, 7, 9, 11, 13, 16, 17, 19, 23, 27, 29, 31, 35, 37];

/// One circulation's gain for a T60 decay over a line of `length` seconds.
fn t60_to_gain(t60: f64, length: f64) -> f64 {
    let db_per_second = -60.0 / t60;
    db_to_gain(db_per_second * length)
}

/// Order-16 FDN late-reflections reverb. 16 mono inputs, 16 mono outputs.
pub struct LateReflectionsNode {
    sample_rate: f32,
    fdn: FeedbackDelayNetwork,
    matrix: Vec<f32>,
    delays: [f32; ORDER],
    gains: [f32; ORDER],
    output_frame: [f32; ORDER],
    next_input_frame: [f32; ORDER],
    /// Shapes mid band relative to low, per line.
    midshelves: Vec<Biquad>,
    /// Shapes high band relative to mid, per line.
    highshelves: Vec<Biquad>,
    allpasses: Vec<Biquad>,
    amplitude_modulators: Vec<SineOsc>,
    delay_modulators: Vec<SineOsc>,
    allpass_modulators: Vec<SineOsc>,
    /// Equalizes first-arrival times across the 16 outputs.
    pan_reducers: Vec<CrossfadingDelay>,
    amplitude_buffer: Vec<f32>,
    /// Forces the initial recompute from default property values.
    first_block: bool,
}

impl LateReflectionsNode {
    pub fn new(server: &Server) -> Self {
        let sample_rate = server.sample_rate();
        let make_modulators = || {
            (0..ORDER)
                .map(|i| {
                    let mut oscillator = SineOsc::new(sample_rate);
                    oscillator.set_phase(i as f64 / ORDER as f64);
                    oscillator
                })
                .collect::<Vec<_>>()
        };

        Self {
            sample_rate,
            fdn: FeedbackDelayNetwork::new(ORDER, 1.0, sample_rate),
            matrix: vec![0.0; ORDER * ORDER],
            delays: [0.0; ORDER],
            gains: [0.0; ORDER],
            output_frame: [0.0; ORDER],
            next_input_frame: [0.0; ORDER],
            midshelves: (0..ORDER).map(|_| Biquad::new(sample_rate)).collect(),
            highshelves: (0..ORDER).map(|_| Biquad::new(sample_rate)).collect(),
            allpasses: (0..ORDER).map(|_| Biquad::new(sample_rate)).collect(),
            amplitude_modulators: make_modulators(),
            delay_modulators: make_modulators(),
            allpass_modulators: make_modulators(),
            pan_reducers: (0..ORDER)
                .map(|_| CrossfadingDelay::new(1.0, sample_rate))
                .collect(),
            amplitude_buffer: vec![0.0; server.block_size()],
            first_block: true,
        }
    }

    /// Rebuild delays, gains, shelves, the feedback matrix, and the pan
    /// reduction delays from the band properties.
    fn recompute(&mut self, properties: &PropertyStore) {
        let sample_rate = self.sample_rate as f64;
        let density = properties.float(DENSITY) as f64;
        let t60 = properties.float(T60) as f64;
        let t60_high = properties.float(HF_T60) as f64;
        let t60_low = properties.float(LF_T60) as f64;
        let hf_reference = properties.float(HF_REFERENCE);
        let lf_reference = properties.float(LF_REFERENCE);

        // All lines sit near this base delay; lower densities spread the
        // reflections out.
        let base_delay = 0.003 + (1.0 - density) * 0.025;
        for i in 0..ORDER {
            // Visit the coprimes in the order 0, 4, 8, 12, 1, 5, 9, 13...
            let prime = COPRIMES[(i % 4) * 4 + i / 4] as f64;
            let power = round(log(base_delay * sample_rate) / log(prime));
            let delay_samples = pow(prime, power);
            self.delays[i] = ((delay_samples / sample_rate).min(1.0)) as f32;
        }
        // The shortest and longest lines would otherwise sit on adjacent
        // outputs, which reads as metallic with panners at both ends.
        self.delays.swap(0, 15);
        self.delays.swap(1, 14);
        self.fdn.set_delays(&self.delays);

        for i in 0..ORDER {
            self.gains[i] = t60_to_gain(t60_low, self.delays[i] as f64) as f32;
        }

        // Shelf q of 1/sqrt(2) is the cookbook's s = 1; the epsilon guards
        // against numerical error at the corner.
        let shelf_q = 1.0 / core::f32::consts::SQRT_2 + 1e-4;
        for i in 0..ORDER {
            let high_gain = t60_to_gain(t60_high, self.delays[i] as f64);
            let mid_gain = t60_to_gain(t60, self.delays[i] as f64);
            let mid_db = scalar_to_db(mid_gain, self.gains[i] as f64) as f32;
            let high_db = scalar_to_db(high_gain, mid_gain) as f32;
            self.highshelves[i].configure(FilterType::Highshelf, hf_reference, high_db, shelf_q);
            self.midshelves[i].configure(FilterType::Highshelf, lf_reference, mid_db, shelf_q);
        }

        // Bake the gains into the feedback matrix.
        hadamard(ORDER, &mut self.matrix);
        for i in 0..ORDER {
            for j in 0..ORDER {
                self.matrix[i * ORDER + j] *= self.gains[i];
            }
        }
        self.fdn.set_matrix(&self.matrix);

        // The first sample of output should reach all 16 outputs at the
        // same time; one extra sample keeps every pan delay nonzero.
        let max_delay = self.delays.iter().cloned().fold(0.0f32, f32::max);
        let pan_reduction_delay = max_delay + 1.0 / self.sample_rate;
        for i in 0..ORDER {
            self.pan_reducers[i].set_delay(pan_reduction_delay - self.delays[i]);
        }
    }

    fn set_modulator_frequencies(oscillators: &mut [SineOsc], frequency: f32) {
        for oscillator in oscillators {
            oscillator.set_frequency(frequency);
        }
    }

    /// Bound the modulator phase accumulators once per block.
    fn normalize_oscillators(&mut self) {
        for i in 0..ORDER {
            self.amplitude_modulators[i].normalize();
            self.delay_modulators[i].normalize();
        }
    }
}

impl Processor for LateReflectionsNode {
    fn spec(&self) -> NodeSpec {
        let nyquist = self.sample_rate / 2.0;
        let mut spec = NodeSpec::new("late_reflections").buffers(ORDER, ORDER);
        for i in 0..ORDER {
            spec = spec.input_connection(i, 1).output_connection(i, 1);
        }
        spec.property(T60, PropertyDescriptor::float("t60", 1.0, 0.01, 30.0))
            .property(DENSITY, PropertyDescriptor::float("density", 0.5, 0.0, 1.0))
            .property(HF_T60, PropertyDescriptor::float("hf_t60", 0.5, 0.01, 30.0))
            .property(LF_T60, PropertyDescriptor::float("lf_t60", 1.0, 0.01, 30.0))
            .property(
                HF_REFERENCE,
                PropertyDescriptor::float("hf_reference", 5000.0f32.min(nyquist), 0.0, nyquist)
                    .dynamic_range(),
            )
            .property(
                LF_REFERENCE,
                PropertyDescriptor::float("lf_reference", 250.0f32.min(nyquist), 0.0, nyquist)
                    .dynamic_range(),
            )
            .property(
                AMPLITUDE_MODULATION_FREQUENCY,
                PropertyDescriptor::float("amplitude_modulation_frequency", 10.0, 0.0, 500.0),
            )
            .property(
                AMPLITUDE_MODULATION_DEPTH,
                PropertyDescriptor::float("amplitude_modulation_depth", 0.0, 0.0, 1.0),
            )
            .property(
                DELAY_MODULATION_FREQUENCY,
                PropertyDescriptor::float("delay_modulation_frequency", 10.0, 0.0, 500.0),
            )
            .property(
                DELAY_MODULATION_DEPTH,
                PropertyDescriptor::float("delay_modulation_depth", 0.0, 0.0, 1.0),
            )
            .property(
                ALLPASS_ENABLED,
                PropertyDescriptor::int("allpass_enabled", 0, 0, 1),
            )
            .property(
                ALLPASS_MINFREQ,
                PropertyDescriptor::float("allpass_minfreq", 500.0f32.min(nyquist), 1.0, nyquist)
                    .dynamic_range(),
            )
            .property(
                ALLPASS_MAXFREQ,
                PropertyDescriptor::float("allpass_maxfreq", 1000.0f32.min(nyquist), 1.0, nyquist)
                    .dynamic_range(),
            )
            .property(
                ALLPASS_Q,
                PropertyDescriptor::float("allpass_q", 0.5, 0.01, 100.0),
            )
            .property(
                ALLPASS_MODULATION_FREQUENCY,
                PropertyDescriptor::float("allpass_modulation_frequency", 1.0, 0.0, 500.0),
            )
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        let properties = &*ctx.properties;
        if self.first_block
            || properties.any_modified(&[T60, DENSITY, HF_T60, LF_T60, HF_REFERENCE, LF_REFERENCE])
        {
            self.recompute(properties);
        }
        if self.first_block || properties.was_modified(AMPLITUDE_MODULATION_FREQUENCY) {
            Self::set_modulator_frequencies(
                &mut self.amplitude_modulators,
                properties.float(AMPLITUDE_MODULATION_FREQUENCY),
            );
        }
        if self.first_block || properties.was_modified(DELAY_MODULATION_FREQUENCY) {
            Self::set_modulator_frequencies(
                &mut self.delay_modulators,
                properties.float(DELAY_MODULATION_FREQUENCY),
            );
        }
        if self.first_block || properties.was_modified(ALLPASS_MODULATION_FREQUENCY) {
            Self::set_modulator_frequencies(
                &mut self.allpass_modulators,
                properties.float(ALLPASS_MODULATION_FREQUENCY),
            );
        }
        if properties.was_modified(ALLPASS_ENABLED) {
            for allpass in &mut self.allpasses {
                allpass.clear_histories();
            }
        }
        self.first_block = false;
        self.normalize_oscillators();

        let amplitude_depth = properties.float(AMPLITUDE_MODULATION_DEPTH);
        let delay_depth = properties.float(DELAY_MODULATION_DEPTH);
        let allpass_min = properties.float(ALLPASS_MINFREQ);
        let allpass_max = properties.float(ALLPASS_MAXFREQ);
        let allpass_q = properties.float(ALLPASS_Q);
        let allpass_enabled = properties.int(ALLPASS_ENABLED) == 1;
        // Sweep delta up and delta down of the midpoint: the full range.
        let allpass_delta = (allpass_max - allpass_min) / 2.0;
        let allpass_center = allpass_min + allpass_delta;

        let block_size = ctx.block_size;
        for frame in 0..block_size {
            for line in 0..ORDER {
                let delay = self.delays[line];
                let modulated =
                    (delay + delay * delay_depth * self.delay_modulators[line].tick()).min(1.0);
                self.fdn.set_delay(line, modulated);
            }
            if allpass_enabled {
                for line in 0..ORDER {
                    self.allpasses[line].configure(
                        FilterType::Allpass,
                        allpass_center + allpass_delta * self.allpass_modulators[line].tick(),
                        0.0,
                        allpass_q,
                    );
                }
            }

            self.fdn.compute_frame(&mut self.output_frame);
            for line in 0..ORDER {
                ctx.outputs[line][frame] = self.output_frame[line];
            }
            // Feedback path: gain, then the two shelves, then perhaps the
            // allpass. The matrix applies the Hadamard mixing on top.
            for line in 0..ORDER {
                let mut sample = self.gains[line] * self.output_frame[line];
                sample = self.highshelves[line].tick(sample);
                sample = self.midshelves[line].tick(sample);
                if allpass_enabled {
                    sample = self.allpasses[line].tick(sample);
                }
                self.output_frame[line] = sample;
            }
            for line in 0..ORDER {
                self.next_input_frame[line] = ctx.inputs[line][frame];
            }
            self.fdn.advance(&self.next_input_frame, &self.output_frame);
        }

        if amplitude_depth != 0.0 {
            // out *= 1 - depth/2 + depth * sin
            for (line, output) in ctx.outputs.iter_mut().enumerate() {
                self.amplitude_modulators[line].fill(&mut self.amplitude_buffer);
                kernels::scalar_mul(&mut self.amplitude_buffer, amplitude_depth);
                kernels::scalar_add(&mut self.amplitude_buffer, 1.0 - amplitude_depth / 2.0);
                kernels::multiply(output, &self.amplitude_buffer);
            }
        }

        // Advance the modulators of every disabled stage, so re-enabling a
        // stage later never jumps its phase.
        if !allpass_enabled {
            for oscillator in &mut self.allpass_modulators {
                oscillator.skip_samples(block_size);
            }
        }
        if amplitude_depth == 0.0 {
            for oscillator in &mut self.amplitude_modulators {
                oscillator.skip_samples(block_size);
            }
        }

        for (line, output) in ctx.outputs.iter_mut().enumerate() {
            let reducer = &mut self.pan_reducers[line];
            for sample in output.iter_mut() {
                *sample = reducer.tick(*sample);
            }
        }
    }

    fn reset(&mut self, _properties: &PropertyStore) {
        self.fdn.reset();
        for i in 0..ORDER {
            self.midshelves[i].clear_histories();
            self.highshelves[i].clear_histories();
            self.allpasses[i].clear_histories();
            self.amplitude_modulators[i].set_phase(i as f64 / ORDER as f64);
            self.delay_modulators[i].set_phase(i as f64 / ORDER as f64);
            self.allpass_modulators[i].set_phase(i as f64 / ORDER as f64);
            self.pan_reducers[i].reset();
        }
    }
}
