//! End-to-end scenarios: node kinds running inside a server, pulled from
//! the final output.

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex};

use resona_engine::{mix, NodeSpec, ProcessContext, Processor, Server};
use resona_nodes::{late_reflections, sine, GainNode, LateReflectionsNode, PullNode, SineNode, SquareNode};

/// Copies inputs to outputs and snapshots the summed inputs.
struct Capture {
    channels: usize,
    seen: Arc<Mutex<Vec<Vec<f32>>>>,
}

impl Capture {
    fn new(channels: usize) -> Self {
        Self {
            channels,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Processor for Capture {
    fn spec(&self) -> NodeSpec {
        NodeSpec::new("capture")
            .buffers(self.channels, self.channels)
            .input_connection(0, self.channels)
            .output_connection(0, self.channels)
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        *self.seen.lock().unwrap() = ctx.inputs.to_vec();
        for (out, inp) in ctx.outputs.iter_mut().zip(ctx.inputs) {
            out.copy_from_slice(inp);
        }
    }
}

/// Emits a single full-scale sample at the very first frame, then silence.
struct Impulse {
    fired: bool,
}

impl Processor for Impulse {
    fn spec(&self) -> NodeSpec {
        NodeSpec::new("impulse").buffers(0, 1).output_connection(0, 1)
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        if !self.fired {
            ctx.outputs[0][0] = 1.0;
            self.fired = true;
        }
    }
}

#[test]
fn test_sine_block_through_speakers_matrix() {
    // 441 Hz at 44.1 kHz: sample 0 is sin(0) = 0, sample 100 is
    // sin(2pi * 441 * 100 / 44100), spread equally on both channels by the
    // 1->2 matrix.
    let sr = 44100.0;
    let block = 1024;
    let server = Server::new(sr, block);
    let node = server.add_node(Box::new(SineNode::new(&server)));
    server.set_float(node, sine::FREQUENCY, 441.0).unwrap();
    server.connect_server(node, 0).unwrap();

    let mut out = vec![0.0f32; block * 2];
    server.produce_block(&mut out).unwrap();

    assert!(out[0].abs() < 1e-6, "first sample should be 0, got {}", out[0]);

    let weight = mix::MIX_1_TO_2[0] as f64;
    let expected = (TAU * 441.0 * 100.0 / 44100.0).sin() * weight;
    for channel in 0..2 {
        let sample = out[100 * 2 + channel] as f64;
        assert!(
            (sample - expected).abs() < 1e-4,
            "channel {channel}: got {sample}, want {expected}"
        );
        assert!((out[100 * 2] - out[100 * 2 + 1]).abs() < 1e-7);
    }
}

#[test]
fn test_sine_frequency_clamps_to_nyquist() {
    let server = Server::new(44100.0, 64);
    let node = server.add_node(Box::new(SineNode::new(&server)));
    server.set_float(node, sine::FREQUENCY, 100_000.0).unwrap();
    assert_eq!(server.get_float(node, sine::FREQUENCY), Ok(22050.0));
    assert_eq!(server.has_dynamic_range(node, sine::FREQUENCY), Ok(true));
}

#[test]
fn test_sine_reset_is_idempotent() {
    let sr = 48000.0;
    let block = 256;
    let server = Server::new(sr, block);
    let node = server.add_node(Box::new(SineNode::new(&server)));
    server.set_float(node, sine::FREQUENCY, 333.0).unwrap();
    server.connect_server(node, 0).unwrap();

    let mut reference = vec![0.0f32; block * 2];
    server.reset(node).unwrap();
    server.produce_block(&mut reference).unwrap();

    // reset; reset is the same as reset: both replay the same block.
    let mut out = vec![0.0f32; block * 2];
    server.reset(node).unwrap();
    server.reset(node).unwrap();
    server.produce_block(&mut out).unwrap();
    assert_eq!(reference, out);
}

#[test]
fn test_square_peak_stays_in_range() {
    // 100 Hz at 44.1 kHz selects 220 harmonics automatically; one period
    // of output must stay within [-1, 1].
    let sr = 44100.0;
    let block = 441; // exactly one period
    let server = Server::new(sr, block);
    let node = server.add_node(Box::new(SquareNode::new(&server)));
    server.set_float(node, resona_nodes::square::FREQUENCY, 100.0).unwrap();

    let capture = Capture::new(1);
    let seen = capture.seen.clone();
    let dest = server.add_node(Box::new(capture));
    server.connect(node, 0, dest, 0).unwrap();
    server.connect_server(dest, 0).unwrap();

    let mut out = vec![0.0f32; block * 2];
    server.produce_block(&mut out).unwrap();

    let inputs = seen.lock().unwrap().clone();
    let peak = inputs[0].iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak <= 1.0, "square peak out of range: {peak}");
    assert!(peak > 0.7, "square should approach full scale: {peak}");
}

#[test]
fn test_square_phase_write_offsets_running_phase() {
    // Writing PHASE adds to the bank's running phase rather than replacing
    // it. A half-cycle offset puts every odd harmonic half a period
    // forward, so the block after the write is the negated continuation of
    // an undisturbed run.
    let sr = 8000.0;
    let block = 256;
    let freq = 100.0;

    let reference = Server::new(sr, block);
    let undisturbed = reference.add_node(Box::new(SquareNode::new(&reference)));
    reference
        .set_float(undisturbed, resona_nodes::square::FREQUENCY, freq)
        .unwrap();
    reference.connect_server(undisturbed, 0).unwrap();

    let server = Server::new(sr, block);
    let offset = server.add_node(Box::new(SquareNode::new(&server)));
    server
        .set_float(offset, resona_nodes::square::FREQUENCY, freq)
        .unwrap();
    server.connect_server(offset, 0).unwrap();

    let mut expected = vec![0.0f32; block * 2];
    let mut out = vec![0.0f32; block * 2];
    reference.produce_block(&mut expected).unwrap();
    server.produce_block(&mut out).unwrap();
    assert_eq!(expected, out);

    server
        .set_float(offset, resona_nodes::square::PHASE, 0.5)
        .unwrap();
    reference.produce_block(&mut expected).unwrap();
    server.produce_block(&mut out).unwrap();
    for (frame, (&got, &want)) in out.iter().zip(&expected).enumerate() {
        assert!(
            (got + want).abs() < 1e-4,
            "frame {frame}: expected negated continuation, got {got} vs {want}"
        );
    }
}

#[test]
fn test_gain_node_passes_audio() {
    let server = Server::new(48000.0, 128);
    let source = server.add_node(Box::new(SineNode::new(&server)));
    let gain = server.add_node(Box::new(GainNode::new(1)));
    server.connect(source, 0, gain, 0).unwrap();
    server.connect_server(gain, 0).unwrap();

    let mut out = vec![0.0f32; 128 * 2];
    server.produce_block(&mut out).unwrap();
    assert!(out.iter().any(|&s| s != 0.0));
}

#[test]
fn test_pull_node_resamples_callback_audio() {
    // A 1 kHz sine produced by the callback at 22.05 kHz comes out as a
    // 1 kHz sine at the engine's 44.1 kHz.
    let sr = 44100.0;
    let input_sr = 22050u32;
    let block = 512;
    let channels = 2;
    let server = Server::new(sr, block);

    let mut frames_delivered = 0u64;
    let callback: resona_nodes::PullCallback = Box::new(move |buffer: &mut [f32]| {
        for frame in buffer.chunks_mut(channels) {
            let t = frames_delivered as f64 / input_sr as f64;
            let sample = (TAU * 1000.0 * t).sin() as f32;
            for slot in frame.iter_mut() {
                *slot = sample;
            }
            frames_delivered += 1;
        }
    });

    let node = server.add_node(Box::new(PullNode::new(
        &server,
        input_sr,
        channels,
        Some(callback),
    )));

    let capture = Capture::new(channels);
    let seen = capture.seen.clone();
    let dest = server.add_node(Box::new(capture));
    server.connect(node, 0, dest, 0).unwrap();
    server.connect_server(dest, 0).unwrap();

    let mut out = vec![0.0f32; block * channels];
    server.produce_block(&mut out).unwrap();

    let inputs = seen.lock().unwrap().clone();
    for (frame, &sample) in inputs[0].iter().enumerate() {
        let expected = (TAU * 1000.0 * frame as f64 / sr as f64).sin() as f32;
        assert!(
            (sample - expected).abs() < 0.05,
            "frame {frame}: got {sample}, want {expected}"
        );
    }
    // Both channels carry the same signal.
    assert_eq!(inputs[0], inputs[1]);
}

#[test]
fn test_pull_node_without_callback_is_silent() {
    let server = Server::new(44100.0, 128);
    let node = server.add_node(Box::new(PullNode::new(&server, 22050, 1, None)));
    server.connect_server(node, 0).unwrap();

    let mut out = vec![0.0f32; 128 * 2];
    server.produce_block(&mut out).unwrap();
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn test_late_reflections_onset_and_decay() {
    // An impulse into line 0: silence until the shortest path through the
    // network (every output is pan-equalized to the longest line), then a
    // tail that decays by better than 60 dB over a few T60s.
    let sr = 8000.0;
    let block = 256;
    let server = Server::new(sr, block);

    let reverb = server.add_node(Box::new(LateReflectionsNode::new(&server)));
    server.set_float(reverb, late_reflections::T60, 0.5).unwrap();
    server.set_float(reverb, late_reflections::HF_T60, 0.3).unwrap();
    server.set_float(reverb, late_reflections::LF_T60, 0.5).unwrap();
    server.connect_server(reverb, 0).unwrap();

    // Let the delay-line crossfades settle on silence before injecting.
    let mut out = vec![0.0f32; block * 2];
    for _ in 0..4 {
        server.produce_block(&mut out).unwrap();
    }

    let impulse = server.add_node(Box::new(Impulse { fired: false }));
    server.connect(impulse, 0, reverb, 0).unwrap();

    let blocks = (2.0 * sr) as usize / block;
    let mut response = Vec::with_capacity(blocks * block);
    for _ in 0..blocks {
        server.produce_block(&mut out).unwrap();
        for frame in out.chunks(2) {
            response.push(frame[0]);
        }
    }

    // Onset: nothing before the impulse has circulated once through the
    // shortest delay line (well over 100 samples at this density).
    let first_nonzero = response.iter().position(|&s| s != 0.0);
    let first_nonzero = first_nonzero.expect("reverb never produced output");
    assert!(
        first_nonzero > 100,
        "output appeared implausibly early: sample {first_nonzero}"
    );

    let peak = response.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    assert!(peak > 0.0);

    // Decay: by 1.5 s (3 T60s) the tail is at least 60 dB down.
    let late_start = (1.5 * sr) as usize;
    let late_peak = response[late_start..]
        .iter()
        .fold(0.0f32, |m, &s| m.max(s.abs()));
    assert!(
        late_peak < peak * 0.001,
        "tail did not decay: peak {peak}, late {late_peak}"
    );
}

#[test]
fn test_late_reflections_reset_replays_identically() {
    // reset; produce and reset; reset; produce observe identical output
    // for identical excitation.
    let sr = 8000.0;
    let block = 256;
    let blocks = 8;
    let server = Server::new(sr, block);

    let reverb = server.add_node(Box::new(LateReflectionsNode::new(&server)));
    server.connect_server(reverb, 0).unwrap();

    // Settle the delay-line crossfades before the comparison runs.
    let mut out = vec![0.0f32; block * 2];
    for _ in 0..4 {
        server.produce_block(&mut out).unwrap();
    }

    let run = |server: &Server| {
        let impulse = server.add_node(Box::new(Impulse { fired: false }));
        server.connect(impulse, 0, reverb, 0).unwrap();
        let mut response = Vec::new();
        let mut out = vec![0.0f32; block * 2];
        for _ in 0..blocks {
            server.produce_block(&mut out).unwrap();
            response.extend_from_slice(&out);
        }
        server.remove_node(impulse).unwrap();
        response
    };

    server.reset(reverb).unwrap();
    let reference = run(&server);

    server.reset(reverb).unwrap();
    server.reset(reverb).unwrap();
    let replay = run(&server);

    assert_eq!(reference, replay);
}

#[test]
fn test_late_reflections_density_changes_take_effect() {
    let sr = 8000.0;
    let block = 128;
    let server = Server::new(sr, block);
    let reverb = server.add_node(Box::new(LateReflectionsNode::new(&server)));
    let impulse = server.add_node(Box::new(Impulse { fired: false }));
    server.connect(impulse, 0, reverb, 0).unwrap();
    server.connect_server(reverb, 0).unwrap();

    let mut out = vec![0.0f32; block * 2];
    server.produce_block(&mut out).unwrap();

    // A density write flags a recompute on the next block; the engine
    // must keep producing finite audio through the change.
    server.set_float(reverb, late_reflections::DENSITY, 0.9).unwrap();
    for _ in 0..8 {
        server.produce_block(&mut out).unwrap();
        assert!(out.iter().all(|s| s.is_finite()));
    }
}
