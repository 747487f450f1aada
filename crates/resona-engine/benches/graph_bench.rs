//! Criterion benchmarks for the pull scheduler.
//!
//! Measures graph overhead independently of DSP cost using a trivial
//! pass-through node: a linear chain and a wide fan-in, both pulled from
//! the final output.
//!
//! Run with: `cargo bench -p resona-engine -- graph/`
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resona_engine::{NodeSpec, ProcessContext, Processor, Server};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZE: usize = 256;

/// Pass-through node used to isolate scheduling overhead from DSP cost.
struct Pass;

impl Processor for Pass {
    fn spec(&self) -> NodeSpec {
        NodeSpec::new("pass")
            .buffers(1, 1)
            .input_connection(0, 1)
            .output_connection(0, 1)
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        ctx.outputs[0].copy_from_slice(&ctx.inputs[0]);
    }
}

/// Silent source terminating a chain.
struct Source;

impl Processor for Source {
    fn spec(&self) -> NodeSpec {
        NodeSpec::new("source").buffers(0, 1).output_connection(0, 1)
    }

    fn process(&mut self, ctx: ProcessContext<'_>) {
        ctx.outputs[0].fill(0.25);
    }
}

fn make_chain(length: usize) -> Server {
    let server = Server::new(SAMPLE_RATE, BLOCK_SIZE);
    let mut previous = server.add_node(Box::new(Source));
    for _ in 0..length {
        let node = server.add_node(Box::new(Pass));
        server.connect(previous, 0, node, 0).unwrap();
        previous = node;
    }
    server.connect_server(previous, 0).unwrap();
    server
}

fn make_fan_in(width: usize) -> Server {
    let server = Server::new(SAMPLE_RATE, BLOCK_SIZE);
    let sink = server.add_node(Box::new(Pass));
    for _ in 0..width {
        let source = server.add_node(Box::new(Source));
        server.connect(source, 0, sink, 0).unwrap();
    }
    server.connect_server(sink, 0).unwrap();
    server
}

fn bench_produce_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/produce_block");
    let mut out = vec![0.0f32; BLOCK_SIZE * 2];

    for &length in &[1usize, 8, 32, 128] {
        let server = make_chain(length);
        group.bench_with_input(BenchmarkId::new("chain", length), &length, |b, _| {
            b.iter(|| {
                server.produce_block(black_box(&mut out)).unwrap();
            });
        });
    }

    for &width in &[2usize, 8, 32] {
        let server = make_fan_in(width);
        group.bench_with_input(BenchmarkId::new("fan_in", width), &width, |b, _| {
            b.iter(|| {
                server.produce_block(black_box(&mut out)).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_produce_block);
criterion_main!(benches);
