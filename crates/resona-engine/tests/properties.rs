//! Property-based tests for the property system seen through the server
//! API: range clamping, ramp landing, and enumeration bounds hold for
//! arbitrary inputs.

use proptest::prelude::*;
use resona_engine::{NodeSpec, ProcessContext, Processor, PropertyDescriptor, Server};

const SLOT_FLOAT: u32 = 10;
const SLOT_INT: u32 = 11;

struct Knobs;

impl Processor for Knobs {
    fn spec(&self) -> NodeSpec {
        NodeSpec::new("knobs")
            .buffers(0, 1)
            .output_connection(0, 1)
            .property(
                SLOT_FLOAT,
                PropertyDescriptor::float("level", 0.0, -2.0, 2.0),
            )
            .property(SLOT_INT, PropertyDescriptor::int("mode", 0, 0, 3))
    }

    fn process(&mut self, _ctx: ProcessContext<'_>) {}
}

proptest! {
    /// Stored float values always equal clamp(written, min, max).
    #[test]
    fn float_writes_clamp(value in -1e6f32..1e6f32) {
        let server = Server::new(48000.0, 64);
        let node = server.add_node(Box::new(Knobs));
        server.set_float(node, SLOT_FLOAT, value).unwrap();
        let stored = server.get_float(node, SLOT_FLOAT).unwrap();
        prop_assert_eq!(stored, value.clamp(-2.0, 2.0));
    }

    /// Int writes clamp to the enumeration range.
    #[test]
    fn int_writes_clamp(value in i32::MIN..i32::MAX) {
        let server = Server::new(48000.0, 64);
        let node = server.add_node(Box::new(Knobs));
        server.set_int(node, SLOT_INT, value).unwrap();
        let stored = server.get_int(node, SLOT_INT).unwrap();
        prop_assert_eq!(stored, value.clamp(0, 3));
    }

    /// A ramp always lands exactly on its (clamped) target once enough
    /// blocks elapse, and is k-rate afterwards.
    #[test]
    fn ramps_land_on_target(target in -10.0f32..10.0f32, millis in 1u32..200) {
        let block = 64;
        let server = Server::new(48000.0, block);
        let node = server.add_node(Box::new(Knobs));
        // The node must be reachable from the final output for its
        // property ticks to run.
        server.connect_server(node, 0).unwrap();

        let seconds = millis as f32 / 1000.0;
        server.linear_ramp_float(node, SLOT_FLOAT, target, seconds).unwrap();

        let blocks_needed = ((seconds * 48000.0) as usize / block) + 2;
        let mut out = vec![0.0f32; block * 2];
        for _ in 0..blocks_needed {
            server.produce_block(&mut out).unwrap();
        }

        let stored = server.get_float(node, SLOT_FLOAT).unwrap();
        prop_assert_eq!(stored, target.clamp(-2.0, 2.0));
    }
}
