//! Node base: identity, per-kind behavior, and the arena record.
//!
//! A node kind implements [`Processor`]; the engine wraps it in the
//! arena-resident bookkeeping (buffers, endpoints, properties, events) that
//! every node shares. `NodeSpec` is the kind's one-time declaration of what
//! it needs; the engine adds the standard property slots and the
//! `state_changed` event on top.

use std::collections::BTreeMap;

use crate::connection::{InputEndpoint, OutputEndpoint};
use crate::event::{EventQueue, EventTable};
use crate::property::{PropertyDescriptor, PropertyStore};

/// Unique identifier for a node.
///
/// Node IDs are assigned sequentially and never reused within a server
/// instance. They remain stable across graph mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Playback state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// The node processes audio.
    Playing,
    /// The node outputs silence; its tick counter still advances.
    Paused,
}

impl NodeState {
    pub(crate) fn from_int(value: i32) -> Self {
        if value == slots::STATE_PAUSED {
            NodeState::Paused
        } else {
            NodeState::Playing
        }
    }

    pub(crate) fn to_int(self) -> i32 {
        match self {
            NodeState::Playing => slots::STATE_PLAYING,
            NodeState::Paused => slots::STATE_PAUSED,
        }
    }
}

/// Standard property slots present on every node, plus the enumeration
/// values they use. Kind-specific slots start at [`slots::FIRST_KIND_SLOT`].
pub mod slots {
    /// Int: [`STATE_PLAYING`] or [`STATE_PAUSED`].
    pub const STATE: u32 = 0;
    /// Float, a-rate capable: post-`process()` gain, applied before `ADD`.
    pub const MUL: u32 = 1;
    /// Float, a-rate capable: post-`process()` offset, applied after `MUL`.
    pub const ADD: u32 = 2;
    /// Int: [`INTERPRETATION_SPEAKERS`] or [`INTERPRETATION_DISCRETE`].
    pub const CHANNEL_INTERPRETATION: u32 = 3;

    /// First slot number available to node kinds.
    pub const FIRST_KIND_SLOT: u32 = 10;

    pub const STATE_PLAYING: i32 = 0;
    pub const STATE_PAUSED: i32 = 1;

    /// Mismatched channel counts go through the mixing matrices.
    pub const INTERPRETATION_SPEAKERS: i32 = 0;
    /// Mismatched channel counts truncate or zero-extend.
    pub const INTERPRETATION_DISCRETE: i32 = 1;
}

/// A channel window declared by a node kind for one of its endpoints.
#[derive(Clone, Copy, Debug)]
pub struct EndpointSpec {
    /// First buffer index of the window.
    pub start: usize,
    /// Number of grouped channels.
    pub channels: usize,
}

/// A node kind's one-time declaration of its shape.
pub struct NodeSpec {
    pub name: &'static str,
    pub input_buffers: usize,
    pub output_buffers: usize,
    pub input_connections: Vec<EndpointSpec>,
    pub output_connections: Vec<EndpointSpec>,
    pub properties: Vec<(u32, PropertyDescriptor)>,
    pub events: Vec<(u32, &'static str)>,
    /// Whether the engine zeroes output buffers before `process()`.
    /// Kinds whose `process()` unconditionally overwrites opt out.
    pub zero_output_buffers: bool,
}

impl NodeSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            input_buffers: 0,
            output_buffers: 0,
            input_connections: Vec::new(),
            output_connections: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            zero_output_buffers: true,
        }
    }

    /// Set the input and output buffer counts.
    pub fn buffers(mut self, inputs: usize, outputs: usize) -> Self {
        self.input_buffers = inputs;
        self.output_buffers = outputs;
        self
    }

    /// Append an input endpoint over `channels` buffers starting at `start`.
    pub fn input_connection(mut self, start: usize, channels: usize) -> Self {
        self.input_connections.push(EndpointSpec { start, channels });
        self
    }

    /// Append an output endpoint over `channels` buffers starting at `start`.
    pub fn output_connection(mut self, start: usize, channels: usize) -> Self {
        self.output_connections.push(EndpointSpec { start, channels });
        self
    }

    /// Declare a kind-specific property. Slots below
    /// [`slots::FIRST_KIND_SLOT`] are reserved for the engine.
    pub fn property(mut self, slot: u32, descriptor: PropertyDescriptor) -> Self {
        debug_assert!(slot >= slots::FIRST_KIND_SLOT, "slot {slot} is reserved");
        self.properties.push((slot, descriptor));
        self
    }

    /// Declare a kind-specific event slot.
    pub fn event(mut self, slot: u32, name: &'static str) -> Self {
        self.events.push((slot, name));
        self
    }

    /// Opt out of pre-`process()` output zeroing.
    pub fn keep_output_buffers(mut self) -> Self {
        self.zero_output_buffers = false;
        self
    }
}

/// Everything a node kind sees during its `process()` call.
pub struct ProcessContext<'a> {
    pub sample_rate: f32,
    pub block_size: usize,
    /// Input buffers, already cleared and fan-in summed.
    pub inputs: &'a [Vec<f32>],
    /// Output buffers; zeroed first unless the kind opted out.
    pub outputs: &'a mut [Vec<f32>],
    /// The node's property store, ticked for this block.
    pub properties: &'a mut PropertyStore,
    /// Synchronous event fires, dispatched after the tick.
    pub events: &'a mut EventQueue,
}

/// Per-kind behavior of a node.
///
/// `process()` runs at most once per block, after every dependency has
/// produced, and must not block: it is called from the audio path.
pub trait Processor: Send {
    /// Declare buffer counts, endpoints, properties, and events.
    /// Called once when the node is added to a server.
    fn spec(&self) -> NodeSpec;

    /// Produce one block of audio into `ctx.outputs`.
    fn process(&mut self, ctx: ProcessContext<'_>);

    /// Clear DSP state (filter histories, delay contents, oscillator
    /// phases). Property values are not touched.
    fn reset(&mut self, properties: &PropertyStore) {
        let _ = properties;
    }
}

/// The node kind as stored in the arena.
pub(crate) enum NodeBody {
    Standard(Box<dyn Processor>),
    Subgraph {
        input_node: Option<NodeId>,
        output_node: Option<NodeId>,
    },
}

/// Arena record bundling a node's body with the shared bookkeeping.
pub(crate) struct NodeData {
    pub name: &'static str,
    pub body: NodeBody,
    pub input_buffers: Vec<Vec<f32>>,
    pub output_buffers: Vec<Vec<f32>>,
    pub inputs: Vec<InputEndpoint>,
    pub outputs: Vec<OutputEndpoint>,
    pub properties: PropertyStore,
    pub events: EventTable,
    /// Slot -> (target node, target slot) for forwarded properties.
    pub forwarded: BTreeMap<u32, (NodeId, u32)>,
    /// Tick guard: the last server tick this node ran in.
    pub last_processed: u64,
    pub zero_output_buffers: bool,
}

impl NodeData {
    pub fn state(&self) -> NodeState {
        NodeState::from_int(self.properties.int(slots::STATE))
    }

    pub fn needs_mixing(&self) -> bool {
        self.properties.int(slots::CHANNEL_INTERPRETATION) == slots::INTERPRETATION_SPEAKERS
    }
}
