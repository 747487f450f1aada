//! The graph owner and scheduler.
//!
//! [`Server`] holds the node and edge arenas, the block clock, and the
//! *final output connection* — the input-like endpoint whose channel count
//! matches the configured output device. One [`produce_block`](Server::produce_block)
//! call advances the tick counter and pulls every node reachable from the
//! final output exactly once, depth-first through its dependencies.
//!
//! # Locking
//!
//! Everything lives behind a single mutex: every public operation —
//! including the audio callback driving `produce_block` — locks it exactly
//! once, and internal code never re-locks. Graph topology and property
//! state are therefore consistent for the whole of any block. Event
//! handlers run under the lock and must not call back into the server.

use std::sync::{Mutex, MutexGuard};

use resona_core::kernels;
use tracing::{debug, trace};

use crate::connection::{self, Edge, EdgeId, EdgeTarget, InputEndpoint, OutputEndpoint};
use crate::error::{Error, Result};
use crate::event::{self, EventHandler, EventQueue, EventTable};
use crate::node::{slots, NodeBody, NodeData, NodeId, NodeState, ProcessContext, Processor};
use crate::property::{Property, PropertyDescriptor, PropertyStore, PropertyType};

/// Configuration of the (collaborator-provided) output device.
#[derive(Clone, Debug)]
pub struct OutputDevice {
    pub name: String,
    pub channels: usize,
    /// Device-side buffering, in blocks.
    pub mix_ahead: usize,
}

/// The server-owned final output connection.
struct FinalOutput {
    buffers: Vec<Vec<f32>>,
    incoming: Vec<EdgeId>,
}

struct Graph {
    sample_rate: f32,
    block_size: usize,
    tick_count: u64,
    nodes: Vec<Option<NodeData>>,
    edges: Vec<Option<Edge>>,
    next_node_slot: u32,
    next_edge_slot: u32,
    final_output: FinalOutput,
    device: Option<OutputDevice>,
    pending_events: Vec<(NodeId, u32)>,
}

/// The graph owner: node registry, scheduler, and control surface.
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::new(44100.0, 1024);
/// let sine = server.add_node(Box::new(SineNode::new(&server)));
/// server.set_float(sine, sine_slots::FREQUENCY, 441.0)?;
/// server.connect_server(sine, 0)?;
///
/// let mut block = vec![0.0; 1024 * 2];
/// server.produce_block(&mut block)?;
/// ```
pub struct Server {
    sample_rate: f32,
    block_size: usize,
    graph: Mutex<Graph>,
}

impl Server {
    /// Create a server with a fixed sample rate and block size. The final
    /// output starts with two channels until an output device is set.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            graph: Mutex::new(Graph {
                sample_rate,
                block_size,
                tick_count: 0,
                nodes: Vec::new(),
                edges: Vec::new(),
                next_node_slot: 0,
                next_edge_slot: 0,
                final_output: FinalOutput {
                    buffers: vec![vec![0.0; block_size]; 2],
                    incoming: Vec::new(),
                },
                device: None,
                pending_events: Vec::new(),
            }),
        }
    }

    fn graph(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The engine sample rate, in Hz. Immutable for the server's lifetime.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Samples per block. Immutable for the server's lifetime.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Configure the output device the final output feeds: its channel
    /// count resizes the final output connection.
    pub fn set_output_device(&self, name: &str, channels: usize, mix_ahead: usize) -> Result<()> {
        if channels == 0 {
            return Err(Error::Range);
        }
        let mut graph = self.graph();
        graph.final_output.buffers = vec![vec![0.0; self.block_size]; channels];
        graph.device = Some(OutputDevice {
            name: name.to_owned(),
            channels,
            mix_ahead,
        });
        debug!(name, channels, mix_ahead, "output device configured");
        Ok(())
    }

    /// The configured output device, if any.
    pub fn output_device(&self) -> Option<OutputDevice> {
        self.graph().device.clone()
    }

    /// The final output channel count.
    pub fn output_channels(&self) -> usize {
        self.graph().final_output.buffers.len()
    }

    /// Produce one block of interleaved audio into `out`, which must hold
    /// exactly `block_size * output_channels` samples.
    pub fn produce_block(&self, out: &mut [f32]) -> Result<()> {
        let mut graph = self.graph();
        graph.produce_block(out)?;
        graph.dispatch_events();
        Ok(())
    }

    /// Detach every connection and drop every node.
    pub fn shutdown(&self) {
        let mut graph = self.graph();
        graph.nodes.clear();
        graph.edges.clear();
        graph.final_output.incoming.clear();
        for buffer in &mut graph.final_output.buffers {
            buffer.fill(0.0);
        }
        debug!("server shut down");
    }

    // --- Node management ---

    /// Register a node kind with the server and return its handle.
    pub fn add_node(&self, processor: Box<dyn Processor>) -> NodeId {
        self.graph().add_node(processor)
    }

    /// Create a subgraph node wrapping `input_node` / `output_node`.
    pub fn add_subgraph(
        &self,
        input_node: Option<NodeId>,
        output_node: Option<NodeId>,
    ) -> Result<NodeId> {
        self.graph().add_subgraph(input_node, output_node)
    }

    /// Remove a node, detaching all of its connections first.
    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        self.graph().remove_node(node)
    }

    /// Invoke the node kind's `reset()` hook.
    pub fn reset(&self, node: NodeId) -> Result<()> {
        let mut graph = self.graph();
        let NodeData {
            body, properties, ..
        } = graph.node_mut(node)?;
        if let NodeBody::Standard(processor) = body {
            processor.reset(properties);
        }
        Ok(())
    }

    /// The node's playback state.
    pub fn state(&self, node: NodeId) -> Result<NodeState> {
        let graph = self.graph();
        let value = graph.property(node, slots::STATE)?.get_int()?;
        Ok(NodeState::from_int(value))
    }

    /// Set the node's playback state. Fires `state_changed` when the value
    /// changes.
    pub fn set_state(&self, node: NodeId, state: NodeState) -> Result<()> {
        self.set_int(node, slots::STATE, state.to_int())
    }

    // --- Connections ---

    /// Connect `output` of `from` to `input` of `to`.
    pub fn connect(&self, from: NodeId, output: usize, to: NodeId, input: usize) -> Result<()> {
        let mut graph = self.graph();
        graph.connect(from, output, to, input)
    }

    /// Connect `output` of `from` to the final output connection.
    pub fn connect_server(&self, from: NodeId, output: usize) -> Result<()> {
        self.graph().connect_server(from, output)
    }

    /// Connect `output` of `from` to the modulation input of a property.
    pub fn connect_property(&self, from: NodeId, output: usize, to: NodeId, slot: u32) -> Result<()> {
        self.graph().connect_property(from, output, to, slot)
    }

    /// Detach every connection leaving `output` of `from`. Idempotent.
    pub fn disconnect(&self, from: NodeId, output: usize) -> Result<()> {
        self.graph().disconnect(from, output)
    }

    /// The number of input endpoints a node exposes. Subgraphs report
    /// their inner input node's endpoints.
    pub fn input_connection_count(&self, node: NodeId) -> Result<usize> {
        let graph = self.graph();
        let mut current = node;
        for _ in 0..64 {
            let data = graph.node(current)?;
            match &data.body {
                NodeBody::Subgraph {
                    input_node: Some(inner),
                    ..
                } => current = *inner,
                NodeBody::Subgraph { input_node: None, .. } => return Ok(0),
                NodeBody::Standard(_) => return Ok(data.inputs.len()),
            }
        }
        Err(Error::Internal)
    }

    /// The number of output endpoints a node exposes.
    pub fn output_connection_count(&self, node: NodeId) -> Result<usize> {
        Ok(self.graph().node(node)?.outputs.len())
    }

    // --- Properties: typed scalar access ---

    pub fn get_int(&self, node: NodeId, slot: u32) -> Result<i32> {
        self.graph().property(node, slot)?.get_int()
    }

    pub fn set_int(&self, node: NodeId, slot: u32, value: i32) -> Result<()> {
        let mut graph = self.graph();
        graph.set_int(node, slot, value)?;
        graph.dispatch_events();
        Ok(())
    }

    pub fn get_float(&self, node: NodeId, slot: u32) -> Result<f32> {
        self.graph().property(node, slot)?.get_float()
    }

    pub fn set_float(&self, node: NodeId, slot: u32, value: f32) -> Result<()> {
        self.graph().property_mut(node, slot)?.set_float(value)
    }

    /// Ramp a float property linearly to `target` over `seconds`.
    /// The property evaluates a-rate until the ramp lands.
    pub fn linear_ramp_float(
        &self,
        node: NodeId,
        slot: u32,
        target: f32,
        seconds: f32,
    ) -> Result<()> {
        let sample_rate = self.sample_rate;
        self.graph()
            .property_mut(node, slot)?
            .linear_ramp(target, seconds, sample_rate)
    }

    pub fn get_double(&self, node: NodeId, slot: u32) -> Result<f64> {
        self.graph().property(node, slot)?.get_double()
    }

    pub fn set_double(&self, node: NodeId, slot: u32, value: f64) -> Result<()> {
        self.graph().property_mut(node, slot)?.set_double(value)
    }

    pub fn get_string(&self, node: NodeId, slot: u32) -> Result<String> {
        self.graph().property(node, slot)?.get_string()
    }

    pub fn set_string(&self, node: NodeId, slot: u32, value: &str) -> Result<()> {
        self.graph()
            .property_mut(node, slot)?
            .set_string(value.to_owned())
    }

    pub fn get_float3(&self, node: NodeId, slot: u32) -> Result<[f32; 3]> {
        self.graph().property(node, slot)?.get_float3()
    }

    pub fn set_float3(&self, node: NodeId, slot: u32, value: [f32; 3]) -> Result<()> {
        self.graph().property_mut(node, slot)?.set_float3(value)
    }

    pub fn get_float6(&self, node: NodeId, slot: u32) -> Result<[f32; 6]> {
        self.graph().property(node, slot)?.get_float6()
    }

    pub fn set_float6(&self, node: NodeId, slot: u32, value: [f32; 6]) -> Result<()> {
        self.graph().property_mut(node, slot)?.set_float6(value)
    }

    pub fn get_buffer(
        &self,
        node: NodeId,
        slot: u32,
    ) -> Result<Option<std::sync::Arc<crate::AudioBuffer>>> {
        self.graph().property(node, slot)?.get_buffer()
    }

    pub fn set_buffer(
        &self,
        node: NodeId,
        slot: u32,
        value: Option<std::sync::Arc<crate::AudioBuffer>>,
    ) -> Result<()> {
        self.graph().property_mut(node, slot)?.set_buffer(value)
    }

    /// Restore a property's default value.
    pub fn reset_property(&self, node: NodeId, slot: u32) -> Result<()> {
        self.graph().property_mut(node, slot)?.reset()
    }

    // --- Properties: arrays ---

    pub fn replace_float_array(&self, node: NodeId, slot: u32, values: Vec<f32>) -> Result<()> {
        self.graph().property_mut(node, slot)?.replace_float_array(values)
    }

    pub fn read_float_array(&self, node: NodeId, slot: u32, index: usize) -> Result<f32> {
        self.graph().property(node, slot)?.read_float_array(index)
    }

    pub fn write_float_array(
        &self,
        node: NodeId,
        slot: u32,
        start: usize,
        stop: usize,
        values: &[f32],
    ) -> Result<()> {
        self.graph()
            .property_mut(node, slot)?
            .write_float_array(start, stop, values)
    }

    pub fn float_array_length(&self, node: NodeId, slot: u32) -> Result<usize> {
        self.graph().property(node, slot)?.float_array_length()
    }

    pub fn replace_int_array(&self, node: NodeId, slot: u32, values: Vec<i32>) -> Result<()> {
        self.graph().property_mut(node, slot)?.replace_int_array(values)
    }

    pub fn read_int_array(&self, node: NodeId, slot: u32, index: usize) -> Result<i32> {
        self.graph().property(node, slot)?.read_int_array(index)
    }

    pub fn write_int_array(
        &self,
        node: NodeId,
        slot: u32,
        start: usize,
        stop: usize,
        values: &[i32],
    ) -> Result<()> {
        self.graph()
            .property_mut(node, slot)?
            .write_int_array(start, stop, values)
    }

    pub fn int_array_length(&self, node: NodeId, slot: u32) -> Result<usize> {
        self.graph().property(node, slot)?.int_array_length()
    }

    /// The legal `(min, max)` length of an array property; `TypeMismatch`
    /// for non-array properties.
    pub fn array_length_range(&self, node: NodeId, slot: u32) -> Result<(usize, usize)> {
        self.graph().property(node, slot)?.array_length_range()
    }

    // --- Properties: introspection ---

    pub fn property_name(&self, node: NodeId, slot: u32) -> Result<&'static str> {
        Ok(self.graph().property(node, slot)?.descriptor().name)
    }

    pub fn property_type(&self, node: NodeId, slot: u32) -> Result<PropertyType> {
        Ok(self.graph().property(node, slot)?.property_type())
    }

    pub fn float_range(&self, node: NodeId, slot: u32) -> Result<(f32, f32)> {
        let graph = self.graph();
        let property = graph.property(node, slot)?;
        if property.property_type() != PropertyType::Float {
            return Err(Error::TypeMismatch);
        }
        let descriptor = property.descriptor();
        Ok((descriptor.min as f32, descriptor.max as f32))
    }

    pub fn int_range(&self, node: NodeId, slot: u32) -> Result<(i32, i32)> {
        let graph = self.graph();
        let property = graph.property(node, slot)?;
        if property.property_type() != PropertyType::Int {
            return Err(Error::TypeMismatch);
        }
        let descriptor = property.descriptor();
        Ok((descriptor.min as i32, descriptor.max as i32))
    }

    pub fn double_range(&self, node: NodeId, slot: u32) -> Result<(f64, f64)> {
        let graph = self.graph();
        let property = graph.property(node, slot)?;
        if property.property_type() != PropertyType::Double {
            return Err(Error::TypeMismatch);
        }
        let descriptor = property.descriptor();
        Ok((descriptor.min, descriptor.max))
    }

    pub fn has_dynamic_range(&self, node: NodeId, slot: u32) -> Result<bool> {
        Ok(self.graph().property(node, slot)?.descriptor().dynamic_range)
    }

    // --- Forwarded properties ---

    /// Make `slot` on `node` a transparent alias of `target_slot` on
    /// `target`. Reads and writes go through; a dead target surfaces
    /// `Internal`.
    pub fn forward_property(
        &self,
        node: NodeId,
        slot: u32,
        target: NodeId,
        target_slot: u32,
    ) -> Result<()> {
        let mut graph = self.graph();
        graph.node(node)?;
        graph.resolve_slot(target, target_slot)?;
        graph.node_mut(node)?.forwarded.insert(slot, (target, target_slot));
        Ok(())
    }

    /// Remove a forwarding entry installed by
    /// [`forward_property`](Self::forward_property).
    pub fn stop_forwarding_property(&self, node: NodeId, slot: u32) -> Result<()> {
        let mut graph = self.graph();
        if graph.node_mut(node)?.forwarded.remove(&slot).is_none() {
            return Err(Error::Internal);
        }
        Ok(())
    }

    // --- Events ---

    /// Install (or clear, with `None`) the handler for an event slot.
    pub fn set_event_handler(
        &self,
        node: NodeId,
        event: u32,
        handler: Option<EventHandler>,
    ) -> Result<()> {
        let mut graph = self.graph();
        let data = graph.node_mut(node)?;
        if data.events.set_handler(event, handler) {
            Ok(())
        } else {
            Err(Error::Range)
        }
    }

    /// The declared name of an event slot.
    pub fn event_name(&self, node: NodeId, event: u32) -> Result<&'static str> {
        let graph = self.graph();
        graph.node(node)?.events.name(event).ok_or(Error::Range)
    }
}

impl Graph {
    // --- Arena access ---

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes
            .get(id.0 as usize)
            .and_then(|n| n.as_ref())
            .ok_or(Error::InvalidHandle)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(|n| n.as_mut())
            .ok_or(Error::InvalidHandle)
    }

    fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize).and_then(|e| e.as_ref())
    }

    fn alloc_node_slot(&mut self) -> NodeId {
        let id = NodeId(self.next_node_slot);
        self.next_node_slot += 1;
        let idx = id.0 as usize;
        if idx >= self.nodes.len() {
            self.nodes.resize_with(idx + 1, || None);
        }
        id
    }

    fn alloc_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.next_edge_slot);
        self.next_edge_slot += 1;
        let idx = id.0 as usize;
        if idx >= self.edges.len() {
            self.edges.resize_with(idx + 1, || None);
        }
        self.edges[idx] = Some(edge);
        id
    }

    // --- Node registration ---

    fn base_properties(store: &mut PropertyStore) {
        store.insert(
            slots::STATE,
            PropertyDescriptor::int("state", slots::STATE_PLAYING, 0, 1),
        );
        store.insert(
            slots::MUL,
            PropertyDescriptor::float("mul", 1.0, f32::NEG_INFINITY, f32::INFINITY).modulatable(),
        );
        store.insert(
            slots::ADD,
            PropertyDescriptor::float("add", 0.0, f32::NEG_INFINITY, f32::INFINITY).modulatable(),
        );
        store.insert(
            slots::CHANNEL_INTERPRETATION,
            PropertyDescriptor::int(
                "channel_interpretation",
                slots::INTERPRETATION_SPEAKERS,
                0,
                1,
            ),
        );
    }

    fn add_node(&mut self, processor: Box<dyn Processor>) -> NodeId {
        let spec = processor.spec();
        let id = self.alloc_node_slot();

        let mut properties = PropertyStore::new(self.block_size);
        Self::base_properties(&mut properties);
        for (slot, descriptor) in spec.properties {
            properties.insert(slot, descriptor);
        }

        let mut events = EventTable::default();
        events.declare(event::STATE_CHANGED, "state_changed");
        for (slot, name) in spec.events {
            events.declare(slot, name);
        }

        let data = NodeData {
            name: spec.name,
            body: NodeBody::Standard(processor),
            input_buffers: vec![vec![0.0; self.block_size]; spec.input_buffers],
            output_buffers: vec![vec![0.0; self.block_size]; spec.output_buffers],
            inputs: spec
                .input_connections
                .iter()
                .map(|e| InputEndpoint {
                    start: e.start,
                    channels: e.channels,
                    incoming: Vec::new(),
                })
                .collect(),
            outputs: spec
                .output_connections
                .iter()
                .map(|e| OutputEndpoint {
                    start: e.start,
                    channels: e.channels,
                    outgoing: Vec::new(),
                })
                .collect(),
            properties,
            events,
            forwarded: Default::default(),
            last_processed: 0,
            zero_output_buffers: spec.zero_output_buffers,
        };
        debug!(node = %id, name = data.name, "node added");
        self.nodes[id.0 as usize] = Some(data);
        id
    }

    fn add_subgraph(
        &mut self,
        input_node: Option<NodeId>,
        output_node: Option<NodeId>,
    ) -> Result<NodeId> {
        if let Some(inner) = input_node {
            self.node(inner)?;
        }
        // Mirror the output node's buffer shape so downstream channel
        // adaptation behaves exactly as it would against the inner node.
        let (buffer_count, endpoints) = match output_node {
            Some(inner) => {
                let data = self.node(inner)?;
                (
                    data.output_buffers.len(),
                    data.outputs
                        .iter()
                        .map(|e| (e.start, e.channels))
                        .collect::<Vec<_>>(),
                )
            }
            None => (0, Vec::new()),
        };

        let id = self.alloc_node_slot();
        let mut properties = PropertyStore::new(self.block_size);
        Self::base_properties(&mut properties);
        let mut events = EventTable::default();
        events.declare(event::STATE_CHANGED, "state_changed");

        let data = NodeData {
            name: "subgraph",
            body: NodeBody::Subgraph {
                input_node,
                output_node,
            },
            input_buffers: Vec::new(),
            output_buffers: vec![vec![0.0; self.block_size]; buffer_count],
            inputs: Vec::new(),
            outputs: endpoints
                .iter()
                .map(|&(start, channels)| OutputEndpoint {
                    start,
                    channels,
                    outgoing: Vec::new(),
                })
                .collect(),
            properties,
            events,
            forwarded: Default::default(),
            last_processed: 0,
            zero_output_buffers: true,
        };
        debug!(node = %id, "subgraph added");
        self.nodes[id.0 as usize] = Some(data);
        Ok(id)
    }

    fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;

        // Outgoing edges: detach from their targets.
        let outgoing: Vec<EdgeId> = self
            .node(id)?
            .outputs
            .iter()
            .flat_map(|e| e.outgoing.iter().copied())
            .collect();
        for edge_id in outgoing {
            self.detach_target(edge_id);
            self.edges[edge_id.0 as usize] = None;
        }

        // Incoming edges (inputs and property modulation): detach from
        // their sources.
        let mut incoming: Vec<EdgeId> = self
            .node(id)?
            .inputs
            .iter()
            .flat_map(|e| e.incoming.iter().copied())
            .collect();
        {
            let data = self.node(id)?;
            for slot in data.properties.modulated_slots() {
                incoming.extend(data.properties.modulation_edges(slot));
            }
        }
        for edge_id in incoming {
            if let Some(edge) = self.edge(edge_id).copied() {
                if let Ok(source) = self.node_mut(edge.from) {
                    if let Some(endpoint) = source.outputs.get_mut(edge.output) {
                        endpoint.outgoing.retain(|&e| e != edge_id);
                    }
                }
            }
            self.edges[edge_id.0 as usize] = None;
        }

        debug!(node = %id, "node removed");
        self.nodes[id.0 as usize] = None;
        Ok(())
    }

    // --- Property plumbing ---

    /// Follow forwarding entries to the owning `(node, slot)` pair.
    fn resolve_slot(&self, node: NodeId, slot: u32) -> Result<(NodeId, u32)> {
        let mut current_node = node;
        let mut current_slot = slot;
        let mut via_forward = false;
        for _ in 0..64 {
            let data = match self.node(current_node) {
                Ok(data) => data,
                Err(_) if via_forward => return Err(Error::Internal),
                Err(error) => return Err(error),
            };
            match data.forwarded.get(&current_slot) {
                Some(&(next_node, next_slot)) => {
                    current_node = next_node;
                    current_slot = next_slot;
                    via_forward = true;
                }
                None => {
                    if data.properties.contains(current_slot) {
                        return Ok((current_node, current_slot));
                    }
                    return Err(if via_forward { Error::Internal } else { Error::Range });
                }
            }
        }
        Err(Error::Internal)
    }

    fn property(&self, node: NodeId, slot: u32) -> Result<&Property> {
        let (owner, slot) = self.resolve_slot(node, slot)?;
        self.node(owner)?.properties.get(slot).ok_or(Error::Internal)
    }

    fn property_mut(&mut self, node: NodeId, slot: u32) -> Result<&mut Property> {
        let (owner, slot) = self.resolve_slot(node, slot)?;
        self.node_mut(owner)?
            .properties
            .get_mut(slot)
            .ok_or(Error::Internal)
    }

    fn set_int(&mut self, node: NodeId, slot: u32, value: i32) -> Result<()> {
        let (owner, slot) = self.resolve_slot(node, slot)?;
        let (old, new) = {
            let property = self
                .node_mut(owner)?
                .properties
                .get_mut(slot)
                .ok_or(Error::Internal)?;
            let old = property.get_int().ok();
            property.set_int(value)?;
            (old, property.get_int().ok())
        };
        if slot == slots::STATE && old != new {
            self.pending_events.push((owner, event::STATE_CHANGED));
        }
        Ok(())
    }

    // --- Connections ---

    /// Resolve an input endpoint through subgraph delegation.
    fn resolve_input(&self, node: NodeId, input: usize) -> Result<(NodeId, usize)> {
        let mut current = node;
        let mut via_subgraph = false;
        for _ in 0..64 {
            let data = match self.node(current) {
                Ok(data) => data,
                Err(_) if via_subgraph => return Err(Error::Internal),
                Err(error) => return Err(error),
            };
            match &data.body {
                NodeBody::Subgraph { input_node, .. } => match input_node {
                    Some(inner) => {
                        current = *inner;
                        via_subgraph = true;
                    }
                    None => return Err(Error::Range),
                },
                NodeBody::Standard(_) => {
                    if input >= data.inputs.len() {
                        return Err(Error::Range);
                    }
                    return Ok((current, input));
                }
            }
        }
        Err(Error::Internal)
    }

    /// Every node whose output this node consumes: input-side edges,
    /// property modulators, and (for subgraphs) the inner output node.
    fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        let mut dependencies = Vec::new();
        if let Ok(data) = self.node(id) {
            for endpoint in &data.inputs {
                for &edge_id in &endpoint.incoming {
                    if let Some(edge) = self.edge(edge_id) {
                        dependencies.push(edge.from);
                    }
                }
            }
            for slot in data.properties.modulated_slots() {
                for edge_id in data.properties.modulation_edges(slot) {
                    if let Some(edge) = self.edge(edge_id) {
                        dependencies.push(edge.from);
                    }
                }
            }
            if let NodeBody::Subgraph {
                output_node: Some(inner),
                ..
            } = &data.body
            {
                dependencies.push(*inner);
            }
        }
        dependencies
    }

    /// Iterative DFS with a visited set: is `needle` a (transitive)
    /// dependency of `start`?
    fn depends_on(&self, start: NodeId, needle: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = self.dependencies(start);
        while let Some(current) = stack.pop() {
            if current == needle {
                return true;
            }
            let idx = current.0 as usize;
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.extend(self.dependencies(current));
        }
        false
    }

    fn check_output(&self, node: NodeId, output: usize) -> Result<()> {
        if output >= self.node(node)?.outputs.len() {
            return Err(Error::Range);
        }
        Ok(())
    }

    fn connect(&mut self, from: NodeId, output: usize, to: NodeId, input: usize) -> Result<()> {
        self.check_output(from, output)?;
        let (resolved, input_index) = self.resolve_input(to, input)?;
        if from == to || from == resolved || self.depends_on(from, to) || self.depends_on(from, resolved)
        {
            return Err(Error::CausesCycle);
        }

        let edge_id = self.alloc_edge(Edge {
            from,
            output,
            target: EdgeTarget::Input {
                node: resolved,
                index: input_index,
            },
        });
        self.node_mut(from)?.outputs[output].outgoing.push(edge_id);
        self.node_mut(resolved)?.inputs[input_index]
            .incoming
            .push(edge_id);
        debug!(%from, output, %to, input, "connected");
        Ok(())
    }

    fn connect_server(&mut self, from: NodeId, output: usize) -> Result<()> {
        self.check_output(from, output)?;
        let edge_id = self.alloc_edge(Edge {
            from,
            output,
            target: EdgeTarget::Server,
        });
        self.node_mut(from)?.outputs[output].outgoing.push(edge_id);
        self.final_output.incoming.push(edge_id);
        debug!(%from, output, "connected to final output");
        Ok(())
    }

    fn connect_property(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        slot: u32,
    ) -> Result<()> {
        self.check_output(from, output)?;
        let (target_node, target_slot) = self.resolve_slot(to, slot)?;
        {
            let property = self
                .node(target_node)?
                .properties
                .get(target_slot)
                .ok_or(Error::Internal)?;
            if property.modulation.is_none() {
                return Err(Error::CannotConnectToProperty);
            }
        }
        if from == to
            || from == target_node
            || self.depends_on(from, to)
            || self.depends_on(from, target_node)
        {
            return Err(Error::CausesCycle);
        }

        let edge_id = self.alloc_edge(Edge {
            from,
            output,
            target: EdgeTarget::Property {
                node: target_node,
                slot: target_slot,
            },
        });
        self.node_mut(from)?.outputs[output].outgoing.push(edge_id);
        if let Some(modulation) = self
            .node_mut(target_node)?
            .properties
            .get_mut(target_slot)
            .and_then(|p| p.modulation.as_mut())
        {
            modulation.incoming.push(edge_id);
        }
        debug!(%from, output, %to, slot, "property modulation connected");
        Ok(())
    }

    fn disconnect(&mut self, from: NodeId, output: usize) -> Result<()> {
        self.check_output(from, output)?;
        let edges: Vec<EdgeId> = self
            .node_mut(from)?
            .outputs[output]
            .outgoing
            .drain(..)
            .collect();
        for edge_id in &edges {
            self.detach_target(*edge_id);
            self.edges[edge_id.0 as usize] = None;
        }
        debug!(%from, output, count = edges.len(), "disconnected");
        Ok(())
    }

    /// Remove an edge from its target's fan-in list.
    fn detach_target(&mut self, edge_id: EdgeId) {
        let Some(edge) = self.edge(edge_id).copied() else {
            return;
        };
        match edge.target {
            EdgeTarget::Input { node, index } => {
                if let Ok(data) = self.node_mut(node) {
                    if let Some(endpoint) = data.inputs.get_mut(index) {
                        endpoint.incoming.retain(|&e| e != edge_id);
                    }
                }
            }
            EdgeTarget::Property { node, .. } => {
                if let Ok(data) = self.node_mut(node) {
                    data.properties.remove_modulation_edge(edge_id);
                }
            }
            EdgeTarget::Server => {
                self.final_output.incoming.retain(|&e| e != edge_id);
            }
        }
    }

    // --- Block production ---

    fn produce_block(&mut self, out: &mut [f32]) -> Result<()> {
        let channels = self.final_output.buffers.len();
        if out.len() != channels * self.block_size {
            return Err(Error::Range);
        }

        self.tick_count += 1;
        trace!(tick = self.tick_count, "producing block");

        let mut buffers = std::mem::take(&mut self.final_output.buffers);
        for buffer in &mut buffers {
            buffer.fill(0.0);
        }

        // The final output is always mixed as speakers.
        let edges = self.final_output.incoming.clone();
        for edge_id in edges {
            let Some(edge) = self.edge(edge_id).copied() else {
                continue;
            };
            self.tick_node(edge.from);
            if let Ok(source) = self.node(edge.from) {
                connection::accumulate_adapted(
                    &mut buffers,
                    Self::output_window(source, edge.output),
                    true,
                );
            }
        }

        for (channel, buffer) in buffers.iter().enumerate() {
            for (frame, &sample) in buffer.iter().enumerate() {
                out[frame * channels + channel] = sample;
            }
        }
        self.final_output.buffers = buffers;
        Ok(())
    }

    /// The slice of `node`'s output buffers covered by output endpoint
    /// `index`, clamped defensively to the allocated buffers.
    fn output_window(node: &NodeData, index: usize) -> &[Vec<f32>] {
        match node.outputs.get(index) {
            Some(endpoint) => {
                let start = endpoint.start.min(node.output_buffers.len());
                let stop = (endpoint.start + endpoint.channels).min(node.output_buffers.len());
                &node.output_buffers[start..stop]
            }
            None => &[],
        }
    }

    /// Tick a node for the current block: guard, pull dependencies,
    /// accumulate fan-in, process, apply post-gain.
    fn tick_node(&mut self, id: NodeId) {
        let idx = id.0 as usize;
        match self.nodes.get(idx) {
            Some(Some(node)) if node.last_processed != self.tick_count => {}
            // Missing, already ticked, or in flight higher up the stack
            // (unreachable in an acyclic graph).
            _ => return,
        }

        // Take the node out of the arena: sources stay borrowable while we
        // mutate this node's buffers.
        let mut node = match self.nodes[idx].take() {
            Some(node) => node,
            None => return,
        };
        node.last_processed = self.tick_count;

        match node.body {
            NodeBody::Standard(_) => self.tick_standard(id, &mut node),
            NodeBody::Subgraph { .. } => self.tick_subgraph(&mut node),
        }

        self.nodes[idx] = Some(node);
    }

    fn tick_standard(&mut self, id: NodeId, node: &mut NodeData) {
        let paused = node.state() == NodeState::Paused;
        if node.zero_output_buffers || paused {
            for buffer in &mut node.output_buffers {
                buffer.fill(0.0);
            }
        }
        if paused {
            return;
        }

        self.pull_property_modulation(node);
        node.properties.tick_all();

        for buffer in &mut node.input_buffers {
            buffer.fill(0.0);
        }
        let needs_mixing = node.needs_mixing();
        for input_index in 0..node.inputs.len() {
            let edge_ids = node.inputs[input_index].incoming.clone();
            let (dest_start, dest_channels) =
                (node.inputs[input_index].start, node.inputs[input_index].channels);
            for edge_id in edge_ids {
                let Some(edge) = self.edge(edge_id).copied() else {
                    continue;
                };
                self.tick_node(edge.from);
                if let Ok(source) = self.node(edge.from) {
                    let dest_stop = (dest_start + dest_channels).min(node.input_buffers.len());
                    connection::accumulate_adapted(
                        &mut node.input_buffers[dest_start.min(dest_stop)..dest_stop],
                        Self::output_window(source, edge.output),
                        needs_mixing,
                    );
                }
            }
        }

        let mut queue = EventQueue::new();
        let NodeData {
            body,
            input_buffers,
            output_buffers,
            properties,
            ..
        } = node;
        if let NodeBody::Standard(processor) = body {
            processor.process(ProcessContext {
                sample_rate: self.sample_rate,
                block_size: self.block_size,
                inputs: input_buffers.as_slice(),
                outputs: output_buffers.as_mut_slice(),
                properties,
                events: &mut queue,
            });
        }

        Self::apply_post_gain(node, self.block_size);
        node.properties.clear_modified();
        for slot in queue.drain() {
            self.pending_events.push((id, slot));
        }
    }

    fn tick_subgraph(&mut self, node: &mut NodeData) {
        if node.state() == NodeState::Paused {
            for buffer in &mut node.output_buffers {
                buffer.fill(0.0);
            }
            return;
        }

        self.pull_property_modulation(node);
        node.properties.tick_all();

        let inner = match &node.body {
            NodeBody::Subgraph { output_node, .. } => *output_node,
            NodeBody::Standard(_) => None,
        };
        let mut copied = false;
        if let Some(inner_id) = inner {
            self.tick_node(inner_id);
            if let Ok(inner_node) = self.node(inner_id) {
                // MUL/ADD are applied to a fresh copy each tick; applying
                // them in place on the borrowed inner buffers would
                // compound across blocks.
                for (dest, source) in node
                    .output_buffers
                    .iter_mut()
                    .zip(&inner_node.output_buffers)
                {
                    dest.copy_from_slice(source);
                }
                copied = node.output_buffers.len() <= inner_node.output_buffers.len();
            }
        }
        if !copied {
            for buffer in &mut node.output_buffers {
                buffer.fill(0.0);
            }
        }

        Self::apply_post_gain(node, self.block_size);
        node.properties.clear_modified();
    }

    /// Pull and sum each modulated property's sources into its one-channel
    /// modulation buffer.
    fn pull_property_modulation(&mut self, node: &mut NodeData) {
        for slot in node.properties.modulated_slots() {
            node.properties.zero_modulation(slot);
            for edge_id in node.properties.modulation_edges(slot) {
                let Some(edge) = self.edge(edge_id).copied() else {
                    continue;
                };
                self.tick_node(edge.from);
                if let Ok(source) = self.node(edge.from) {
                    let window = Self::output_window(source, edge.output);
                    if let Some(first_channel) = window.first() {
                        node.properties.accumulate_modulation(slot, first_channel);
                    }
                }
            }
        }
    }

    /// MUL then ADD, a-rate per-sample or scalar fast path.
    fn apply_post_gain(node: &mut NodeData, block_size: usize) {
        let NodeData {
            output_buffers,
            properties,
            ..
        } = node;

        if properties.needs_a_rate(slots::MUL) {
            for frame in 0..block_size {
                let mul = properties.float_at(slots::MUL, frame);
                for buffer in output_buffers.iter_mut() {
                    buffer[frame] *= mul;
                }
            }
        } else {
            let mul = properties.float(slots::MUL);
            if mul != 1.0 {
                for buffer in output_buffers.iter_mut() {
                    kernels::scalar_mul(buffer, mul);
                }
            }
        }

        if properties.needs_a_rate(slots::ADD) {
            for frame in 0..block_size {
                let add = properties.float_at(slots::ADD, frame);
                for buffer in output_buffers.iter_mut() {
                    buffer[frame] += add;
                }
            }
        } else {
            let add = properties.float(slots::ADD);
            if add != 0.0 {
                for buffer in output_buffers.iter_mut() {
                    kernels::scalar_add(buffer, add);
                }
            }
        }
    }

    // --- Events ---

    fn dispatch_events(&mut self) {
        let pending: Vec<(NodeId, u32)> = self.pending_events.drain(..).collect();
        for (node_id, slot) in pending {
            let handler = match self.node_mut(node_id) {
                Ok(data) => data.events.take_handler(slot),
                Err(_) => None,
            };
            if let Some(mut handler) = handler {
                handler(node_id);
                if let Ok(data) = self.node_mut(node_id) {
                    data.events.restore_handler(slot, handler);
                }
            }
        }
    }
}
