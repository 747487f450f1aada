//! Resona Engine - node graph engine for the resona synthesis engine
//!
//! The engine executes a directed acyclic graph of audio nodes block by
//! block at a fixed sample rate and block size:
//!
//! - [`Server`] owns the graph, the block clock, and the final output
//!   connection; [`Server::produce_block`] pulls one block.
//! - [`Processor`] is the per-kind behavior a node plugs into the engine;
//!   the engine supplies buffers, fan-in summation with channel adaptation,
//!   the property store, and the MUL/ADD post-pass.
//! - [`PropertyStore`] holds each node's typed parameters, evaluated
//!   k-rate (one scalar per block) or a-rate (per sample, when ramped or
//!   audio-modulated).
//! - Subgraph nodes ([`Server::add_subgraph`]) wrap a sub-DAG behind a
//!   single node, with forwarded properties
//!   ([`Server::forward_property`]) exposing inner parameters.
//!
//! # Example
//!
//! ```rust
//! use resona_engine::{NodeSpec, ProcessContext, Processor, Server};
//!
//! struct Noise;
//!
//! impl Processor for Noise {
//!     fn spec(&self) -> NodeSpec {
//!         NodeSpec::new("noise").buffers(0, 1).output_connection(0, 1)
//!     }
//!     fn process(&mut self, ctx: ProcessContext<'_>) {
//!         for sample in ctx.outputs[0].iter_mut() {
//!             *sample = 0.25;
//!         }
//!     }
//! }
//!
//! let server = Server::new(44100.0, 128);
//! let noise = server.add_node(Box::new(Noise));
//! server.connect_server(noise, 0).unwrap();
//!
//! let mut block = vec![0.0f32; 128 * 2];
//! server.produce_block(&mut block).unwrap();
//! ```

pub mod buffer;
pub mod connection;
pub mod error;
pub mod event;
pub mod mix;
pub mod node;
pub mod property;
pub mod server;

pub use buffer::AudioBuffer;
pub use connection::EdgeId;
pub use error::{Error, Result};
pub use event::{EventHandler, EventQueue, STATE_CHANGED};
pub use node::{
    slots, EndpointSpec, NodeId, NodeSpec, NodeState, ProcessContext, Processor,
};
pub use property::{Property, PropertyDescriptor, PropertyStore, PropertyType, PropertyValue};
pub use server::{OutputDevice, Server};
