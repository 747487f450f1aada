//! Node event slots.
//!
//! Events are named callback slots on a node, declared by the node kind
//! (plus the engine-provided `state_changed` slot on every node). Nodes
//! fire them synchronously during a tick; the server dispatches registered
//! handlers under its lock once the operation that fired them completes.
//!
//! Handlers run under the server lock and therefore must return promptly
//! and must not call back into the server.

use std::collections::BTreeMap;

use crate::NodeId;

/// Callback signature for node events.
pub type EventHandler = Box<dyn FnMut(NodeId) + Send>;

/// Event slot fired when a node's `STATE` property changes value.
pub const STATE_CHANGED: u32 = 0;

pub(crate) struct EventSlot {
    pub name: &'static str,
    pub handler: Option<EventHandler>,
}

/// The per-node event slot table.
#[derive(Default)]
pub(crate) struct EventTable {
    slots: BTreeMap<u32, EventSlot>,
}

impl EventTable {
    pub fn declare(&mut self, slot: u32, name: &'static str) {
        self.slots.entry(slot).or_insert(EventSlot { name, handler: None });
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.slots.contains_key(&slot)
    }

    pub fn name(&self, slot: u32) -> Option<&'static str> {
        self.slots.get(&slot).map(|s| s.name)
    }

    pub fn set_handler(&mut self, slot: u32, handler: Option<EventHandler>) -> bool {
        match self.slots.get_mut(&slot) {
            Some(event) => {
                event.handler = handler;
                true
            }
            None => false,
        }
    }

    pub fn take_handler(&mut self, slot: u32) -> Option<EventHandler> {
        self.slots.get_mut(&slot).and_then(|s| s.handler.take())
    }

    pub fn restore_handler(&mut self, slot: u32, handler: EventHandler) {
        if let Some(event) = self.slots.get_mut(&slot) {
            if event.handler.is_none() {
                event.handler = Some(handler);
            }
        }
    }
}

/// Collects event fires from a node's `process()` for dispatch after the
/// tick completes.
#[derive(Default)]
pub struct EventQueue {
    pending: Vec<u32>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fire the event slot. The handler runs after this tick, under the
    /// server lock.
    pub fn fire(&mut self, slot: u32) {
        self.pending.push(slot);
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = u32> + '_ {
        self.pending.drain(..)
    }
}
