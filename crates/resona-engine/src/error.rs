//! Error types for graph and property operations.
//!
//! Every fallible engine operation either succeeds and mutates, or fails
//! with exactly one of these kinds and leaves all state unchanged. Errors
//! are reported synchronously to the caller; nothing inside block
//! processing can fail.

/// Error kinds raised by engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A property was accessed through an accessor of the wrong type.
    #[error("property type mismatch")]
    TypeMismatch,

    /// A slot, endpoint, or array index was out of bounds.
    #[error("slot or index out of range")]
    Range,

    /// A write was attempted on a read-only property.
    #[error("property is read only")]
    PropertyReadOnly,

    /// The target property does not accept audio-rate modulation.
    #[error("property has no modulation input")]
    CannotConnectToProperty,

    /// The requested connection would make the graph cyclic.
    #[error("connection would create a cycle")]
    CausesCycle,

    /// The node handle does not refer to a live node.
    #[error("invalid node handle")]
    InvalidHandle,

    /// An engine invariant was violated (e.g. a forwarded property whose
    /// target node is gone). The host should treat this as a bug.
    #[error("internal invariant violation")]
    Internal,
}

pub type Result<T> = core::result::Result<T, Error>;
