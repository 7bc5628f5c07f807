//! # podium-transport
//!
//! Transport seam for the Podium realtime layer.
//!
//! Podium treats the managed realtime service as an external
//! collaborator. This crate defines the traits that collaborator must
//! implement — [`Realtime`], [`RealtimeChannel`], [`PresenceOps`] — and
//! the envelope types exchanged across the seam. Connection management,
//! sockets, and the auth handshake all live behind these traits.
//!
//! The [`memory`] module provides an in-process double with controllable
//! states and failure injection, used by podium-client's tests.

pub mod memory;
pub mod traits;

pub use memory::{MemoryChannel, MemoryRealtime};
pub use traits::{
    ConnectionStateChange, LiveMessage, MessageListener, PresenceAction, PresenceListener,
    PresenceMember, PresenceMessage, PresenceOps, Realtime, RealtimeChannel, SubscriptionId,
    TransportError,
};
