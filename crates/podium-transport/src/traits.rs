//! Seam traits to the managed realtime service.
//!
//! Podium never owns a socket. The host application hands it a client
//! implementing [`Realtime`], and Podium confines itself to reading
//! connection/channel states and error envelopes, publishing, and
//! registering listeners. Any managed pub/sub client can sit behind
//! these traits.

use async_trait::async_trait;
use podium_core::{ChannelOptions, ChannelState, ConnectionState, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// A failure reported by the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A transport-signaled error envelope. Only these are eligible for
    /// code-table classification.
    #[error(transparent)]
    Envelope(#[from] ErrorEnvelope),

    /// The channel is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// Anything not shaped like a transport error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// The error envelope, if this failure carries one.
    #[must_use]
    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            TransportError::Envelope(envelope) => Some(envelope),
            _ => None,
        }
    }
}

/// Identifier of one registered subscription on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// A message delivered on a channel.
///
/// Name and payload are optional because the transport may deliver bare
/// envelopes; the session layer drops those before they reach callbacks.
#[derive(Debug, Clone)]
pub struct LiveMessage {
    /// Event name.
    pub name: Option<String>,
    /// Opaque payload.
    pub data: Option<Value>,
    /// Connection id of the publisher, used for echo suppression.
    pub origin: Option<String>,
}

impl LiveMessage {
    /// Create a message with an event name and payload.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: Some(name.into()),
            data: Some(data),
            origin: None,
        }
    }

    /// Set the publishing connection id.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Presence transition kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    /// A member entered the channel.
    Enter,
    /// A member left the channel.
    Leave,
    /// A member updated its presence data.
    Update,
    /// A member was already present when the client attached.
    Present,
}

/// One member of a channel's presence set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMember {
    /// Connection id of the member.
    pub connection_id: String,
    /// Member-supplied state payload.
    pub data: Option<Value>,
}

/// A presence transition delivered to presence subscribers.
#[derive(Debug, Clone)]
pub struct PresenceMessage {
    pub action: PresenceAction,
    pub member: PresenceMember,
}

/// One connection-state transition.
#[derive(Debug, Clone)]
pub struct ConnectionStateChange {
    /// State before the transition, absent for the first one.
    pub previous: Option<ConnectionState>,
    /// State after the transition.
    pub current: ConnectionState,
    /// The error that caused the transition, if any.
    pub reason: Option<ErrorEnvelope>,
}

/// Callback invoked for each delivered channel message.
pub type MessageListener = Arc<dyn Fn(LiveMessage) + Send + Sync>;

/// Callback invoked for each presence transition.
pub type PresenceListener = Arc<dyn Fn(PresenceMessage) + Send + Sync>;

/// A managed realtime client.
///
/// State accessors are synchronous reads of the client's current view;
/// they are re-read at every gate evaluation rather than cached.
pub trait Realtime: Send + Sync {
    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// The connection's last error, if any.
    fn connection_error(&self) -> Option<ErrorEnvelope>;

    /// This client's connection id, once assigned.
    fn connection_id(&self) -> Option<String>;

    /// Get or create the channel with the given concrete name.
    fn channel(&self, name: &str) -> Arc<dyn RealtimeChannel>;

    /// Subscribe to connection-state transitions.
    ///
    /// Transitions are delivered in the order the transport emits them.
    fn state_changes(&self) -> broadcast::Receiver<ConnectionStateChange>;
}

/// One named channel on the realtime client.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// The concrete channel name.
    fn name(&self) -> &str;

    /// Current channel state.
    fn state(&self) -> ChannelState;

    /// Apply opaque channel options ahead of subscribing.
    fn set_options(&self, options: ChannelOptions);

    /// Publish one event.
    async fn publish(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Register a listener, optionally filtered to one event name.
    ///
    /// Attaches the channel if needed; the returned id tears the listener
    /// down via [`unsubscribe`](Self::unsubscribe).
    async fn subscribe(
        &self,
        event_filter: Option<&str>,
        listener: MessageListener,
    ) -> Result<SubscriptionId, TransportError>;

    /// Remove a previously registered listener. Unknown ids are a no-op.
    fn unsubscribe(&self, id: SubscriptionId);

    /// The channel's presence surface.
    fn presence(&self) -> &dyn PresenceOps;
}

/// Presence primitives of one channel.
#[async_trait]
pub trait PresenceOps: Send + Sync {
    /// Snapshot of the current presence set.
    async fn get(&self) -> Result<Vec<PresenceMember>, TransportError>;

    /// Enter the presence set with a state payload.
    async fn enter(&self, data: Value) -> Result<(), TransportError>;

    /// Update this client's presence payload.
    async fn update(&self, data: Value) -> Result<(), TransportError>;

    /// Leave the presence set.
    async fn leave(&self, data: Value) -> Result<(), TransportError>;

    /// Register a presence listener, optionally filtered to one action.
    async fn subscribe(
        &self,
        action: Option<PresenceAction>,
        listener: PresenceListener,
    ) -> Result<SubscriptionId, TransportError>;

    /// Remove all presence listeners registered by this client.
    fn unsubscribe(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_envelope_accessor() {
        let err = TransportError::from(ErrorEnvelope::new(80008, 503, "connection lost"));
        assert_eq!(err.envelope().map(|e| e.code), Some(80008));

        let other = TransportError::Other("listener panicked".into());
        assert!(other.envelope().is_none());
    }

    #[test]
    fn test_live_message_builder() {
        let msg = LiveMessage::new("result", serde_json::json!({"n": 1})).with_origin("conn_a");
        assert_eq!(msg.name.as_deref(), Some("result"));
        assert_eq!(msg.origin.as_deref(), Some("conn_a"));
    }
}
