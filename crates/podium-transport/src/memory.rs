//! In-memory realtime double.
//!
//! A loopback implementation of the seam traits with settable connection
//! and channel states and failure injection. It backs podium-client's
//! tests and local demos; it is not a network transport.

use crate::traits::{
    ConnectionStateChange, LiveMessage, MessageListener, PresenceAction, PresenceListener,
    PresenceMember, PresenceMessage, PresenceOps, Realtime, RealtimeChannel, SubscriptionId,
    TransportError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use podium_core::{ChannelOptions, ChannelState, ConnectionState, ErrorEnvelope};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

const STATE_CHANGE_CAPACITY: usize = 64;

/// An in-memory realtime client.
pub struct MemoryRealtime {
    connection_id: String,
    connection_state: RwLock<ConnectionState>,
    connection_error: RwLock<Option<ErrorEnvelope>>,
    channels: DashMap<String, Arc<MemoryChannel>>,
    state_tx: broadcast::Sender<ConnectionStateChange>,
    subscription_ids: Arc<AtomicU64>,
}

impl MemoryRealtime {
    /// Create a client with the given connection id, starting connected.
    #[must_use]
    pub fn new(connection_id: impl Into<String>) -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANGE_CAPACITY);
        Self {
            connection_id: connection_id.into(),
            connection_state: RwLock::new(ConnectionState::Connected),
            connection_error: RwLock::new(None),
            channels: DashMap::new(),
            state_tx,
            subscription_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Move the connection to a new state, broadcasting the transition.
    pub fn set_connection_state(&self, state: ConnectionState, reason: Option<ErrorEnvelope>) {
        let previous = {
            let mut current = self.connection_state.write().unwrap();
            let previous = *current;
            *current = state;
            previous
        };
        *self.connection_error.write().unwrap() = reason.clone();

        debug!(from = %previous, to = %state, "Connection state changed");
        let _ = self.state_tx.send(ConnectionStateChange {
            previous: Some(previous),
            current: state,
            reason,
        });
    }

    /// Typed accessor for a channel, for tests that need the double's
    /// control surface.
    #[must_use]
    pub fn memory_channel(&self, name: &str) -> Arc<MemoryChannel> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryChannel::new(
                    name,
                    self.connection_id.clone(),
                    Arc::clone(&self.subscription_ids),
                ))
            })
            .clone()
    }
}

impl Realtime for MemoryRealtime {
    fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().unwrap()
    }

    fn connection_error(&self) -> Option<ErrorEnvelope> {
        self.connection_error.read().unwrap().clone()
    }

    fn connection_id(&self) -> Option<String> {
        Some(self.connection_id.clone())
    }

    fn channel(&self, name: &str) -> Arc<dyn RealtimeChannel> {
        self.memory_channel(name)
    }

    fn state_changes(&self) -> broadcast::Receiver<ConnectionStateChange> {
        self.state_tx.subscribe()
    }
}

struct MessageEntry {
    id: SubscriptionId,
    filter: Option<String>,
    listener: MessageListener,
}

struct PresenceEntry {
    filter: Option<PresenceAction>,
    listener: PresenceListener,
}

/// One in-memory channel.
pub struct MemoryChannel {
    name: String,
    local_origin: String,
    state: RwLock<ChannelState>,
    options: RwLock<Option<ChannelOptions>>,
    listeners: RwLock<Vec<MessageEntry>>,
    members: RwLock<HashMap<String, PresenceMember>>,
    presence_listeners: RwLock<Vec<PresenceEntry>>,
    fail_next: Mutex<Option<TransportError>>,
    subscription_ids: Arc<AtomicU64>,
}

impl MemoryChannel {
    fn new(
        name: impl Into<String>,
        local_origin: String,
        subscription_ids: Arc<AtomicU64>,
    ) -> Self {
        Self {
            name: name.into(),
            local_origin,
            state: RwLock::new(ChannelState::Initialized),
            options: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
            members: RwLock::new(HashMap::new()),
            presence_listeners: RwLock::new(Vec::new()),
            fail_next: Mutex::new(None),
            subscription_ids,
        }
    }

    /// Move the channel to a new state.
    pub fn set_state(&self, state: ChannelState) {
        *self.state.write().unwrap() = state;
    }

    /// Make the next fallible operation on this channel return `error`.
    pub fn fail_next(&self, error: TransportError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Deliver a message to matching listeners, as if the service pushed
    /// it. Tests use this to simulate messages from other connections.
    pub fn deliver(&self, message: LiveMessage) {
        let matching: Vec<MessageListener> = {
            let listeners = self.listeners.read().unwrap();
            listeners
                .iter()
                .filter(|entry| match (&entry.filter, &message.name) {
                    (Some(filter), Some(name)) => filter == name,
                    (Some(_), None) => false,
                    (None, _) => true,
                })
                .map(|entry| Arc::clone(&entry.listener))
                .collect()
        };

        trace!(channel = %self.name, recipients = matching.len(), "Delivering message");
        for listener in matching {
            listener(message.clone());
        }
    }

    /// Insert a presence member directly, as if a remote client entered.
    pub fn seed_member(&self, connection_id: impl Into<String>, data: Option<Value>) {
        let connection_id = connection_id.into();
        self.members.write().unwrap().insert(
            connection_id.clone(),
            PresenceMember {
                connection_id,
                data,
            },
        );
    }

    /// The options applied via `set_options`, if any.
    #[must_use]
    pub fn applied_options(&self) -> Option<ChannelOptions> {
        self.options.read().unwrap().clone()
    }

    /// Number of registered message listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap().len()
    }

    fn take_failure(&self) -> Option<TransportError> {
        self.fail_next.lock().unwrap().take()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.subscription_ids.fetch_add(1, Ordering::Relaxed))
    }

    fn fire_presence(&self, action: PresenceAction, member: PresenceMember) {
        let matching: Vec<PresenceListener> = {
            let listeners = self.presence_listeners.read().unwrap();
            listeners
                .iter()
                .filter(|entry| entry.filter.is_none() || entry.filter == Some(action))
                .map(|entry| Arc::clone(&entry.listener))
                .collect()
        };

        for listener in matching {
            listener(PresenceMessage {
                action,
                member: member.clone(),
            });
        }
    }
}

#[async_trait]
impl RealtimeChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ChannelState {
        *self.state.read().unwrap()
    }

    fn set_options(&self, options: ChannelOptions) {
        *self.options.write().unwrap() = Some(options);
    }

    async fn publish(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        self.deliver(LiveMessage::new(event, payload).with_origin(self.local_origin.clone()));
        Ok(())
    }

    async fn subscribe(
        &self,
        event_filter: Option<&str>,
        listener: MessageListener,
    ) -> Result<SubscriptionId, TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        // Implicit attach, like a real client.
        {
            let mut state = self.state.write().unwrap();
            if matches!(*state, ChannelState::Initialized | ChannelState::Detached) {
                *state = ChannelState::Attached;
            }
        }

        let id = self.next_id();
        self.listeners.write().unwrap().push(MessageEntry {
            id,
            filter: event_filter.map(str::to_string),
            listener,
        });
        debug!(channel = %self.name, subscription = %id, "Listener registered");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut listeners = self.listeners.write().unwrap();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        if listeners.len() < before {
            debug!(channel = %self.name, subscription = %id, "Listener removed");
        }
    }

    fn presence(&self) -> &dyn PresenceOps {
        self
    }
}

#[async_trait]
impl PresenceOps for MemoryChannel {
    async fn get(&self) -> Result<Vec<PresenceMember>, TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(self.members.read().unwrap().values().cloned().collect())
    }

    async fn enter(&self, data: Value) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let member = PresenceMember {
            connection_id: self.local_origin.clone(),
            data: Some(data),
        };
        self.members
            .write()
            .unwrap()
            .insert(self.local_origin.clone(), member.clone());
        self.fire_presence(PresenceAction::Enter, member);
        Ok(())
    }

    async fn update(&self, data: Value) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let member = PresenceMember {
            connection_id: self.local_origin.clone(),
            data: Some(data),
        };
        self.members
            .write()
            .unwrap()
            .insert(self.local_origin.clone(), member.clone());
        self.fire_presence(PresenceAction::Update, member);
        Ok(())
    }

    async fn leave(&self, _data: Value) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let removed = self.members.write().unwrap().remove(&self.local_origin);
        if let Some(member) = removed {
            self.fire_presence(PresenceAction::Leave, member);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        action: Option<PresenceAction>,
        listener: PresenceListener,
    ) -> Result<SubscriptionId, TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.presence_listeners.write().unwrap().push(PresenceEntry {
            filter: action,
            listener,
        });
        Ok(self.next_id())
    }

    fn unsubscribe(&self) {
        self.presence_listeners.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_publish_reaches_filtered_listeners() {
        let client = MemoryRealtime::new("conn_local");
        let channel = client.memory_channel("series_v3_s1");

        let hits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&hits);
        RealtimeChannel::subscribe(
            channel.as_ref(),
            Some("result"),
            Arc::new(move |_msg| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

        channel.publish("result", json!({"n": 1})).await.unwrap();
        channel.publish("comment", json!({"text": "hi"})).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribe_attaches_channel() {
        let client = MemoryRealtime::new("conn_local");
        let channel = client.memory_channel("series_public:vk");
        assert_eq!(channel.state(), ChannelState::Initialized);

        RealtimeChannel::subscribe(channel.as_ref(), None, Arc::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(channel.state(), ChannelState::Attached);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_listener() {
        let client = MemoryRealtime::new("conn_local");
        let channel = client.memory_channel("series_v3_s1");

        let id = RealtimeChannel::subscribe(channel.as_ref(), None, Arc::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(channel.listener_count(), 1);

        RealtimeChannel::unsubscribe(channel.as_ref(), id);
        assert_eq!(channel.listener_count(), 0);

        // Unknown ids are a no-op.
        RealtimeChannel::unsubscribe(channel.as_ref(), id);
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let client = MemoryRealtime::new("conn_local");
        let channel = client.memory_channel("series_v3_s1");

        channel.fail_next(TransportError::from(ErrorEnvelope::new(90001, 500, "boom")));
        assert!(channel.publish("result", json!({})).await.is_err());
        assert!(channel.publish("result", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_state_change_broadcast() {
        let client = MemoryRealtime::new("conn_local");
        let mut changes = client.state_changes();

        client.set_connection_state(ConnectionState::Suspended, None);

        let change = changes.recv().await.unwrap();
        assert_eq!(change.previous, Some(ConnectionState::Connected));
        assert_eq!(change.current, ConnectionState::Suspended);
    }

    #[tokio::test]
    async fn test_presence_flow() {
        let client = MemoryRealtime::new("conn_local");
        let channel = client.memory_channel("series_v3_s1");
        channel.seed_member("conn_remote", Some(json!({"name": "Remote"})));

        let actions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&actions);
        PresenceOps::subscribe(
            channel.as_ref(),
            None,
            Arc::new(move |msg: PresenceMessage| {
                seen.lock().unwrap().push(msg.action);
            }),
        )
        .await
        .unwrap();

        channel.presence().enter(json!({"name": "Local"})).await.unwrap();
        channel.presence().update(json!({"name": "Local*"})).await.unwrap();

        let members = channel.presence().get().await.unwrap();
        assert_eq!(members.len(), 2);

        channel.presence().leave(json!(null)).await.unwrap();
        assert_eq!(channel.presence().get().await.unwrap().len(), 1);

        assert_eq!(
            *actions.lock().unwrap(),
            vec![
                PresenceAction::Enter,
                PresenceAction::Update,
                PresenceAction::Leave
            ]
        );
    }
}
