//! Channel sessions.
//!
//! A [`ChannelSession`] binds one resolved channel and composes the
//! addressing, gating, and classification logic around the transport's
//! publish, subscribe, and presence primitives. Callers get a small
//! promise: configuration mistakes fail fast, transport trouble is
//! absorbed into telemetry, and a gated-off operation quietly resolves
//! as a no-op.

use crate::context::RealtimeContext;
use crate::sink::{names, FeatureError};
use podium_core::{
    classify, should_skip, ChannelDescriptor, ChannelState, ConnectionState, Disposition,
    ErrorContext, EventKind, GateInput, OperationKind,
};
use podium_transport::{
    LiveMessage, MessageListener, PresenceAction, PresenceMember, PresenceMessage, Realtime,
    RealtimeChannel, SubscriptionId, TransportError,
};
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, trace};

/// Configuration and wiring errors. These indicate incorrect host
/// wiring and are never absorbed.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection registry was never initialized.
    #[error("no realtime client; initialize the registry before opening sessions")]
    ClientMissing,

    /// No channel descriptor, so no channel name to address.
    #[error("channel name could not be resolved")]
    ChannelUnresolved,

    /// The event's family does not ride on this session's channel.
    #[error("event '{event}' does not belong to the '{channel}' channel family")]
    EventFamilyMismatch {
        event: &'static str,
        channel: &'static str,
    },
}

/// Result of a gated, absorbed channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome<T> {
    /// The transport call ran to completion.
    Completed(T),
    /// The gate decided the attempt was meaningless; nothing was sent.
    Skipped,
    /// The transport reported a failure that was classified and
    /// swallowed into telemetry.
    Absorbed,
}

impl<T> OpOutcome<T> {
    /// The completed value, if the operation ran.
    pub fn completed(self) -> Option<T> {
        match self {
            OpOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the gate skipped the operation.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, OpOutcome::Skipped)
    }

    /// Whether a transport failure was absorbed.
    #[must_use]
    pub fn is_absorbed(&self) -> bool {
        matches!(self, OpOutcome::Absorbed)
    }
}

/// Everything that, when changed, requires a fresh transport
/// subscription. Callback identity is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SubscriptionKey {
    event: Option<String>,
    echo_messages: bool,
    connection_state: Option<ConnectionState>,
    /// Pointer identity of the installed client; a replaced client
    /// invalidates subscriptions made against its predecessor.
    client: usize,
}

#[derive(Default)]
enum SubscriptionSlot {
    #[default]
    Idle,
    Active {
        id: SubscriptionId,
        key: SubscriptionKey,
        channel: Arc<dyn RealtimeChannel>,
    },
}

type CallbackSlot = Arc<RwLock<Option<MessageListener>>>;

/// A stateful facade over one concrete channel.
///
/// Dropping the session tears down whatever subscription it holds.
pub struct ChannelSession {
    context: RealtimeContext,
    descriptor: ChannelDescriptor,
    channel_name: String,
    callback: CallbackSlot,
    subscription: Mutex<SubscriptionSlot>,
}

impl ChannelSession {
    /// Open a session for a descriptor.
    ///
    /// # Errors
    ///
    /// Fails fast with [`SessionError::ClientMissing`] when the registry
    /// has no client: that is host wiring, not transport weather.
    pub fn open(
        context: RealtimeContext,
        descriptor: ChannelDescriptor,
    ) -> Result<Self, SessionError> {
        if !context.has_client() {
            return Err(SessionError::ClientMissing);
        }
        let channel_name = descriptor.channel_name();
        debug!(channel = %channel_name, "Channel session opened");
        Ok(Self {
            context,
            descriptor,
            channel_name,
            callback: Arc::new(RwLock::new(None)),
            subscription: Mutex::new(SubscriptionSlot::Idle),
        })
    }

    /// Open a session for a descriptor that may be absent. Absence is a
    /// configuration error, not a transport failure.
    ///
    /// # Errors
    ///
    /// [`SessionError::ChannelUnresolved`] when the descriptor is
    /// `None`, otherwise as [`open`](Self::open).
    pub fn open_optional(
        context: RealtimeContext,
        descriptor: Option<ChannelDescriptor>,
    ) -> Result<Self, SessionError> {
        let descriptor = descriptor.ok_or(SessionError::ChannelUnresolved)?;
        Self::open(context, descriptor)
    }

    /// The concrete channel name this session addresses.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// The descriptor this session was opened with.
    #[must_use]
    pub fn descriptor(&self) -> &ChannelDescriptor {
        &self.descriptor
    }

    /// Publish one event.
    ///
    /// Gate-checked; a skipped publish resolves as
    /// [`OpOutcome::Skipped`]. On transport success, one `messages`
    /// counter is emitted when publish metrics are enabled. Transport
    /// failures are classified and absorbed.
    ///
    /// # Errors
    ///
    /// Only configuration errors: a missing client or an event from the
    /// wrong family.
    pub async fn publish(
        &self,
        event: impl Into<EventKind>,
        payload: Value,
    ) -> Result<OpOutcome<()>, SessionError> {
        let event = event.into();
        self.check_family(event)?;
        let client = self.client()?;
        let channel = client.channel(&self.channel_name);

        if self.gated(&client, channel.as_ref(), OperationKind::Publish) {
            return Ok(OpOutcome::Skipped);
        }

        match channel.publish(event.as_str(), payload).await {
            Ok(()) => {
                if self.context.metrics_enabled() {
                    self.context.sinks().metrics.count(
                        names::MESSAGES,
                        &[
                            ("message_type", "publish".to_string()),
                            (
                                "channel",
                                self.descriptor.template.display_name().to_string(),
                            ),
                            ("event_name", event.as_str().to_string()),
                        ],
                    );
                }
                Ok(OpOutcome::Completed(()))
            }
            Err(error) => {
                self.absorb(
                    &error,
                    OperationKind::Publish,
                    Some(channel.state()),
                    Some(client.connection_state()),
                );
                Ok(OpOutcome::Absorbed)
            }
        }
    }

    /// Establish (or refresh) the message subscription.
    ///
    /// Idempotent: the callback slot is always updated, but the
    /// transport subscription is only re-established when the event
    /// filter, echo setting, observed connection state, or installed
    /// client changes. While the observed connection state is `closed`,
    /// or the descriptor opted out of subscribing, no attempt is made.
    ///
    /// # Errors
    ///
    /// Only configuration errors: a missing client or a filter event
    /// from the wrong family.
    pub async fn subscribe<F>(
        &self,
        filter: Option<EventKind>,
        callback: F,
    ) -> Result<(), SessionError>
    where
        F: Fn(LiveMessage) + Send + Sync + 'static,
    {
        if let Some(event) = filter {
            self.check_family(event)?;
        }

        // Callback churn never touches the network.
        *self.callback.write().unwrap() = Some(Arc::new(callback));

        if !self.descriptor.should_subscribe {
            return Ok(());
        }

        let client = self.client()?;

        if self.context.connection_state() == Some(ConnectionState::Closed) {
            return Ok(());
        }

        let key = SubscriptionKey {
            event: filter.map(|event| event.as_str().to_string()),
            echo_messages: self.descriptor.options.echo_messages,
            connection_state: self.context.connection_state(),
            client: Arc::as_ptr(&client).cast::<()>() as usize,
        };

        {
            let slot = self.subscription.lock().unwrap();
            if let SubscriptionSlot::Active { key: active, .. } = &*slot {
                if *active == key {
                    return Ok(());
                }
            }
        }

        // Inputs changed: whatever was registered comes down first.
        self.unsubscribe();

        let channel = client.channel(&self.channel_name);
        if let Some(options) = &self.descriptor.transport_options {
            channel.set_options(options.clone());
        }

        if self.gated(&client, channel.as_ref(), OperationKind::Subscribe) {
            return Ok(());
        }

        let listener = self.delivery_listener(Arc::clone(&client));
        match channel.subscribe(key.event.as_deref(), listener).await {
            Ok(id) => {
                trace!(channel = %self.channel_name, subscription = %id, "Subscribed");
                *self.subscription.lock().unwrap() = SubscriptionSlot::Active { id, key, channel };
            }
            Err(error) => {
                self.absorb(
                    &error,
                    OperationKind::Subscribe,
                    Some(channel.state()),
                    Some(client.connection_state()),
                );
            }
        }
        Ok(())
    }

    /// Tear down the subscription, if any. Safe to call repeatedly and
    /// before any subscribe completed; also runs on drop.
    pub fn unsubscribe(&self) {
        let slot = std::mem::take(&mut *self.subscription.lock().unwrap());
        if let SubscriptionSlot::Active { id, channel, .. } = slot {
            trace!(channel = %self.channel_name, subscription = %id, "Unsubscribed");
            channel.unsubscribe(id);
        }
    }

    /// Snapshot of the channel's presence set.
    ///
    /// # Errors
    ///
    /// Only configuration errors.
    pub async fn presence_get(&self) -> Result<OpOutcome<Vec<PresenceMember>>, SessionError> {
        self.run_presence(OperationKind::PresenceGet, |channel| async move {
            channel.presence().get().await
        })
        .await
    }

    /// Enter the presence set with a state payload.
    ///
    /// # Errors
    ///
    /// Only configuration errors.
    pub async fn presence_enter(&self, data: Value) -> Result<OpOutcome<()>, SessionError> {
        self.run_presence(OperationKind::PresenceEnter, |channel| async move {
            channel.presence().enter(data).await
        })
        .await
    }

    /// Update this client's presence payload.
    ///
    /// # Errors
    ///
    /// Only configuration errors.
    pub async fn presence_update(&self, data: Value) -> Result<OpOutcome<()>, SessionError> {
        self.run_presence(OperationKind::PresenceUpdate, |channel| async move {
            channel.presence().update(data).await
        })
        .await
    }

    /// Leave the presence set.
    ///
    /// # Errors
    ///
    /// Only configuration errors.
    pub async fn presence_leave(&self, data: Value) -> Result<OpOutcome<()>, SessionError> {
        self.run_presence(OperationKind::PresenceLeave, |channel| async move {
            channel.presence().leave(data).await
        })
        .await
    }

    /// Register a presence listener, optionally filtered to one action.
    ///
    /// # Errors
    ///
    /// Only configuration errors.
    pub async fn presence_subscribe<F>(
        &self,
        action: Option<PresenceAction>,
        listener: F,
    ) -> Result<OpOutcome<()>, SessionError>
    where
        F: Fn(PresenceMessage) + Send + Sync + 'static,
    {
        let listener: Arc<dyn Fn(PresenceMessage) + Send + Sync> = Arc::new(listener);
        self.run_presence(OperationKind::PresenceSubscribe, |channel| async move {
            channel
                .presence()
                .subscribe(action, listener)
                .await
                .map(|_id| ())
        })
        .await
    }

    /// Remove this client's presence listeners.
    ///
    /// # Errors
    ///
    /// Only configuration errors.
    pub async fn presence_unsubscribe(&self) -> Result<OpOutcome<()>, SessionError> {
        self.run_presence(OperationKind::PresenceUnsubscribe, |channel| async move {
            channel.presence().unsubscribe();
            Ok(())
        })
        .await
    }

    async fn run_presence<T, F, Fut>(
        &self,
        operation: OperationKind,
        call: F,
    ) -> Result<OpOutcome<T>, SessionError>
    where
        F: FnOnce(Arc<dyn RealtimeChannel>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let client = self.client()?;
        let channel = client.channel(&self.channel_name);

        if self.gated(&client, channel.as_ref(), operation) {
            return Ok(OpOutcome::Skipped);
        }

        let channel_state = channel.state();
        match call(channel).await {
            Ok(value) => Ok(OpOutcome::Completed(value)),
            Err(error) => {
                self.absorb(
                    &error,
                    operation,
                    Some(channel_state),
                    Some(client.connection_state()),
                );
                Ok(OpOutcome::Absorbed)
            }
        }
    }

    fn client(&self) -> Result<Arc<dyn Realtime>, SessionError> {
        self.context.client().ok_or(SessionError::ClientMissing)
    }

    fn check_family(&self, event: EventKind) -> Result<(), SessionError> {
        if event.template() == self.descriptor.template {
            Ok(())
        } else {
            Err(SessionError::EventFamilyMismatch {
                event: event.as_str(),
                channel: self.descriptor.template.display_name(),
            })
        }
    }

    /// Gate one operation against the states read at call time.
    fn gated(
        &self,
        client: &Arc<dyn Realtime>,
        channel: &dyn RealtimeChannel,
        operation: OperationKind,
    ) -> bool {
        let error_reason = client.connection_error();
        should_skip(&GateInput {
            channel_state: channel.state(),
            connection_state: client.connection_state(),
            operation,
            error_reason: error_reason.as_ref(),
        })
    }

    /// Build the listener handed to the transport: echo suppression,
    /// bare-envelope filtering, and panic isolation around the
    /// application callback.
    fn delivery_listener(&self, client: Arc<dyn Realtime>) -> MessageListener {
        let slot = Arc::clone(&self.callback);
        let echo_messages = self.descriptor.options.echo_messages;
        let exceptions = Arc::clone(&self.context.sinks().exceptions);

        Arc::new(move |message: LiveMessage| {
            // Our own publish coming back: only wanted with echo on.
            if !echo_messages
                && message.origin.is_some()
                && message.origin == client.connection_id()
            {
                return;
            }
            // Without a name or payload there is nothing to hand over.
            if message.name.is_none() || message.data.is_none() {
                return;
            }
            let Some(callback) = slot.read().unwrap().clone() else {
                return;
            };
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(message))) {
                exceptions.capture(FeatureError::live(panic_message(panic.as_ref())));
            }
        })
    }

    /// Route a transport failure through the classifier and act on the
    /// disposition. Never propagates.
    fn absorb(
        &self,
        error: &TransportError,
        operation: OperationKind,
        channel_state: Option<ChannelState>,
        connection_state: Option<ConnectionState>,
    ) {
        let ctx = ErrorContext {
            operation,
            channel_state,
            connection_state,
        };
        match classify(error.envelope(), &ctx) {
            Disposition::Ignore => {
                trace!(operation = %operation, %error, "Ignoring recoverable transport error");
            }
            Disposition::IgnoreWithMetric(code) => {
                debug!(operation = %operation, code, "Counting ignored transport error");
                self.context
                    .sinks()
                    .metrics
                    .count(names::IGNORED_ERRORS, &[("code", code.to_string())]);
            }
            Disposition::Report => {
                self.context
                    .sinks()
                    .exceptions
                    .capture(FeatureError::live(error.to_string()));
            }
        }
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "subscriber callback panicked".to_string()
    }
}
