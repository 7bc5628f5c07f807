//! Connection registry.
//!
//! One [`RealtimeContext`] per process holds the transport client every
//! channel session shares, mirrors the client's connection-state
//! transitions, and carries the telemetry sinks. It is passed explicitly
//! into each session rather than reached through a global.

use crate::config::ClientConfig;
use crate::sink::Sinks;
use podium_core::ConnectionState;
use podium_transport::Realtime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Shared registry of the transport client and its observed state.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct RealtimeContext {
    inner: Arc<ContextInner>,
}

#[derive(Default)]
struct ContextInner {
    client: RwLock<Option<Arc<dyn Realtime>>>,
    connection_state: RwLock<Option<ConnectionState>>,
    metrics_enabled: AtomicBool,
    mirror: Mutex<Option<JoinHandle<()>>>,
    sinks: Sinks,
}

impl RealtimeContext {
    /// Create an empty registry with default sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given telemetry sinks.
    #[must_use]
    pub fn with_sinks(sinks: Sinks) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                sinks,
                ..ContextInner::default()
            }),
        }
    }

    /// Construct and install the transport client.
    ///
    /// Honors the config's init gate: when `should_init` is off, nothing
    /// is constructed. Otherwise the factory builds the client, the
    /// registry begins mirroring its connection-state transitions, and
    /// the publish-metrics flag is re-parsed. Re-initialization tears
    /// down the previous mirror before installing the new client, so a
    /// superseded client can no longer update the registry.
    ///
    /// Returns whether a client is present afterwards.
    ///
    /// Must be called from within a tokio runtime.
    pub fn initialize<F>(&self, config: &ClientConfig, build: F) -> bool
    where
        F: FnOnce(&ClientConfig) -> Arc<dyn Realtime>,
    {
        if !config.setup.should_init {
            return self.has_client();
        }

        let client = build(config);
        info!("Realtime client installed");

        self.inner
            .metrics_enabled
            .store(config.setup.metrics_enabled(), Ordering::SeqCst);

        // Snapshot the state the client already reached, then follow its
        // transitions.
        *self.inner.connection_state.write().unwrap() = Some(client.connection_state());

        let mut changes = client.state_changes();
        let shared = Arc::clone(&self.inner);
        let mirror = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        debug!(state = %change.current, "Mirroring connection state");
                        *shared.connection_state.write().unwrap() = Some(change.current);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Connection state stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.inner.mirror.lock().unwrap().replace(mirror) {
            previous.abort();
        }

        *self.inner.client.write().unwrap() = Some(client);
        true
    }

    /// The installed client, if any.
    #[must_use]
    pub fn client(&self) -> Option<Arc<dyn Realtime>> {
        self.inner.client.read().unwrap().clone()
    }

    /// Whether a client is installed.
    #[must_use]
    pub fn has_client(&self) -> bool {
        self.inner.client.read().unwrap().is_some()
    }

    /// The last mirrored connection state, absent until the client
    /// reports its first transition.
    #[must_use]
    pub fn connection_state(&self) -> Option<ConnectionState> {
        *self.inner.connection_state.read().unwrap()
    }

    /// Whether publish metrics are enabled.
    #[must_use]
    pub fn metrics_enabled(&self) -> bool {
        self.inner.metrics_enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn sinks(&self) -> &Sinks {
        &self.inner.sinks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupConfig;
    use podium_transport::MemoryRealtime;
    use std::time::Duration;

    fn config(should_init: bool, publish_metrics: Option<&str>) -> ClientConfig {
        ClientConfig {
            setup: SetupConfig {
                should_init,
                publish_metrics: publish_metrics.map(str::to_string),
            },
            ..ClientConfig::default()
        }
    }

    async fn wait_for_state(context: &RealtimeContext, expected: ConnectionState) {
        for _ in 0..500 {
            if context.connection_state() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("state {expected} never mirrored");
    }

    #[tokio::test]
    async fn test_init_gate_off_builds_nothing() {
        let context = RealtimeContext::new();
        let present = context.initialize(&config(false, None), |_| {
            panic!("factory must not run when the init gate is off")
        });
        assert!(!present);
        assert!(!context.has_client());
    }

    #[tokio::test]
    async fn test_initialize_installs_client_and_flag() {
        let context = RealtimeContext::new();
        let present = context.initialize(&config(true, Some("true")), |_| {
            Arc::new(MemoryRealtime::new("conn_a"))
        });

        assert!(present);
        assert!(context.has_client());
        assert!(context.metrics_enabled());
        assert_eq!(
            context.connection_state(),
            Some(ConnectionState::Connected)
        );
    }

    #[tokio::test]
    async fn test_state_transitions_are_mirrored_in_order() {
        let context = RealtimeContext::new();
        let client = Arc::new(MemoryRealtime::new("conn_a"));
        let handle = Arc::clone(&client);
        context.initialize(&config(true, None), move |_| handle);

        client.set_connection_state(ConnectionState::Disconnected, None);
        wait_for_state(&context, ConnectionState::Disconnected).await;

        client.set_connection_state(ConnectionState::Suspended, None);
        wait_for_state(&context, ConnectionState::Suspended).await;
    }

    #[tokio::test]
    async fn test_reinitialize_detaches_superseded_client() {
        let context = RealtimeContext::new();
        let first = Arc::new(MemoryRealtime::new("conn_first"));
        let handle = Arc::clone(&first);
        context.initialize(&config(true, Some("true")), move |_| handle);

        let second = Arc::new(MemoryRealtime::new("conn_second"));
        let handle = Arc::clone(&second);
        context.initialize(&config(true, Some("false")), move |_| handle);

        // The new client's flag parse wins.
        assert!(!context.metrics_enabled());

        // The superseded client can no longer move the registry.
        second.set_connection_state(ConnectionState::Connecting, None);
        wait_for_state(&context, ConnectionState::Connecting).await;
        first.set_connection_state(ConnectionState::Failed, None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            context.connection_state(),
            Some(ConnectionState::Connecting)
        );

        let installed = context.client().unwrap();
        assert_eq!(installed.connection_id().as_deref(), Some("conn_second"));
    }
}
