//! Telemetry sinks.
//!
//! Metric emission and exception reporting are external concerns; the
//! session layer only ever talks to these traits. The default
//! implementations forward to the `metrics` facade and to `tracing`, so
//! the host application picks the actual recorder/reporter.

use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Metric names.
pub mod names {
    /// Counter: one message operation completed against the transport.
    /// Tags: `message_type`, `channel`, `event_name`.
    pub const MESSAGES: &str = "podium_client_messages";

    /// Counter: transport errors that were swallowed but are worth
    /// watching. Tag: `code`.
    pub const IGNORED_ERRORS: &str = "podium_client_ignored_errors";
}

/// Feature tag attached to every reported failure from this layer.
pub const FEATURE_LIVE: &str = "live";

/// An application fault attributed to a feature area.
#[derive(Debug, Clone, Error)]
#[error("[{feature}] {message}")]
pub struct FeatureError {
    /// Owning feature area.
    pub feature: &'static str,
    /// What happened.
    pub message: String,
}

impl FeatureError {
    /// A fault in the realtime layer.
    #[must_use]
    pub fn live(message: impl Into<String>) -> Self {
        Self {
            feature: FEATURE_LIVE,
            message: message.into(),
        }
    }
}

/// Counter metric emission.
pub trait MetricSink: Send + Sync {
    /// Increment the named counter by one.
    fn count(&self, name: &'static str, tags: &[(&'static str, String)]);
}

/// Exception reporting.
pub trait ExceptionSink: Send + Sync {
    /// Forward a fault to the host's exception reporter.
    fn capture(&self, error: FeatureError);
}

/// Emits counters through the `metrics` facade; whatever recorder the
/// host installed receives them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeMetrics;

impl RuntimeMetrics {
    /// Register metric descriptions with the installed recorder.
    pub fn describe() {
        metrics::describe_counter!(
            names::MESSAGES,
            "Messages published or subscribed through the realtime layer"
        );
        metrics::describe_counter!(
            names::IGNORED_ERRORS,
            "Swallowed transport errors worth counting"
        );
    }
}

impl MetricSink for RuntimeMetrics {
    fn count(&self, name: &'static str, tags: &[(&'static str, String)]) {
        let labels: Vec<metrics::Label> = tags
            .iter()
            .map(|(key, value)| metrics::Label::new(*key, value.clone()))
            .collect();
        metrics::counter!(name, labels).increment(1);
    }
}

/// Reports faults as structured error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingExceptionSink;

impl ExceptionSink for TracingExceptionSink {
    fn capture(&self, err: FeatureError) {
        error!(feature = err.feature, "{}", err.message);
    }
}

/// The sink pair handed to every session.
#[derive(Clone)]
pub struct Sinks {
    pub metrics: Arc<dyn MetricSink>,
    pub exceptions: Arc<dyn ExceptionSink>,
}

impl Default for Sinks {
    fn default() -> Self {
        Self {
            metrics: Arc::new(RuntimeMetrics),
            exceptions: Arc::new(TracingExceptionSink),
        }
    }
}
