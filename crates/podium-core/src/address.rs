//! Channel addressing.
//!
//! Callers never name transport channels directly. They hold a
//! [`ChannelDescriptor`] pairing a template with a substitution value,
//! and addressing turns that into the concrete channel name. The reverse
//! direction (display names with placeholders stripped) exists only for
//! metric tags, never for transport addressing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Addressing errors. These are programming errors in the host
/// application, not transport failures.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The pattern does not match any known channel template.
    #[error("unrecognized channel template: {0}")]
    UnknownTemplate(String),
}

/// The fixed set of channel templates. Each pattern contains exactly one
/// placeholder token substituted at resolve time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTemplate {
    /// Presenter/collaborator communication, keyed by series id.
    SeriesPrivate,
    /// Presenter/collaborator/voter communication, keyed by vote key.
    PresentationState,
}

impl ChannelTemplate {
    /// The template pattern with its placeholder token.
    #[must_use]
    pub const fn pattern(&self) -> &'static str {
        match self {
            ChannelTemplate::SeriesPrivate => "series_v3_{series_id}",
            ChannelTemplate::PresentationState => "series_public:{vote_key}",
        }
    }

    /// The placeholder token inside [`pattern`](Self::pattern).
    #[must_use]
    pub const fn placeholder(&self) -> &'static str {
        match self {
            ChannelTemplate::SeriesPrivate => "{series_id}",
            ChannelTemplate::PresentationState => "{vote_key}",
        }
    }

    /// The pattern with its placeholder stripped. Used only for metric
    /// tags; distinct across templates so a metric always identifies
    /// which channel family an event came from.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            ChannelTemplate::SeriesPrivate => "series_v3_",
            ChannelTemplate::PresentationState => "series_public:",
        }
    }

    /// Look a template up by its pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::UnknownTemplate`] for any pattern outside
    /// the fixed set.
    pub fn from_pattern(pattern: &str) -> Result<Self, AddressError> {
        match pattern {
            p if p == ChannelTemplate::SeriesPrivate.pattern() => Ok(ChannelTemplate::SeriesPrivate),
            p if p == ChannelTemplate::PresentationState.pattern() => {
                Ok(ChannelTemplate::PresentationState)
            }
            other => Err(AddressError::UnknownTemplate(other.to_string())),
        }
    }

    /// Substitute a value into the template's placeholder.
    #[must_use]
    pub fn resolve_with(&self, value: &str) -> String {
        self.pattern().replacen(self.placeholder(), value, 1)
    }
}

/// Opaque per-channel transport options, forwarded verbatim to the
/// transport when a channel is set up. Podium never inspects these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOptions {
    /// Transport-defined parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Message delivery options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Deliver a client's own publishes back to it. Off by default:
    /// a sender normally must not observe its own publish as an
    /// inbound event.
    pub echo_messages: bool,
}

/// An abstract channel identity: template plus substitution value, with
/// the options the session layer needs. Immutable per use; the same
/// descriptor always resolves to the same concrete channel name.
#[derive(Debug, Clone)]
pub struct ChannelDescriptor {
    /// Which template the channel belongs to.
    pub template: ChannelTemplate,
    /// The value substituted into the template's placeholder.
    pub value: String,
    /// Delivery options.
    pub options: DeliveryOptions,
    /// Opaque options forwarded to the transport channel, if any.
    pub transport_options: Option<ChannelOptions>,
    /// Whether the session layer should subscribe at all.
    pub should_subscribe: bool,
}

impl ChannelDescriptor {
    /// Create a descriptor with default options (no echo, subscribe on).
    #[must_use]
    pub fn new(template: ChannelTemplate, value: impl Into<String>) -> Self {
        Self {
            template,
            value: value.into(),
            options: DeliveryOptions::default(),
            transport_options: None,
            should_subscribe: true,
        }
    }

    /// Enable or disable echo delivery.
    #[must_use]
    pub fn with_echo(mut self, echo_messages: bool) -> Self {
        self.options.echo_messages = echo_messages;
        self
    }

    /// Attach opaque transport options.
    #[must_use]
    pub fn with_transport_options(mut self, options: ChannelOptions) -> Self {
        self.transport_options = Some(options);
        self
    }

    /// Control whether the session layer subscribes at all.
    #[must_use]
    pub fn with_should_subscribe(mut self, should_subscribe: bool) -> Self {
        self.should_subscribe = should_subscribe;
        self
    }

    /// The concrete transport channel name for this descriptor.
    #[must_use]
    pub fn channel_name(&self) -> String {
        self.template.resolve_with(&self.value)
    }
}

/// Resolve a descriptor into a concrete channel name, passing absence
/// through.
#[must_use]
pub fn resolve(descriptor: Option<&ChannelDescriptor>) -> Option<String> {
    descriptor.map(ChannelDescriptor::channel_name)
}
