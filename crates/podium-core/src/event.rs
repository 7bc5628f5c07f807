//! The fixed event-name taxonomy.
//!
//! Event names are partitioned into two families matching the two channel
//! templates. Payload shapes belong to external collaborators; Podium
//! carries payloads as opaque data.

use crate::address::ChannelTemplate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Events carried on the series-private channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesPrivateEvent {
    /// A question's result payload.
    #[serde(rename = "result")]
    Result,
    /// A question's result changed; no payload beyond the notification.
    #[serde(rename = "result_has_changed")]
    ResultHasChanged,
    /// Other clients should refetch network-cached data.
    #[serde(rename = "update_network_cache")]
    UpdateNetworkCache,
    /// UI navigation between slides.
    #[serde(rename = "navigation")]
    Navigation,
    /// Q&A moderation actions.
    #[serde(rename = "qfa:sync")]
    QfaSync,
    /// Q&A data.
    #[serde(rename = "qfa")]
    Qfa,
    /// A quiz player's marked answer.
    #[serde(rename = "quiz_marked_answer")]
    QuizMarkedAnswer,
    /// A voter sent a reaction.
    #[serde(rename = "reaction")]
    Reaction,
    /// A voter sent a comment.
    #[serde(rename = "comment")]
    Comment,
    /// Slide deck pacing steps changed.
    #[serde(rename = "presentation_state:update_series")]
    PresentationStateUpdateSeries,
    /// The connected audience member count changed.
    #[serde(rename = "audience_member_count_updated")]
    AudienceMemberCountUpdated,
}

impl SeriesPrivateEvent {
    /// Get the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SeriesPrivateEvent::Result => "result",
            SeriesPrivateEvent::ResultHasChanged => "result_has_changed",
            SeriesPrivateEvent::UpdateNetworkCache => "update_network_cache",
            SeriesPrivateEvent::Navigation => "navigation",
            SeriesPrivateEvent::QfaSync => "qfa:sync",
            SeriesPrivateEvent::Qfa => "qfa",
            SeriesPrivateEvent::QuizMarkedAnswer => "quiz_marked_answer",
            SeriesPrivateEvent::Reaction => "reaction",
            SeriesPrivateEvent::Comment => "comment",
            SeriesPrivateEvent::PresentationStateUpdateSeries => {
                "presentation_state:update_series"
            }
            SeriesPrivateEvent::AudienceMemberCountUpdated => "audience_member_count_updated",
        }
    }

    /// Look an event up by its wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        ALL_SERIES_PRIVATE.into_iter().find(|e| e.as_str() == name)
    }
}

const ALL_SERIES_PRIVATE: [SeriesPrivateEvent; 11] = [
    SeriesPrivateEvent::Result,
    SeriesPrivateEvent::ResultHasChanged,
    SeriesPrivateEvent::UpdateNetworkCache,
    SeriesPrivateEvent::Navigation,
    SeriesPrivateEvent::QfaSync,
    SeriesPrivateEvent::Qfa,
    SeriesPrivateEvent::QuizMarkedAnswer,
    SeriesPrivateEvent::Reaction,
    SeriesPrivateEvent::Comment,
    SeriesPrivateEvent::PresentationStateUpdateSeries,
    SeriesPrivateEvent::AudienceMemberCountUpdated,
];

/// Events carried on the presentation-state channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentationStateEvent {
    /// Full presentation state sync for voters.
    #[serde(rename = "presentation_state:sync_state")]
    SyncState,
}

impl PresentationStateEvent {
    /// Get the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PresentationStateEvent::SyncState => "presentation_state:sync_state",
        }
    }

    /// Look an event up by its wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        (name == PresentationStateEvent::SyncState.as_str())
            .then_some(PresentationStateEvent::SyncState)
    }
}

/// Any event, tagged by the channel family it rides on. One dispatch path
/// for both families instead of per-event call signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventKind {
    SeriesPrivate(SeriesPrivateEvent),
    PresentationState(PresentationStateEvent),
}

impl EventKind {
    /// Get the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::SeriesPrivate(e) => e.as_str(),
            EventKind::PresentationState(e) => e.as_str(),
        }
    }

    /// The channel template this event's family is carried on.
    #[must_use]
    pub const fn template(&self) -> ChannelTemplate {
        match self {
            EventKind::SeriesPrivate(_) => ChannelTemplate::SeriesPrivate,
            EventKind::PresentationState(_) => ChannelTemplate::PresentationState,
        }
    }
}

impl From<SeriesPrivateEvent> for EventKind {
    fn from(event: SeriesPrivateEvent) -> Self {
        EventKind::SeriesPrivate(event)
    }
}

impl From<PresentationStateEvent> for EventKind {
    fn from(event: PresentationStateEvent) -> Self {
        EventKind::PresentationState(event)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
