//! Operation gating.
//!
//! Before any channel operation touches the transport, the gate decides
//! whether the attempt is meaningful given the current connection and
//! channel states. A skipped operation is not an error: callers resolve
//! to a no-op result instead of hanging or failing at the transport.

use crate::error::ErrorEnvelope;
use crate::state::{ChannelState, ConnectionState};
use tracing::trace;

/// The kind of channel operation being attempted.
///
/// Only used to select gating exceptions: subscribing is allowed while a
/// channel is suspended (subscribing is how recovery is observed); every
/// other operation is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Publish,
    Subscribe,
    PresenceGet,
    PresenceSubscribe,
    PresenceUnsubscribe,
    PresenceUpdate,
    PresenceEnter,
    PresenceLeave,
}

impl OperationKind {
    /// Get the operation name used in logs and metric tags.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Publish => "publish",
            OperationKind::Subscribe => "subscribe",
            OperationKind::PresenceGet => "presence.get",
            OperationKind::PresenceSubscribe => "presence.subscribe",
            OperationKind::PresenceUnsubscribe => "presence.unsubscribe",
            OperationKind::PresenceUpdate => "presence.update",
            OperationKind::PresenceEnter => "presence.enter",
            OperationKind::PresenceLeave => "presence.leave",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the gate looks at for one decision.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    /// State of the channel the operation targets.
    pub channel_state: ChannelState,
    /// State of the transport connection.
    pub connection_state: ConnectionState,
    /// The operation being attempted.
    pub operation: OperationKind,
    /// The connection's last error, if any.
    pub error_reason: Option<&'a ErrorEnvelope>,
}

/// Decide whether an operation should be silently skipped.
///
/// The rules are evaluated in order; the first match wins:
///
/// 1. A failed channel cannot carry traffic; a suspended channel accepts
///    only new subscribe attempts.
/// 2. A closing, closed, or suspended connection has no usable socket.
/// 3. A failed connection whose last error is the stop-retrying pairing
///    (code 80019, status 403) will never recover; attempts are wasted.
#[must_use]
pub fn should_skip(input: &GateInput<'_>) -> bool {
    let skip = skip_reason(input);
    if let Some(reason) = skip {
        trace!(
            operation = %input.operation,
            channel_state = %input.channel_state,
            connection_state = %input.connection_state,
            reason,
            "Operation gated off"
        );
    }
    skip.is_some()
}

fn skip_reason(input: &GateInput<'_>) -> Option<&'static str> {
    if input.channel_state == ChannelState::Failed
        || (input.channel_state == ChannelState::Suspended
            && input.operation != OperationKind::Subscribe)
    {
        return Some("channel cannot carry traffic");
    }

    if matches!(
        input.connection_state,
        ConnectionState::Closing | ConnectionState::Closed | ConnectionState::Suspended
    ) {
        return Some("no usable connection");
    }

    if input.connection_state == ConnectionState::Failed
        && input.error_reason.is_some_and(ErrorEnvelope::is_stop_retrying)
    {
        return Some("connection told to stop retrying");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPERATIONS: [OperationKind; 8] = [
        OperationKind::Publish,
        OperationKind::Subscribe,
        OperationKind::PresenceGet,
        OperationKind::PresenceSubscribe,
        OperationKind::PresenceUnsubscribe,
        OperationKind::PresenceUpdate,
        OperationKind::PresenceEnter,
        OperationKind::PresenceLeave,
    ];

    fn input(
        channel_state: ChannelState,
        connection_state: ConnectionState,
        operation: OperationKind,
    ) -> GateInput<'static> {
        GateInput {
            channel_state,
            connection_state,
            operation,
            error_reason: None,
        }
    }

    #[test]
    fn test_failed_channel_skips_everything() {
        for op in ALL_OPERATIONS {
            assert!(should_skip(&input(
                ChannelState::Failed,
                ConnectionState::Connected,
                op
            )));
        }
    }

    #[test]
    fn test_suspended_channel_allows_only_subscribe() {
        for op in ALL_OPERATIONS {
            let skipped = should_skip(&input(
                ChannelState::Suspended,
                ConnectionState::Connected,
                op,
            ));
            assert_eq!(skipped, op != OperationKind::Subscribe, "operation {op}");
        }
    }

    #[test]
    fn test_unusable_connection_skips_regardless_of_channel() {
        for conn in [
            ConnectionState::Closing,
            ConnectionState::Closed,
            ConnectionState::Suspended,
        ] {
            for op in ALL_OPERATIONS {
                assert!(should_skip(&input(ChannelState::Attached, conn, op)));
            }
        }
    }

    #[test]
    fn test_failed_connection_with_stop_retrying_reason() {
        let reason = ErrorEnvelope::new(80019, 403, "token revoked");
        let gated = GateInput {
            channel_state: ChannelState::Attached,
            connection_state: ConnectionState::Failed,
            operation: OperationKind::Publish,
            error_reason: Some(&reason),
        };
        assert!(should_skip(&gated));

        // A failed connection with a different error still proceeds: the
        // transport may yet recover it.
        let other = ErrorEnvelope::new(80008, 503, "connection lost");
        let open = GateInput {
            error_reason: Some(&other),
            ..gated
        };
        assert!(!should_skip(&open));

        let no_reason = GateInput {
            error_reason: None,
            ..gated
        };
        assert!(!should_skip(&no_reason));
    }

    #[test]
    fn test_healthy_states_proceed() {
        for conn in [
            ConnectionState::Initialized,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ] {
            assert!(!should_skip(&input(
                ChannelState::Attached,
                conn,
                OperationKind::Publish
            )));
        }
    }
}
