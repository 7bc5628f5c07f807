//! Error classification.
//!
//! Transport failures are classified by fixed code tables into one of
//! three dispositions. The classification is pure: the same inputs always
//! produce the same decision, and nothing here touches a sink. Acting on
//! the disposition (counting a metric, reporting an exception) is the
//! caller's job.

use crate::error::{codes, ErrorEnvelope};
use crate::gate::OperationKind;
use crate::state::{ChannelState, ConnectionState};

/// What to do with a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Expected or self-healing; drop it.
    Ignore,
    /// Drop it, but count one metric tagged with the code.
    IgnoreWithMetric(u32),
    /// Not transport-shaped: wrap and forward to the exception sink.
    Report,
}

/// Where the error came from. Does not influence the decision; it travels
/// with the error so the caller can log a useful diagnostic.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext {
    pub operation: OperationKind,
    pub channel_state: Option<ChannelState>,
    pub connection_state: Option<ConnectionState>,
}

impl ErrorContext {
    /// Context with only the operation known.
    #[must_use]
    pub fn for_operation(operation: OperationKind) -> Self {
        Self {
            operation,
            channel_state: None,
            connection_state: None,
        }
    }
}

/// Classify a failed operation.
///
/// `envelope` is `None` when the failure was not shaped like a transport
/// error; only those failures are ever reported. Transport-shaped errors
/// are matched against the code tables in order:
///
/// 1. The ignore list: transient connection-layer codes the transport
///    retries on its own.
/// 2. ClientId mismatch (40102): the session credential expired between
///    token mint and use; the next token request self-heals.
/// 3. HTTP 403: the channel was used before authorization or series data
///    existed; the absence of messages is expected.
/// 4. The counted list (90001, 90007): swallowed, but one counter metric
///    is emitted so growth is visible.
/// 5. Any other envelope is ignored. Policy: transport-shaped errors not
///    named above are treated as non-fatal, so no envelope ever reaches
///    `Report`. Flagged for review in DESIGN.md.
#[must_use]
pub fn classify(envelope: Option<&ErrorEnvelope>, _ctx: &ErrorContext) -> Disposition {
    let Some(envelope) = envelope else {
        return Disposition::Report;
    };

    if codes::IGNORED_TRANSPORT.contains(&envelope.code) {
        return Disposition::Ignore;
    }

    if envelope.code == codes::CLIENT_ID_MISMATCH {
        return Disposition::Ignore;
    }

    if envelope.status_code == codes::HTTP_FORBIDDEN {
        return Disposition::Ignore;
    }

    if codes::COUNTED_TRANSPORT.contains(&envelope.code) {
        return Disposition::IgnoreWithMetric(envelope.code);
    }

    Disposition::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ErrorContext {
        ErrorContext::for_operation(OperationKind::Publish)
    }

    #[test]
    fn test_non_envelope_failures_are_reported() {
        assert_eq!(classify(None, &ctx()), Disposition::Report);
    }

    #[test]
    fn test_ignore_list() {
        for code in codes::IGNORED_TRANSPORT {
            let e = ErrorEnvelope::new(code, 500, "transient");
            assert_eq!(classify(Some(&e), &ctx()), Disposition::Ignore, "code {code}");
        }
    }

    #[test]
    fn test_client_id_mismatch_is_ignored() {
        let e = ErrorEnvelope::new(codes::CLIENT_ID_MISMATCH, 401, "mismatched clientId");
        assert_eq!(classify(Some(&e), &ctx()), Disposition::Ignore);
    }

    #[test]
    fn test_forbidden_status_is_ignored() {
        let e = ErrorEnvelope::new(40160, 403, "channel not authorized");
        assert_eq!(classify(Some(&e), &ctx()), Disposition::Ignore);
    }

    #[test]
    fn test_counted_codes_emit_metric() {
        for code in codes::COUNTED_TRANSPORT {
            let e = ErrorEnvelope::new(code, 500, "counted");
            assert_eq!(
                classify(Some(&e), &ctx()),
                Disposition::IgnoreWithMetric(code)
            );
        }
    }

    #[test]
    fn test_forbidden_status_wins_over_counted_code() {
        // Rows are evaluated in order: a counted code arriving with a 403
        // status is still plain-ignored.
        let e = ErrorEnvelope::new(90001, 403, "forbidden");
        assert_eq!(classify(Some(&e), &ctx()), Disposition::Ignore);
    }

    #[test]
    fn test_unclassified_envelopes_are_ignored_by_policy() {
        let e = ErrorEnvelope::new(70001, 500, "some new failure mode");
        assert_eq!(classify(Some(&e), &ctx()), Disposition::Ignore);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let e = ErrorEnvelope::new(90007, 500, "counted");
        let first = classify(Some(&e), &ctx());
        let second = classify(Some(&e), &ctx());
        assert_eq!(first, second);
    }
}
