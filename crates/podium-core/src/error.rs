//! Transport error envelope and the fixed error-code vocabulary.
//!
//! The transport reports failures as an envelope of `{code, status_code,
//! message}`. Classification works off the numeric fields only; message
//! text is never inspected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known transport error codes.
pub mod codes {
    /// Transient connection-layer failures the transport recovers from on
    /// its own (connection unreachable variants, rate-limit style codes).
    pub const IGNORED_TRANSPORT: [u32; 5] = [80000, 80002, 80003, 80008, 80016];

    /// Failures worth counting in a metric but not reporting as exceptions.
    pub const COUNTED_TRANSPORT: [u32; 2] = [90001, 90007];

    /// The clientId presented by the caller no longer matches the token.
    /// Happens when the session credential expires between mint and use;
    /// the next token request self-heals.
    pub const CLIENT_ID_MISMATCH: u32 = 40102;

    /// The token callback itself failed.
    pub const TOKEN_CALLBACK_FAILED: u32 = 40170;

    /// The connection was rejected and told never to retry.
    pub const FORBIDDEN_STOP_RETRYING: u32 = 80019;

    /// HTTP status carried alongside authorization rejections.
    pub const HTTP_FORBIDDEN: u16 = 403;
}

/// A transport-signaled error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("transport error {code} (status {status_code}): {message}")]
pub struct ErrorEnvelope {
    /// Transport-defined error code.
    pub code: u32,
    /// HTTP-equivalent status code.
    pub status_code: u16,
    /// Human-readable description. Never used for classification.
    pub message: String,
}

impl ErrorEnvelope {
    /// Create a new envelope.
    #[must_use]
    pub fn new(code: u32, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status_code,
            message: message.into(),
        }
    }

    /// Whether this is the code+status pairing that tells the client to
    /// stop retrying the connection (revoked or expired credential).
    #[must_use]
    pub fn is_stop_retrying(&self) -> bool {
        self.code == codes::FORBIDDEN_STOP_RETRYING && self.status_code == codes::HTTP_FORBIDDEN
    }
}
