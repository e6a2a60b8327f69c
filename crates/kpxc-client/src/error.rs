//! Client error type.

use kpxc_common::{ErrorCode, ProtocolError};
use kpxc_crypto::{EnvelopeError, NonceLengthError};
use thiserror::Error;

/// Result type alias using the client's error type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the session, handshake and actions.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure: connection refused, closed or I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON on the wire or in a decrypted payload.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope failure. `AuthFailure` only surfaces once retries run out.
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("{0}")]
    Nonce(#[from] NonceLengthError),

    /// Error reported by the peer.
    #[error("{0}")]
    Protocol(ProtocolError),

    /// The peer found no entries for the requested URL.
    #[error("no logins found")]
    NoLoginsFound,

    /// A response lacked a field required for its action.
    #[error("response missing field `{0}`")]
    MissingField(&'static str),

    /// An encrypted action was attempted before the key exchange.
    #[error("public keys have not been exchanged")]
    NotConnected,

    /// A bounded retry policy reached its cap.
    #[error("{what}: gave up after {attempts} attempts")]
    RetriesExhausted { what: &'static str, attempts: u32 },
}

impl ClientError {
    /// The peer error code carried by this error, if any.
    pub fn protocol_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Protocol(err) => err.code(),
            Self::NoLoginsFound => Some(ErrorCode::NoLoginsFound),
            _ => None,
        }
    }

    /// Whether this error came from the channel itself rather than the peer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Json(_))
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err.code() {
            Some(ErrorCode::NoLoginsFound) => Self::NoLoginsFound,
            _ => Self::Protocol(err),
        }
    }
}
