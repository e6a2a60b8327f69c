//! Protocol error codes reported by KeePassXC.

use std::fmt;

use thiserror::Error;

/// Error codes defined by the KeePassXC browser protocol.
///
/// The numeric values are fixed by the peer and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    Unknown = 0,
    DatabaseNotOpened = 1,
    DatabaseHashNotReceived = 2,
    ClientPublicKeyNotReceived = 3,
    CannotDecryptMessage = 4,
    TimeoutOrNotConnected = 5,
    ActionCancelledOrDenied = 6,
    PublicKeyNotFound = 7,
    AssociationFailed = 8,
    KeyChangeFailed = 9,
    EncryptionKeyUnrecognized = 10,
    NoSavedDatabasesFound = 11,
    IncorrectAction = 12,
    EmptyMessageReceived = 13,
    NoUrlProvided = 14,
    NoLoginsFound = 15,
}

impl ErrorCode {
    /// All known codes, in numeric order.
    pub const ALL: [ErrorCode; 16] = [
        Self::Unknown,
        Self::DatabaseNotOpened,
        Self::DatabaseHashNotReceived,
        Self::ClientPublicKeyNotReceived,
        Self::CannotDecryptMessage,
        Self::TimeoutOrNotConnected,
        Self::ActionCancelledOrDenied,
        Self::PublicKeyNotFound,
        Self::AssociationFailed,
        Self::KeyChangeFailed,
        Self::EncryptionKeyUnrecognized,
        Self::NoSavedDatabasesFound,
        Self::IncorrectAction,
        Self::EmptyMessageReceived,
        Self::NoUrlProvided,
        Self::NoLoginsFound,
    ];

    /// Look up a code by its wire value.
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Wire value of this code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Stable kebab-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::DatabaseNotOpened => "database-not-opened",
            Self::DatabaseHashNotReceived => "database-hash-not-received",
            Self::ClientPublicKeyNotReceived => "client-public-key-not-received",
            Self::CannotDecryptMessage => "cannot-decrypt-message",
            Self::TimeoutOrNotConnected => "timeout-or-not-connected",
            Self::ActionCancelledOrDenied => "action-cancelled-or-denied",
            Self::PublicKeyNotFound => "public-key-not-found",
            Self::AssociationFailed => "association-failed",
            Self::KeyChangeFailed => "key-change-failed",
            Self::EncryptionKeyUnrecognized => "encryption-key-unrecognized",
            Self::NoSavedDatabasesFound => "no-saved-databases-found",
            Self::IncorrectAction => "incorrect-action",
            Self::EmptyMessageReceived => "empty-message-received",
            Self::NoUrlProvided => "no-url-provided",
            Self::NoLoginsFound => "no-logins-found",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::Unknown => "unknown error",
            Self::DatabaseNotOpened => "database not opened",
            Self::DatabaseHashNotReceived => "database hash not received",
            Self::ClientPublicKeyNotReceived => "client public key not received",
            Self::CannotDecryptMessage => "cannot decrypt message",
            Self::TimeoutOrNotConnected => "timeout or not connected",
            Self::ActionCancelledOrDenied => "action cancelled or denied",
            Self::PublicKeyNotFound => "public key not found",
            Self::AssociationFailed => "association failed",
            Self::KeyChangeFailed => "key change failed",
            Self::EncryptionKeyUnrecognized => "encryption key unrecognized",
            Self::NoSavedDatabasesFound => "no saved databases found",
            Self::IncorrectAction => "incorrect action",
            Self::EmptyMessageReceived => "empty message received",
            Self::NoUrlProvided => "no url provided",
            Self::NoLoginsFound => "no logins found",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Error reported by the peer in a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// One of the documented error codes.
    #[error("{0}")]
    Known(ErrorCode),

    /// A code outside the table, or an error without a code.
    #[error("{message}")]
    Unrecognized { code: Option<i64>, message: String },
}

impl ProtocolError {
    /// Build from the `error` and `errorCode` fields of a response.
    pub fn from_parts(message: Option<&str>, code: Option<i64>) -> Self {
        match code.and_then(ErrorCode::from_code) {
            Some(known) => Self::Known(known),
            None => Self::Unrecognized {
                code,
                message: message.unwrap_or("unknown protocol error").to_string(),
            },
        }
    }

    /// The known error code, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Known(code) => Some(*code),
            Self::Unrecognized { .. } => None,
        }
    }
}
