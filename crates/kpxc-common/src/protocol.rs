//! Wire messages of the KeePassXC browser protocol.
//!
//! Every exchange is one JSON document each way. The outer envelope carries
//! routing metadata in plaintext; after the key exchange the action payload
//! travels sealed in the `message` field.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::{base64_bytes, base64_opt, string_bool_opt, string_int_opt};
use crate::error::ProtocolError;

/// Client identifier width.
pub const CLIENT_ID_LEN: usize = 24;

/// Identity key width.
pub const ID_KEY_LEN: usize = 24;

/// Request actions understood by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    ChangePublicKeys,
    Associate,
    TestAssociate,
    GetLogins,
    GetTotp,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChangePublicKeys => "change-public-keys",
            Self::Associate => "associate",
            Self::TestAssociate => "test-associate",
            Self::GetLogins => "get-logins",
            Self::GetTotp => "get-totp",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Plaintext key exchange request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePublicKeysRequest {
    pub action: Action,
    #[serde(rename = "publicKey", with = "base64_bytes")]
    pub public_key: [u8; 32],
    #[serde(with = "base64_bytes")]
    pub nonce: [u8; 24],
    #[serde(rename = "clientID", with = "base64_bytes")]
    pub client_id: [u8; CLIENT_ID_LEN],
}

/// Encrypted request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,
    #[serde(rename = "clientID", with = "base64_bytes")]
    pub client_id: [u8; CLIENT_ID_LEN],
    #[serde(with = "base64_bytes")]
    pub nonce: [u8; 24],
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub message: Option<Vec<u8>>,
    #[serde(
        rename = "triggerUnlock",
        default,
        with = "string_bool_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub trigger_unlock: Option<bool>,
}

/// Response envelope, the union of every reply shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub message: Option<Vec<u8>>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Vec<u8>>,
    #[serde(
        rename = "publicKey",
        default,
        with = "base64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        rename = "errorCode",
        default,
        with = "string_int_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_code: Option<i64>,
    #[serde(default, with = "string_bool_opt", skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Response {
    /// The peer-reported error, if this is an error reply.
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        if self.error.is_none() && self.error_code.is_none() {
            return None;
        }
        Some(ProtocolError::from_parts(
            self.error.as_deref(),
            self.error_code,
        ))
    }

    /// Build an error reply.
    pub fn error(action: Action, err: &ProtocolError) -> Self {
        Self {
            action: Some(action.as_str().to_string()),
            error: Some(err.to_string()),
            error_code: Some(match err {
                ProtocolError::Known(code) => i64::from(code.code()),
                ProtocolError::Unrecognized { code, .. } => code.unwrap_or(0),
            }),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Encrypted payloads
// ---------------------------------------------------------------------------

/// Saved association as sent inside requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbKey {
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub key: [u8; ID_KEY_LEN],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociateMessage {
    pub action: Action,
    /// Client public key
    #[serde(with = "base64_bytes")]
    pub key: [u8; 32],
    /// Identity key to pair with
    #[serde(rename = "idKey", with = "base64_bytes")]
    pub id_key: [u8; ID_KEY_LEN],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAssociateMessage {
    pub action: Action,
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub key: [u8; ID_KEY_LEN],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLoginsMessage {
    pub action: Action,
    pub url: String,
    #[serde(rename = "submitUrl", default, skip_serializing_if = "Option::is_none")]
    pub submit_url: Option<String>,
    #[serde(rename = "httpAuth", default, skip_serializing_if = "Option::is_none")]
    pub http_auth: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<DbKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTotpMessage {
    pub action: Action,
    pub uuid: String,
}

/// Metadata KeePassXC attaches to every decrypted reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, with = "string_bool_opt", skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssociateReply {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub info: ReplyInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestAssociateReply {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub info: ReplyInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetLoginsReply {
    #[serde(default, with = "string_int_opt", skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default)]
    pub entries: Vec<LoginEntry>,
    #[serde(flatten)]
    pub info: ReplyInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTotpReply {
    #[serde(default)]
    pub totp: String,
    #[serde(flatten)]
    pub info: ReplyInfo,
}

/// One matching entry returned by `get-logins`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginEntry {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub uuid: String,
    /// Custom string fields, each a single-key map, in peer order.
    #[serde(rename = "stringFields", default)]
    pub string_fields: Vec<BTreeMap<String, String>>,
}
