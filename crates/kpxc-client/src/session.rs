//! Per-connection protocol session.
//!
//! A `Session` owns everything that lives exactly as long as one proxy
//! connection: the ephemeral key pair, the client identifier, the nonce
//! cursor and, once keys are exchanged, the peer's public key. The paired
//! `Identity` travels with it so actions can present it.
//!
//! # Concurrency
//!
//! The nonce cursor is shared by every exchange on the connection, so a
//! session takes `&mut self` for each request. One request completes fully
//! before the next begins. Separate sessions share nothing and may run in
//! parallel.

use kpxc_common::{Action, ChangePublicKeysRequest, Response, CLIENT_ID_LEN};
use kpxc_crypto::{KeyPair, Nonce, PublicKey};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::codec::JsonCodec;
use crate::dispatch::RetryPolicy;
use crate::error::{ClientError, Result};
use crate::identity::Identity;

/// Encrypted session over one proxy connection.
pub struct Session<S> {
    pub(crate) codec: JsonCodec<S>,
    pub(crate) keys: KeyPair,
    pub(crate) client_id: [u8; CLIENT_ID_LEN],
    /// Last nonce sent or received.
    nonce: Nonce,
    pub(crate) peer_public_key: Option<PublicKey>,
    pub(crate) identity: Identity,
    pub(crate) retry: RetryPolicy,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Start a session on a connected stream with fresh ephemeral state.
    pub fn new(stream: S, identity: Identity) -> Self {
        let session = Self {
            codec: JsonCodec::new(stream),
            keys: KeyPair::generate(),
            client_id: kpxc_crypto::random_bytes(),
            nonce: Nonce::random(),
            peer_public_key: None,
            identity,
            retry: RetryPolicy::default(),
        };
        debug!(client_id = %hex::encode(session.client_id), "session created");
        session
    }

    /// Cap how often an exchange is resent after its reply fails to open.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Snapshot of the current pairing identity.
    pub fn association_data(&self) -> Identity {
        self.identity.clone()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keys.public()
    }

    pub fn client_id(&self) -> &[u8; CLIENT_ID_LEN] {
        &self.client_id
    }

    /// The peer's public key, once the key exchange has completed.
    pub fn peer_public_key(&self) -> Option<&PublicKey> {
        self.peer_public_key.as_ref()
    }

    /// Advance the cursor and return the nonce for the next request.
    pub(crate) fn next_nonce(&mut self) -> Nonce {
        self.nonce = self.nonce.increment();
        self.nonce
    }

    /// Adopt the peer's nonce as the cursor.
    pub(crate) fn observe_nonce(&mut self, nonce: Nonce) {
        self.nonce = nonce;
    }

    /// Exchange public keys with the peer.
    ///
    /// Sends our ephemeral public key in plaintext under a freshly generated
    /// random nonce and stores the key the peer answers with. Any failure here
    /// is final for the connection attempt.
    pub async fn change_public_keys(&mut self) -> Result<Response> {
        let nonce = Nonce::random();
        self.nonce = nonce;

        let request = ChangePublicKeysRequest {
            action: Action::ChangePublicKeys,
            public_key: *self.keys.public().as_bytes(),
            nonce: *nonce.as_bytes(),
            client_id: self.client_id,
        };
        debug!(action = %Action::ChangePublicKeys, "sending request");

        let response: Response = self.codec.round_trip(&request).await?;
        if let Some(err) = response.protocol_error() {
            return Err(err.into());
        }

        let peer_key = response
            .public_key
            .as_deref()
            .ok_or(ClientError::MissingField("publicKey"))?;
        self.peer_public_key = Some(PublicKey::try_from(peer_key)?);

        if let Some(peer_nonce) = response.nonce.as_deref() {
            self.observe_nonce(Nonce::try_from(peer_nonce)?);
        }
        debug!(peer = ?self.peer_public_key, "public keys exchanged");

        Ok(response)
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &hex::encode(self.client_id))
            .field("public_key", self.keys.public())
            .field("peer_public_key", &self.peer_public_key)
            .field("nonce", &self.nonce)
            .field("identity", &self.identity)
            .finish()
    }
}
