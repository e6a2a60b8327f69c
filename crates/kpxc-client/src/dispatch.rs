//! Encrypted action dispatcher.
//!
//! Every post-handshake action goes through [`Session::perform`]: serialize
//! the payload, seal it under the next nonce, send the envelope, adopt the
//! peer's nonce from the reply and open the sealed answer.
//!
//! A reply that fails to authenticate is not fatal. KeePassXC occasionally
//! answers with a message we cannot open even though keys were exchanged and
//! verified, and resending the same request recovers. The [`RetryPolicy`]
//! decides how many resends are allowed.

use kpxc_common::{Action, Request, Response};
use kpxc_crypto::{envelope, EnvelopeError, Nonce};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::error::{ClientError, Result};
use crate::session::Session;

/// How many times a failing step may be retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt. `None` retries forever.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    /// Retry without bound.
    pub const fn unbounded() -> Self {
        Self { max_retries: None }
    }

    /// Allow at most `max_retries` retries after the first attempt.
    pub const fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
        }
    }

    /// Whether retry number `retry` (1-based) is allowed.
    pub fn allows(&self, retry: u32) -> bool {
        self.max_retries.map_or(true, |max| retry <= max)
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send an encrypted action and decode its sealed reply.
    ///
    /// Resends the same payload whenever the reply fails to authenticate,
    /// within the session's retry policy.
    ///
    /// # Errors
    /// - `Io` / `Json` for transport and framing failures
    /// - `Protocol` or `NoLoginsFound` when the peer reports an error
    /// - `RetriesExhausted` once the retry policy runs out
    pub async fn perform<Req, Resp>(
        &mut self,
        action: Action,
        payload: &Req,
        trigger_unlock: Option<bool>,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let mut plaintext = serde_json::to_vec(payload)?;
        let mut retries = 0u32;

        let result = loop {
            match self.exchange(action, &plaintext, trigger_unlock).await {
                Err(ClientError::Envelope(EnvelopeError::AuthFailure)) => {
                    retries += 1;
                    if !self.retry.allows(retries) {
                        break Err(ClientError::RetriesExhausted {
                            what: "opening reply",
                            attempts: retries,
                        });
                    }
                    warn!(%action, retry = retries, "failed to open reply, resending");
                }
                other => break other,
            }
        };
        plaintext.zeroize();

        let mut reply = result?;
        let decoded: serde_json::Result<Resp> = serde_json::from_slice(&reply);
        reply.zeroize();
        Ok(decoded?)
    }

    /// One request/response round: returns the opened reply bytes.
    async fn exchange(
        &mut self,
        action: Action,
        plaintext: &[u8],
        trigger_unlock: Option<bool>,
    ) -> Result<Vec<u8>> {
        let peer = self.peer_public_key.ok_or(ClientError::NotConnected)?;

        let nonce = self.next_nonce();
        let message = envelope::seal(plaintext, &nonce, &peer, self.keys.secret())?;
        let request = Request {
            action,
            client_id: self.client_id,
            nonce: *nonce.as_bytes(),
            message: Some(message),
            trigger_unlock,
        };
        debug!(%action, ?nonce, "sending request");

        let response: Response = self.codec.round_trip(&request).await?;
        if let Some(err) = response.protocol_error() {
            debug!(%action, error = %err, "peer reported error");
            return Err(err.into());
        }

        let reply_nonce = response
            .nonce
            .as_deref()
            .ok_or(ClientError::MissingField("nonce"))?;
        let reply_nonce = Nonce::try_from(reply_nonce)?;
        self.observe_nonce(reply_nonce);

        let sealed = response
            .message
            .as_deref()
            .ok_or(ClientError::MissingField("message"))?;
        let opened = envelope::open(sealed, &reply_nonce, &peer, self.keys.secret())?;
        debug!(%action, nonce = ?reply_nonce, "reply opened");

        Ok(opened)
    }
}
