//! Key exchange and association state machine.
//!
//! ```text
//! Start -> KeysExchanged -> Associated
//!              |   ^
//!              |   +-- Associating   (unpaired, or pairing rejected)
//!              v
//!          Retrying -> Start         (cannot decrypt, database locked)
//! ```
//!
//! Every retry redoes the key exchange before testing the association
//! again. A fresh pairing is verified with test-associate on the same keys.

use std::fmt;
use std::time::Duration;

use kpxc_common::ErrorCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::dispatch::RetryPolicy;
use crate::error::{ClientError, Result};
use crate::identity::IdentityStore;
use crate::session::Session;

/// Handshake behaviour.
#[derive(Debug, Clone)]
pub struct HandshakeOptions {
    /// Ask the peer to show its unlock prompt on the first test-associate.
    pub trigger_unlock: bool,
    /// Poll while the database is locked instead of failing.
    pub wait_for_unlock: bool,
    pub unlock_poll_interval: Duration,
    /// Budget for test-associate replies saying the peer could not decrypt.
    pub decrypt_retry: RetryPolicy,
    /// Budget for unlock polls.
    pub unlock_retry: RetryPolicy,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            trigger_unlock: true,
            wait_for_unlock: true,
            unlock_poll_interval: Duration::from_secs(1),
            decrypt_retry: RetryPolicy::unbounded(),
            unlock_retry: RetryPolicy::unbounded(),
        }
    }
}

/// Why the machine went back to the key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    CannotDecrypt,
    DatabaseLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    KeysExchanged,
    Associating,
    Retrying(RetryReason),
    Associated,
}

/// What a completed handshake went through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeReport {
    /// A new pairing was made and saved.
    pub associated: bool,
    pub key_exchanges: u32,
    pub decrypt_retries: u32,
    pub unlock_waits: u32,
}

type UnlockWaitFn<'a> = Box<dyn FnMut(u32) + Send + 'a>;

/// Drives a [`Session`] from a fresh connection to a verified association.
pub struct Handshake<'a> {
    options: HandshakeOptions,
    on_unlock_wait: Option<UnlockWaitFn<'a>>,
}

impl<'a> Handshake<'a> {
    pub fn new(options: HandshakeOptions) -> Self {
        Self {
            options,
            on_unlock_wait: None,
        }
    }

    /// Called with the attempt count each time the handshake waits for the
    /// database to be unlocked.
    pub fn on_unlock_wait(mut self, callback: impl FnMut(u32) + Send + 'a) -> Self {
        self.on_unlock_wait = Some(Box::new(callback));
        self
    }

    /// Run the handshake to completion.
    ///
    /// A new pairing is written to `store` before it is verified.
    ///
    /// # Errors
    /// Transport failures, key exchange and association failures are returned
    /// immediately. A locked database is returned as-is when waiting is
    /// disabled, and `RetriesExhausted` when a bounded budget runs out.
    pub async fn run<S, St>(
        &mut self,
        session: &mut Session<S>,
        store: &mut St,
    ) -> Result<HandshakeReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        St: IdentityStore + ?Sized,
    {
        let mut report = HandshakeReport::default();
        let mut trigger_unlock = self.options.trigger_unlock;
        let mut state = HandshakeState::Start;

        loop {
            debug!(?state, "handshake step");
            state = match state {
                HandshakeState::Start | HandshakeState::Retrying(_) => {
                    session.change_public_keys().await?;
                    report.key_exchanges += 1;
                    HandshakeState::KeysExchanged
                }
                HandshakeState::KeysExchanged if !session.identity.is_associated() => {
                    HandshakeState::Associating
                }
                HandshakeState::KeysExchanged => {
                    match session.test_associate(trigger_unlock).await {
                        Ok(()) => HandshakeState::Associated,
                        Err(err) => {
                            let next = self.on_test_failure(err, &mut report).await?;
                            if next == HandshakeState::Retrying(RetryReason::DatabaseLocked) {
                                trigger_unlock = false;
                            }
                            next
                        }
                    }
                }
                HandshakeState::Associating => {
                    session.associate().await?;
                    store.save(&session.identity)?;
                    report.associated = true;
                    HandshakeState::KeysExchanged
                }
                HandshakeState::Associated => {
                    info!(
                        id = session.identity.identifier(),
                        key_exchanges = report.key_exchanges,
                        "handshake complete"
                    );
                    return Ok(report);
                }
            };
        }
    }

    /// Decide where a failed test-associate leads.
    async fn on_test_failure(
        &mut self,
        err: ClientError,
        report: &mut HandshakeReport,
    ) -> Result<HandshakeState> {
        let rejected_by_peer =
            err.protocol_code().is_some() || matches!(err, ClientError::Protocol(_));
        match err.protocol_code() {
            Some(ErrorCode::CannotDecryptMessage) => {
                report.decrypt_retries += 1;
                if !self.options.decrypt_retry.allows(report.decrypt_retries) {
                    return Err(ClientError::RetriesExhausted {
                        what: "test-associate",
                        attempts: report.decrypt_retries,
                    });
                }
                warn!(retry = report.decrypt_retries, "peer could not decrypt, exchanging keys again");
                Ok(HandshakeState::Retrying(RetryReason::CannotDecrypt))
            }
            Some(ErrorCode::DatabaseNotOpened) if self.options.wait_for_unlock => {
                report.unlock_waits += 1;
                if !self.options.unlock_retry.allows(report.unlock_waits) {
                    return Err(ClientError::RetriesExhausted {
                        what: "waiting for unlock",
                        attempts: report.unlock_waits,
                    });
                }
                if let Some(callback) = self.on_unlock_wait.as_mut() {
                    callback(report.unlock_waits);
                }
                info!(attempt = report.unlock_waits, "database is locked, waiting");
                tokio::time::sleep(self.options.unlock_poll_interval).await;
                Ok(HandshakeState::Retrying(RetryReason::DatabaseLocked))
            }
            Some(ErrorCode::DatabaseNotOpened) => Err(err),
            // At most one new pairing per run, and only after a peer rejection.
            _ if !rejected_by_peer || report.associated => Err(err),
            _ => {
                info!(error = %err, "stored association rejected, pairing again");
                Ok(HandshakeState::Associating)
            }
        }
    }
}

impl fmt::Debug for Handshake<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("options", &self.options)
            .field("on_unlock_wait", &self.on_unlock_wait.is_some())
            .finish()
    }
}
