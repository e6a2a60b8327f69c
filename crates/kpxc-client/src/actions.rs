//! Typed actions layered on [`Session::perform`].

use kpxc_common::{
    Action, AssociateMessage, AssociateReply, GetLoginsMessage, GetLoginsReply, GetTotpMessage,
    GetTotpReply, LoginEntry, TestAssociateMessage, TestAssociateReply,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::session::Session;

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Ask the peer to pair with our identity key.
    ///
    /// On success the identifier the peer chose replaces the stored one. The
    /// identity key itself never changes.
    pub async fn associate(&mut self) -> Result<()> {
        let message = AssociateMessage {
            action: Action::Associate,
            key: *self.keys.public().as_bytes(),
            id_key: *self.identity.identity_key(),
        };
        let reply: AssociateReply = self.perform(Action::Associate, &message, None).await?;
        if reply.id.is_empty() {
            return Err(ClientError::MissingField("id"));
        }

        info!(id = %reply.id, "associated with database");
        self.identity.set_identifier(reply.id);
        Ok(())
    }

    /// Check that the stored identity is still paired.
    ///
    /// `trigger_unlock` asks the peer to raise its unlock prompt if the
    /// database is locked.
    pub async fn test_associate(&mut self, trigger_unlock: bool) -> Result<()> {
        let message = TestAssociateMessage {
            action: Action::TestAssociate,
            id: self.identity.identifier().to_string(),
            key: *self.identity.identity_key(),
        };
        let reply: TestAssociateReply = self
            .perform(Action::TestAssociate, &message, Some(trigger_unlock))
            .await?;
        debug!(id = %reply.id, version = ?reply.info.version, "association verified");
        Ok(())
    }

    /// Look up the entries stored for `url`.
    ///
    /// # Errors
    /// `NoLoginsFound` when nothing matches, whether the peer reports it as an
    /// error or answers with an empty list.
    pub async fn get_logins(&mut self, url: &str) -> Result<Vec<LoginEntry>> {
        let message = GetLoginsMessage {
            action: Action::GetLogins,
            url: url.to_string(),
            submit_url: None,
            http_auth: None,
            keys: vec![self.identity.db_key()],
        };
        let reply: GetLoginsReply = self.perform(Action::GetLogins, &message, None).await?;
        if reply.entries.is_empty() {
            return Err(ClientError::NoLoginsFound);
        }

        debug!(url, count = reply.entries.len(), "logins received");
        Ok(reply.entries)
    }

    /// Fetch the current TOTP code of the entry `uuid`.
    ///
    /// The peer answers an entry without a TOTP secret with a successful,
    /// empty code. That case cannot be told apart from an empty code, so it
    /// is returned as `Ok("")` and left to the caller.
    pub async fn get_totp(&mut self, uuid: &str) -> Result<String> {
        let message = GetTotpMessage {
            action: Action::GetTotp,
            uuid: uuid.to_string(),
        };
        let reply: GetTotpReply = self.perform(Action::GetTotp, &message, None).await?;
        Ok(reply.totp)
    }
}
