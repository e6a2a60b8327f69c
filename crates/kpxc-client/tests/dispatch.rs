//! Encrypted actions over an established session.

mod support;

use kpxc_client::{
    ClientError, Handshake, HandshakeOptions, Identity, MemoryIdentityStore, RetryPolicy, Session,
};
use kpxc_common::{Action, DbKey, ErrorCode, GetTotpMessage, GetTotpReply, ProtocolError};
use support::{entry, MockPeer, PeerConfig};
use tokio::io::DuplexStream;

const KEY: [u8; 24] = [4u8; 24];

fn paired(config: PeerConfig) -> PeerConfig {
    PeerConfig {
        known: Some(DbKey {
            id: "browser".into(),
            key: KEY,
        }),
        ..config
    }
}

async fn connected(config: PeerConfig) -> (Session<DuplexStream>, MockPeer) {
    let (stream, peer) = MockPeer::spawn(paired(config));
    let mut session = Session::new(stream, Identity::new("browser", KEY));
    Handshake::new(HandshakeOptions::default())
        .run(&mut session, &mut MemoryIdentityStore::default())
        .await
        .unwrap();
    (session, peer)
}

#[tokio::test]
async fn test_get_logins_returns_entries_in_order() {
    let logins = vec![
        entry("Example", "alice", "hunter2"),
        entry("Example (work)", "alice@work", "correct horse"),
    ];
    let (mut session, peer) = connected(PeerConfig {
        logins: logins.clone(),
        ..PeerConfig::default()
    })
    .await;

    let got = session.get_logins("https://example.com").await.unwrap();

    assert_eq!(got, logins);
    let log = peer.log();
    assert_eq!(log.last_url.as_deref(), Some("https://example.com"));
    assert_eq!(log.nonce_mismatches, 0);
}

#[tokio::test]
async fn test_empty_result_is_no_logins_found() {
    let (mut session, _peer) = connected(PeerConfig::default()).await;

    let err = session.get_logins("https://nothing.test").await.unwrap_err();

    assert!(matches!(err, ClientError::NoLoginsFound));
    assert_eq!(err.protocol_code(), Some(ErrorCode::NoLoginsFound));
}

#[tokio::test]
async fn test_no_logins_error_code_is_no_logins_found() {
    let (mut session, _peer) = connected(PeerConfig {
        no_logins_as_error: true,
        ..PeerConfig::default()
    })
    .await;

    let err = session.get_logins("https://nothing.test").await.unwrap_err();

    assert!(matches!(err, ClientError::NoLoginsFound));
}

#[tokio::test]
async fn test_session_usable_after_error_reply() {
    let (mut session, peer) = connected(PeerConfig {
        no_logins_as_error: true,
        totp: "123456".into(),
        ..PeerConfig::default()
    })
    .await;

    assert!(session.get_logins("https://a.test").await.is_err());
    assert_eq!(session.get_totp("0000").await.unwrap(), "123456");
    assert_eq!(peer.log().nonce_mismatches, 0);
}

#[tokio::test]
async fn test_get_totp() {
    let (mut session, peer) = connected(PeerConfig {
        totp: "287082".into(),
        ..PeerConfig::default()
    })
    .await;

    let code = session.get_totp("d1d0a0a3f1f0e0e3").await.unwrap();

    assert_eq!(code, "287082");
    assert_eq!(peer.log().actions().last(), Some(&Action::GetTotp));
}

#[tokio::test]
async fn test_get_totp_without_secret_is_empty() {
    let (mut session, _peer) = connected(PeerConfig::default()).await;

    let code = session.get_totp("d1d0a0a3f1f0e0e3").await.unwrap();

    assert!(code.is_empty());
}

#[tokio::test]
async fn test_garbled_reply_resends_request() {
    let (mut session, peer) = connected(PeerConfig {
        garble: 2,
        logins: vec![entry("Example", "bob", "pw")],
        ..PeerConfig::default()
    })
    .await;

    // Both corrupted replies hit test-associate during the handshake.
    let log = peer.log();
    assert_eq!(log.trigger_flags(Action::TestAssociate).len(), 3);
    assert_eq!(log.nonce_mismatches, 0);

    let got = session.get_logins("https://example.com").await.unwrap();
    assert_eq!(got.len(), 1);
}

#[tokio::test]
async fn test_garbled_replies_respect_retry_policy() {
    let (stream, _peer) = MockPeer::spawn(paired(PeerConfig {
        garble: 5,
        ..PeerConfig::default()
    }));
    let mut session =
        Session::new(stream, Identity::new("browser", KEY)).with_retry_policy(RetryPolicy::bounded(1));

    let err = Handshake::new(HandshakeOptions::default())
        .run(&mut session, &mut MemoryIdentityStore::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::RetriesExhausted { attempts: 2, .. }
    ));
}

#[tokio::test]
async fn test_perform_requires_key_exchange() {
    let (stream, peer) = MockPeer::spawn(PeerConfig::default());
    let mut session = Session::new(stream, Identity::generate());
    let message = GetTotpMessage {
        action: Action::GetTotp,
        uuid: "x".into(),
    };

    let err = session
        .perform::<_, GetTotpReply>(Action::GetTotp, &message, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotConnected));
    assert!(peer.log().requests.is_empty());
}

#[tokio::test]
async fn test_peer_error_surfaces_as_protocol_error() {
    let (stream, _peer) = MockPeer::spawn(paired(PeerConfig::default()));
    let mut session = Session::new(stream, Identity::new("stranger", KEY));
    session.change_public_keys().await.unwrap();

    let err = session.get_logins("https://example.com").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::Known(ErrorCode::AssociationFailed))
    ));
}
