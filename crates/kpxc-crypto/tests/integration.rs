//! Envelope round trips and tamper detection between two key pairs.

use kpxc_crypto::{open, seal, EnvelopeError, KeyPair, Nonce};

#[test]
fn test_seal_open_round_trip() {
    let client = KeyPair::generate();
    let peer = KeyPair::generate();
    let nonce = Nonce::random();

    let messages: [&[u8]; 3] = [b"", b"{\"action\":\"test-associate\"}", &[0u8; 4096]];
    for message in messages {
        let sealed = seal(message, &nonce, peer.public(), client.secret()).unwrap();
        let opened = open(&sealed, &nonce, client.public(), peer.secret()).unwrap();
        assert_eq!(opened, message);
    }
}

#[test]
fn test_open_rejects_tampered_ciphertext() {
    let client = KeyPair::generate();
    let peer = KeyPair::generate();
    let nonce = Nonce::random();

    let mut sealed = seal(b"secret payload", &nonce, peer.public(), client.secret()).unwrap();
    sealed[3] ^= 0x01;

    let result = open(&sealed, &nonce, client.public(), peer.secret());
    assert_eq!(result, Err(EnvelopeError::AuthFailure));
}

#[test]
fn test_open_rejects_truncated_ciphertext() {
    let client = KeyPair::generate();
    let peer = KeyPair::generate();
    let nonce = Nonce::random();

    let sealed = seal(b"secret payload", &nonce, peer.public(), client.secret()).unwrap();

    let result = open(&sealed[..10], &nonce, client.public(), peer.secret());
    assert_eq!(result, Err(EnvelopeError::AuthFailure));
}

#[test]
fn test_open_rejects_wrong_nonce() {
    let client = KeyPair::generate();
    let peer = KeyPair::generate();
    let nonce = Nonce::random();

    let sealed = seal(b"secret payload", &nonce, peer.public(), client.secret()).unwrap();

    let result = open(&sealed, &nonce.increment(), client.public(), peer.secret());
    assert_eq!(result, Err(EnvelopeError::AuthFailure));
}

#[test]
fn test_open_rejects_wrong_keys() {
    let client = KeyPair::generate();
    let peer = KeyPair::generate();
    let stranger = KeyPair::generate();
    let nonce = Nonce::random();

    let sealed = seal(b"secret payload", &nonce, peer.public(), client.secret()).unwrap();

    // Wrong sender key
    let result = open(&sealed, &nonce, stranger.public(), peer.secret());
    assert_eq!(result, Err(EnvelopeError::AuthFailure));

    // Wrong recipient key
    let result = open(&sealed, &nonce, client.public(), stranger.secret());
    assert_eq!(result, Err(EnvelopeError::AuthFailure));
}

#[test]
fn test_lockstep_nonce_exchange() {
    // Client and peer each derive the next nonce from the last one seen.
    let client = KeyPair::generate();
    let peer = KeyPair::generate();

    let mut client_cursor = Nonce::random();
    let mut peer_cursor = client_cursor;

    for round in 0..8u8 {
        client_cursor = client_cursor.increment();
        let request = seal(&[round], &client_cursor, peer.public(), client.secret()).unwrap();

        peer_cursor = peer_cursor.increment();
        assert_eq!(peer_cursor, client_cursor);
        let opened = open(&request, &peer_cursor, client.public(), peer.secret()).unwrap();
        assert_eq!(opened, [round]);

        peer_cursor = peer_cursor.increment();
        let response = seal(&[round, 1], &peer_cursor, client.public(), peer.secret()).unwrap();

        // The peer's nonce becomes the client's cursor.
        client_cursor = peer_cursor;
        let opened = open(&response, &client_cursor, peer.public(), client.secret()).unwrap();
        assert_eq!(opened, [round, 1]);
    }
}
