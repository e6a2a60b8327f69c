//! In-process KeePassXC stand-in speaking the real wire format.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kpxc_client::JsonCodec;
use kpxc_common::{
    Action, ChangePublicKeysRequest, DbKey, ErrorCode, LoginEntry, ProtocolError, Request,
    Response,
};
use kpxc_crypto::{envelope, KeyPair, Nonce, PublicKey};
use serde_json::{json, Value};
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

pub const PEER_VERSION: &str = "2.7.6";
pub const DATABASE_HASH: &str = "29234e32274a32276e25666a42";

/// Scripted peer behaviour.
#[derive(Debug, Clone, Default)]
pub struct PeerConfig {
    /// Association the database already holds.
    pub known: Option<DbKey>,
    /// Identifier handed out by `associate`.
    pub assign_id: String,
    pub reject_associate: bool,
    pub logins: Vec<LoginEntry>,
    /// Report zero matches as error 15 rather than an empty list.
    pub no_logins_as_error: bool,
    pub totp: String,
    /// Test-associate replies with cannot-decrypt this many times.
    pub cannot_decrypt: u32,
    /// Test-associate replies with database-not-opened this many times.
    pub locked: u32,
    /// Test-associate replies once with this error instead of checking the key.
    pub test_associate_error: Option<ErrorCode>,
    /// This many encrypted replies are corrupted in flight.
    pub garble: u32,
}

/// Everything the peer saw.
#[derive(Debug, Clone, Default)]
pub struct PeerLog {
    pub requests: Vec<(Action, Option<bool>)>,
    pub nonce_mismatches: u32,
    pub open_failures: u32,
    pub known: Option<DbKey>,
    pub last_url: Option<String>,
}

impl PeerLog {
    pub fn actions(&self) -> Vec<Action> {
        self.requests.iter().map(|(action, _)| *action).collect()
    }

    pub fn trigger_flags(&self, action: Action) -> Vec<Option<bool>> {
        self.requests
            .iter()
            .filter(|(a, _)| *a == action)
            .map(|(_, flag)| *flag)
            .collect()
    }
}

pub struct MockPeer {
    log: Arc<Mutex<PeerLog>>,
    task: JoinHandle<()>,
}

impl MockPeer {
    /// Start a peer and return the client end of its connection.
    pub fn spawn(config: PeerConfig) -> (DuplexStream, MockPeer) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let log = Arc::new(Mutex::new(PeerLog {
            known: config.known.clone(),
            ..PeerLog::default()
        }));
        let state = PeerState {
            config,
            keys: KeyPair::generate(),
            client_key: None,
            cursor: None,
            log: Arc::clone(&log),
        };
        let task = tokio::spawn(state.serve(JsonCodec::new(server)));
        (client, MockPeer { log, task })
    }

    pub fn log(&self) -> PeerLog {
        self.log.lock().unwrap().clone()
    }

    /// Stop serving; the client sees the connection close.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

struct PeerState {
    config: PeerConfig,
    keys: KeyPair,
    client_key: Option<PublicKey>,
    /// Last nonce the client is known to hold.
    cursor: Option<Nonce>,
    log: Arc<Mutex<PeerLog>>,
}

impl PeerState {
    async fn serve(mut self, mut codec: JsonCodec<DuplexStream>) {
        while let Ok(raw) = codec.recv::<Value>().await {
            let reply = self.handle(raw);
            if codec.send(&reply).await.is_err() {
                break;
            }
        }
    }

    fn handle(&mut self, raw: Value) -> Response {
        let action: Action = serde_json::from_value(raw["action"].clone()).unwrap();

        if action == Action::ChangePublicKeys {
            let request: ChangePublicKeysRequest = serde_json::from_value(raw).unwrap();
            self.record(action, None);
            self.client_key = Some(PublicKey::from_bytes(request.public_key));
            let nonce = Nonce::from_bytes(request.nonce).increment();
            self.cursor = Some(nonce);
            return Response {
                action: Some(action.as_str().into()),
                public_key: Some(self.keys.public().as_bytes().to_vec()),
                nonce: Some(nonce.as_bytes().to_vec()),
                version: Some(PEER_VERSION.into()),
                success: Some(true),
                ..Response::default()
            };
        }

        let request: Request = serde_json::from_value(raw).unwrap();
        self.record(action, request.trigger_unlock);

        let nonce = Nonce::from_bytes(request.nonce);
        if self.cursor.map(|c| c.increment()) != Some(nonce) {
            self.log.lock().unwrap().nonce_mismatches += 1;
        }
        self.cursor = Some(nonce);

        let Some(client_key) = self.client_key else {
            return error(action, ErrorCode::ClientPublicKeyNotReceived);
        };
        let sealed = request.message.unwrap_or_default();
        let payload: Value = match envelope::open(&sealed, &nonce, &client_key, self.keys.secret()) {
            Ok(plaintext) => serde_json::from_slice(&plaintext).unwrap(),
            Err(_) => {
                self.log.lock().unwrap().open_failures += 1;
                return error(action, ErrorCode::CannotDecryptMessage);
            }
        };
        assert_eq!(payload["action"], action.as_str());

        match self.answer(action, &payload) {
            Ok(body) => self.seal_reply(action, nonce, body),
            Err(code) => error(action, code),
        }
    }

    fn answer(&mut self, action: Action, payload: &Value) -> Result<Value, ErrorCode> {
        match action {
            Action::TestAssociate => {
                if take(&mut self.config.cannot_decrypt) {
                    return Err(ErrorCode::CannotDecryptMessage);
                }
                if take(&mut self.config.locked) {
                    return Err(ErrorCode::DatabaseNotOpened);
                }
                if let Some(code) = self.config.test_associate_error.take() {
                    return Err(code);
                }
                let presented = db_key(&payload["id"], &payload["key"]);
                if presented.is_none() || presented != self.known() {
                    return Err(ErrorCode::AssociationFailed);
                }
                Ok(json!({ "id": payload["id"] }))
            }
            Action::Associate => {
                if self.config.reject_associate {
                    return Err(ErrorCode::ActionCancelledOrDenied);
                }
                let key = self.client_key.map(|k| base64(k.as_bytes()));
                assert_eq!(payload["key"].as_str(), key.as_deref());

                let id = Value::String(self.config.assign_id.clone());
                let known = db_key(&id, &payload["idKey"]).ok_or(ErrorCode::AssociationFailed)?;
                self.log.lock().unwrap().known = Some(known);
                Ok(json!({ "id": id }))
            }
            Action::GetLogins => {
                let keys = payload["keys"].as_array().cloned().unwrap_or_default();
                let known = self.known();
                let paired = keys
                    .iter()
                    .any(|k| known.is_some() && db_key(&k["id"], &k["key"]) == known);
                if !paired {
                    return Err(ErrorCode::AssociationFailed);
                }
                self.log.lock().unwrap().last_url = payload["url"].as_str().map(String::from);

                if self.config.logins.is_empty() && self.config.no_logins_as_error {
                    return Err(ErrorCode::NoLoginsFound);
                }
                Ok(json!({
                    "count": self.config.logins.len().to_string(),
                    "entries": self.config.logins,
                }))
            }
            Action::GetTotp => Ok(json!({ "totp": self.config.totp })),
            Action::ChangePublicKeys => unreachable!(),
        }
    }

    fn seal_reply(&mut self, action: Action, request_nonce: Nonce, mut body: Value) -> Response {
        body["version"] = json!(PEER_VERSION);
        body["hash"] = json!(DATABASE_HASH);
        body["success"] = json!("true");
        body["nonce"] = json!(base64(request_nonce.increment().as_bytes()));

        let nonce = request_nonce.increment();
        let client_key = self.client_key.unwrap();
        let plaintext = serde_json::to_vec(&body).unwrap();
        let mut sealed = envelope::seal(&plaintext, &nonce, &client_key, self.keys.secret()).unwrap();
        if take(&mut self.config.garble) {
            sealed[0] ^= 0xff;
        }
        self.cursor = Some(nonce);

        Response {
            action: Some(action.as_str().into()),
            message: Some(sealed),
            nonce: Some(nonce.as_bytes().to_vec()),
            ..Response::default()
        }
    }

    fn known(&self) -> Option<DbKey> {
        self.log.lock().unwrap().known.clone()
    }

    fn record(&self, action: Action, trigger_unlock: Option<bool>) {
        self.log.lock().unwrap().requests.push((action, trigger_unlock));
    }
}

fn error(action: Action, code: ErrorCode) -> Response {
    Response::error(action, &ProtocolError::Known(code))
}

/// Decrement a scripted counter, reporting whether it was still armed.
fn take(counter: &mut u32) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}

fn db_key(id: &Value, key: &Value) -> Option<DbKey> {
    serde_json::from_value(json!({ "id": id, "key": key })).ok()
}

fn base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn entry(name: &str, login: &str, password: &str) -> LoginEntry {
    LoginEntry {
        login: login.into(),
        name: name.into(),
        password: password.into(),
        uuid: format!("{:0>32}", name.len()),
        string_fields: Vec::new(),
    }
}
