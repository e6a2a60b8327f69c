//! Durable pairing identity and its stores.
//!
//! The identity is the only state carried between runs: the identifier
//! KeePassXC assigned at association time and the 24-byte identity key.
//! It is persisted as `{"id": "...", "idKey": "<base64>"}`.

use std::fmt;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use kpxc_common::encoding::base64_bytes;
use kpxc_common::{DbKey, ID_KEY_LEN};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;

/// Pairing secret and name. The key is zeroized on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    #[serde(rename = "id", default)]
    identifier: String,
    #[serde(rename = "idKey", with = "base64_bytes")]
    identity_key: [u8; ID_KEY_LEN],
}

impl Identity {
    pub fn new(identifier: impl Into<String>, identity_key: [u8; ID_KEY_LEN]) -> Self {
        Self {
            identifier: identifier.into(),
            identity_key,
        }
    }

    /// A fresh, not yet associated identity with a random key.
    pub fn generate() -> Self {
        Self::new(String::new(), kpxc_crypto::random_bytes())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn identity_key(&self) -> &[u8; ID_KEY_LEN] {
        &self.identity_key
    }

    /// Whether the peer ever assigned an identifier to this key.
    pub fn is_associated(&self) -> bool {
        !self.identifier.is_empty()
    }

    /// The key list entry sent with lookups.
    pub fn db_key(&self) -> DbKey {
        DbKey {
            id: self.identifier.clone(),
            key: self.identity_key,
        }
    }

    pub(crate) fn set_identifier(&mut self, identifier: String) {
        self.identifier = identifier;
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("identifier", &self.identifier)
            .field("identity_key", &"[REDACTED]")
            .finish()
    }
}

/// Somewhere an identity is loaded from and saved to.
pub trait IdentityStore {
    /// Load the saved identity. `None` means no pairing has been saved yet.
    fn load(&mut self) -> Result<Option<Identity>>;

    /// Persist an identity after a successful association.
    fn save(&mut self, identity: &Identity) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identity: Option<Identity>,
    saves: usize,
}

impl MemoryIdentityStore {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity, saves: 0 }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Number of times `save` was called.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&mut self) -> Result<Option<Identity>> {
        Ok(self.identity.clone())
    }

    fn save(&mut self, identity: &Identity) -> Result<()> {
        self.identity = Some(identity.clone());
        self.saves += 1;
        Ok(())
    }
}

/// JSON file store. The path `-` reads stdin and writes stdout.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    const STDIO: &'static str = "-";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(Self::STDIO)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_stdio(&self) -> bool {
        self.path.as_os_str() == Self::STDIO
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&mut self) -> Result<Option<Identity>> {
        let mut data = String::new();
        if self.is_stdio() {
            io::stdin().read_to_string(&mut data)?;
        } else {
            match fs::read_to_string(&self.path) {
                Ok(contents) => data = contents,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("no identity file at {}", self.path.display());
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if data.trim().is_empty() {
            return Ok(None);
        }
        let identity: serde_json::Result<Identity> = serde_json::from_str(&data);
        data.zeroize();
        Ok(Some(identity?))
    }

    fn save(&mut self, identity: &Identity) -> Result<()> {
        let mut json = serde_json::to_vec(identity)?;
        json.push(b'\n');

        let written = if self.is_stdio() {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&json).and_then(|_| stdout.flush())
        } else {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                // The open below reports the real failure if the directory is unusable.
                if let Err(e) = DirBuilder::new().recursive(true).mode(0o700).create(parent) {
                    warn!("failed to create {}: {}", parent.display(), e);
                }
            }
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .and_then(|mut file| file.write_all(&json))
        };
        json.zeroize();
        written?;

        debug!("saved identity to {}", self.path.display());
        Ok(())
    }
}
