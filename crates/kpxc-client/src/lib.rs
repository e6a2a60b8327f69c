//! Client for the KeePassXC browser-integration protocol.
//!
//! A [`Session`] wraps one connection to the browser proxy socket.
//! [`Handshake`] exchanges keys and makes sure the stored [`Identity`] is
//! paired, after which the typed actions (`get_logins`, `get_totp`) run over
//! the encrypted channel.
//!
//! ```no_run
//! # async fn demo() -> kpxc_client::Result<()> {
//! use kpxc_client::{Handshake, HandshakeOptions, Identity, MemoryIdentityStore, Session};
//!
//! let stream = tokio::net::UnixStream::connect("/run/user/1000/kpxc_server").await?;
//! let mut store = MemoryIdentityStore::default();
//! let mut session = Session::new(stream, Identity::generate());
//! Handshake::new(HandshakeOptions::default())
//!     .run(&mut session, &mut store)
//!     .await?;
//! let entries = session.get_logins("https://example.com").await?;
//! # drop(entries);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod actions;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod session;

pub use codec::JsonCodec;
pub use dispatch::RetryPolicy;
pub use error::{ClientError, Result};
pub use handshake::{Handshake, HandshakeOptions, HandshakeReport, HandshakeState, RetryReason};
pub use identity::{FileIdentityStore, Identity, IdentityStore, MemoryIdentityStore};
pub use session::Session;
