//! JSON document codec over a byte stream.
//!
//! The proxy socket has no length framing: each side writes one JSON
//! document per message. Reads accumulate bytes until the buffer holds a
//! complete document, then hand back whatever follows it for the next read.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

const READ_CHUNK: usize = 16 * 1024;

/// Writes and reads whole JSON documents on a stream.
#[derive(Debug)]
pub struct JsonCodec<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S> JsonCodec<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// Serialize `message` and write it as one newline-terminated document.
    pub async fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let mut bytes = serde_json::to_vec(message)?;
        bytes.push(b'\n');
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next complete JSON document.
    ///
    /// # Errors
    /// `Io(UnexpectedEof)` if the peer closes before a full document arrives,
    /// `Json` if the bytes are not valid JSON for `T`.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<T> {
        loop {
            if let Some(message) = self.try_decode()? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )
                .into());
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Send a request and wait for its response.
    pub async fn round_trip<Req, Resp>(&mut self, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.send(request).await?;
        self.recv().await
    }

    fn try_decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            self.buf.clear();
            return Ok(None);
        }

        let (message, consumed) = {
            let mut documents = serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
            match documents.next() {
                Some(Ok(message)) => (message, documents.byte_offset()),
                Some(Err(e)) if e.is_eof() => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        };
        self.buf.drain(..consumed);
        Ok(Some(message))
    }
}
