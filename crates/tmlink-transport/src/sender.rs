use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use tmlink_frame::Frame;
use tracing::{debug, warn};

use crate::config::DEFAULT_ADAPTIVE_THRESHOLD;
use crate::error::{Result, TransportError};

/// Outcome of a single-write send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Every byte was written.
    Complete,
    /// The kernel accepted only a prefix.
    Partial { sent: usize, total: usize },
}

/// Cloneable write half of a [`TransportClient`](crate::TransportClient).
///
/// All clones share one slot. The client fills it on connect and empties it
/// on close, so a `Sender` held by another thread always writes to the
/// current connection or fails with [`TransportError::NotConnected`].
/// Writes are serialized, so concurrent frames never interleave.
#[derive(Debug, Clone)]
pub struct Sender {
    slot: Arc<Mutex<Option<TcpStream>>>,
    adaptive_threshold: usize,
}

impl Default for Sender {
    fn default() -> Self {
        Self::new(DEFAULT_ADAPTIVE_THRESHOLD)
    }
}

impl Sender {
    pub(crate) fn new(adaptive_threshold: usize) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            adaptive_threshold,
        }
    }

    pub(crate) fn attach(&self, stream: TcpStream) {
        *self.lock() = Some(stream);
    }

    pub(crate) fn detach(&self) {
        self.lock().take();
    }

    /// Returns true while a connection is attached.
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Shut the live socket down in both directions.
    ///
    /// The reader observes end-of-stream on its next poll, which makes the
    /// connection worker drop the link and reconnect.
    pub fn reset(&self) {
        if let Some(stream) = self.lock().as_ref() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                debug!(error = %err, "shutdown on reset failed");
            }
        }
    }

    /// Issue a single write. May send only a prefix.
    pub fn send(&self, bytes: &[u8]) -> Result<SendStatus> {
        let mut guard = self.lock();
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
        if bytes.is_empty() {
            return Ok(SendStatus::Complete);
        }

        let sent = loop {
            match stream.write(bytes) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        };

        if sent < bytes.len() {
            warn!(sent, total = bytes.len(), "partial send");
            Ok(SendStatus::Partial {
                sent,
                total: bytes.len(),
            })
        } else {
            Ok(SendStatus::Complete)
        }
    }

    /// Write until every byte is sent, the peer closes, or a write fails.
    /// Returns the number of bytes written.
    pub fn send_all(&self, bytes: &[u8]) -> Result<usize> {
        let mut guard = self.lock();
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let mut written = 0;
        while written < bytes.len() {
            match stream.write(&bytes[written..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(written)
    }

    /// Encode `frame` and issue a single write.
    pub fn send_frame(&self, frame: &mut Frame) -> Result<SendStatus> {
        let buf = encode(frame);
        self.send(&buf)
    }

    /// Encode `frame` and write it completely.
    pub fn send_frame_all(&self, frame: &mut Frame) -> Result<usize> {
        let buf = encode(frame);
        self.send_all(&buf)
    }

    /// Single write for small frames, guaranteed write once the payload
    /// exceeds the adaptive threshold.
    pub fn send_frame_adaptive(&self, frame: &mut Frame) -> Result<SendStatus> {
        if frame.payload.len() > self.adaptive_threshold {
            self.send_frame_all(frame).map(|_| SendStatus::Complete)
        } else {
            self.send_frame(frame)
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode(frame: &mut Frame) -> BytesMut {
    let mut buf = BytesMut::with_capacity(frame.payload.len() + 32);
    frame.encode(&mut buf);
    debug!(kind = %frame.kind, size = frame.size, checksum = frame.checksum, "sending frame");
    buf
}
