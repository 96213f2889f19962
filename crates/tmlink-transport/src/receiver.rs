use std::io::{self, Read};
use std::os::fd::AsFd;
use std::time::Duration;

use tracing::trace;

use crate::accumulator::ByteAccumulator;
use crate::config::MIN_RECV_BUFFER_SIZE;
use crate::error::Result;
use crate::readiness::{wait_ready, Interest, Readiness};

/// Shortest readiness wait per poll.
pub const MIN_POLL_TIMEOUT: Duration = Duration::from_millis(8);

/// Outcome of one [`ReceiveEngine::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No data arrived within the timeout.
    Timeout,
    /// This many bytes were appended to the buffer.
    Data(usize),
    /// The peer performed an orderly shutdown.
    PeerClosed,
    /// No stream is bound, or the wait returned without the stream ready.
    NotReady,
}

/// Single-shot receive loop over a bound stream.
///
/// Each poll performs at most one readiness wait and at most one read.
/// Read bytes are appended to an internal [`ByteAccumulator`] that the owner
/// drains with a frame decoder.
#[derive(Debug)]
pub struct ReceiveEngine<S> {
    stream: Option<S>,
    buffer: ByteAccumulator,
    scratch: Vec<u8>,
}

impl<S: Read + AsFd> ReceiveEngine<S> {
    /// Create an unbound engine reading up to `recv_buffer_size` bytes per poll.
    pub fn new(recv_buffer_size: usize) -> Self {
        Self {
            stream: None,
            buffer: ByteAccumulator::new(),
            scratch: vec![0; recv_buffer_size.max(MIN_RECV_BUFFER_SIZE)],
        }
    }

    /// Bind a stream, discarding any bytes buffered from a previous one.
    pub fn bind(&mut self, stream: S) {
        self.stream = Some(stream);
        self.buffer.clear();
    }

    /// Drop the bound stream and buffered bytes.
    pub fn reset(&mut self) {
        self.stream = None;
        self.buffer.clear();
    }

    /// Returns true when a stream is bound.
    pub fn is_bound(&self) -> bool {
        self.stream.is_some()
    }

    /// Size of each read.
    pub fn scratch_size(&self) -> usize {
        self.scratch.len()
    }

    /// Bytes received but not yet consumed.
    pub fn buffer(&self) -> &ByteAccumulator {
        &self.buffer
    }

    /// Mutable access for frame extraction.
    pub fn buffer_mut(&mut self) -> &mut ByteAccumulator {
        &mut self.buffer
    }

    /// Wait up to `timeout` (at least [`MIN_POLL_TIMEOUT`]) and read once.
    pub fn poll(&mut self, timeout: Duration) -> Result<PollStatus> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(PollStatus::NotReady);
        };

        match wait_ready(stream.as_fd(), Interest::Read, timeout.max(MIN_POLL_TIMEOUT))? {
            Readiness::Ready => {}
            Readiness::Timeout => return Ok(PollStatus::Timeout),
            Readiness::NotReady => return Ok(PollStatus::NotReady),
        }

        let n = loop {
            match stream.read(&mut self.scratch) {
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(PollStatus::Timeout)
                }
                Err(err) => return Err(err.into()),
            }
        };

        if n == 0 {
            return Ok(PollStatus::PeerClosed);
        }

        self.buffer.append(&self.scratch[..n]);
        trace!(bytes = n, buffered = self.buffer.len(), "received");
        Ok(PollStatus::Data(n))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    use super::*;

    #[test]
    fn unbound_engine_is_not_ready() {
        let mut engine = ReceiveEngine::<UnixStream>::new(1024);
        assert!(!engine.is_bound());
        assert_eq!(engine.poll(Duration::from_millis(1)).unwrap(), PollStatus::NotReady);
    }

    #[test]
    fn scratch_size_is_floored() {
        let engine = ReceiveEngine::<UnixStream>::new(16);
        assert_eq!(engine.scratch_size(), MIN_RECV_BUFFER_SIZE);
        let engine = ReceiveEngine::<UnixStream>::new(4096);
        assert_eq!(engine.scratch_size(), 4096);
    }

    #[test]
    fn timeout_is_floored() {
        let (left, _right) = UnixStream::pair().unwrap();
        let mut engine = ReceiveEngine::new(1024);
        engine.bind(left);

        let start = Instant::now();
        assert_eq!(engine.poll(Duration::ZERO).unwrap(), PollStatus::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(7));
    }

    #[test]
    fn data_is_appended() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let mut engine = ReceiveEngine::new(1024);
        engine.bind(left);

        right.write_all(b"$TMSVR,").unwrap();
        assert_eq!(engine.poll(Duration::from_millis(100)).unwrap(), PollStatus::Data(7));
        right.write_all(b"1,x").unwrap();
        assert_eq!(engine.poll(Duration::from_millis(100)).unwrap(), PollStatus::Data(3));
        assert_eq!(engine.buffer().as_slice(), b"$TMSVR,1,x");
    }

    #[test]
    fn one_read_per_poll() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let mut engine = ReceiveEngine::new(16);
        engine.bind(left);

        right.write_all(&[b'a'; 2000]).unwrap();
        assert_eq!(
            engine.poll(Duration::from_millis(100)).unwrap(),
            PollStatus::Data(MIN_RECV_BUFFER_SIZE)
        );
        assert_eq!(engine.buffer().len(), MIN_RECV_BUFFER_SIZE);
    }

    #[test]
    fn orderly_shutdown_reports_peer_closed() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut engine = ReceiveEngine::new(1024);
        engine.bind(left);
        drop(right);

        assert_eq!(engine.poll(Duration::from_millis(100)).unwrap(), PollStatus::PeerClosed);
    }

    #[test]
    fn rebind_discards_buffered_bytes() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let mut engine = ReceiveEngine::new(1024);
        engine.bind(left);
        right.write_all(b"stale").unwrap();
        engine.poll(Duration::from_millis(100)).unwrap();
        assert!(!engine.buffer().is_empty());

        let (fresh, _peer) = UnixStream::pair().unwrap();
        engine.bind(fresh);
        assert!(engine.buffer().is_empty());

        engine.reset();
        assert!(!engine.is_bound());
    }
}
