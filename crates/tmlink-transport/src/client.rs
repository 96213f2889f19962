use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::AsFd;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tmlink_frame::{decode_frame, Frame};
use tracing::{debug, info, warn};

use crate::accumulator::ByteAccumulator;
use crate::config::ClientConfig;
use crate::error::{Result, TransportError};
use crate::readiness::{wait_ready, Interest, Readiness};
use crate::receiver::{PollStatus, ReceiveEngine};
use crate::sender::{SendStatus, Sender};

/// Decode attempts per [`TransportClient::drain_once`] call.
pub const MAX_FRAMES_PER_DRAIN: usize = 10;

/// Result of one receive-and-decode pass.
#[derive(Debug)]
pub enum Drained {
    /// One or more valid frames, in arrival order.
    Frames(Vec<Frame>),
    /// Bytes arrived but no complete valid frame could be extracted.
    NoValidFrame,
    /// Nothing arrived within the timeout.
    Timeout,
    /// The receiver is not prepared or the socket is unusable.
    NotReady,
    /// The peer closed the connection.
    PeerClosed,
}

impl Drained {
    /// Returns true when the connection should be dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Drained::NotReady | Drained::PeerClosed)
    }
}

/// TCP client for one controller endpoint.
///
/// Owns the connection lifecycle, a [`ReceiveEngine`] over a cloned handle of
/// the socket, and a [`Sender`] that can be handed to other threads.
#[derive(Debug)]
pub struct TransportClient {
    host: String,
    port: u16,
    config: ClientConfig,
    stream: Option<TcpStream>,
    receiver: ReceiveEngine<TcpStream>,
    sender: Sender,
}

impl TransportClient {
    /// Create an unconnected client with the default configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(host, port, ClientConfig::default())
    }

    /// Create an unconnected client with an explicit configuration.
    pub fn with_config(host: impl Into<String>, port: u16, config: ClientConfig) -> Self {
        Self {
            host: host.into(),
            port,
            receiver: ReceiveEngine::new(config.recv_buffer_size),
            sender: Sender::new(config.adaptive_threshold),
            config,
            stream: None,
        }
    }

    /// Configured host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` for logs and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns true while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// A handle for sending on this client's current connection.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Connect with a bounded wait. A no-op when already connected.
    ///
    /// Every resolved address is tried in order; the last failure is returned.
    pub fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let endpoint = self.endpoint();
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                endpoint: endpoint.clone(),
                source,
            })?;

        let mut last_err = None;
        for addr in addrs {
            match open_stream(addr, &endpoint, timeout, self.config.send_timeout(timeout)) {
                Ok(stream) => {
                    let writer = stream.try_clone()?;
                    self.sender.attach(writer);
                    self.stream = Some(stream);
                    info!(endpoint = %endpoint, "connected");
                    return Ok(());
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::Resolve {
            endpoint,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
        }))
    }

    /// Close the connection and drop all buffered input. Idempotent.
    pub fn close(&mut self) {
        self.receiver.reset();
        self.sender.detach();
        if self.stream.take().is_some() {
            info!(endpoint = %self.endpoint(), "connection closed");
        }
    }

    /// Bind the receive engine to the current connection.
    pub fn prepare_receiver(&mut self) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            return false;
        };
        match stream.try_clone() {
            Ok(reader) => {
                self.receiver.bind(reader);
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to clone socket for receiver");
                false
            }
        }
    }

    /// Poll once, then extract up to [`MAX_FRAMES_PER_DRAIN`] frames.
    pub fn drain_once(&mut self, timeout: Duration) -> Result<Drained> {
        match self.receiver.poll(timeout)? {
            PollStatus::Data(_) => {}
            PollStatus::Timeout => return Ok(Drained::Timeout),
            PollStatus::NotReady => return Ok(Drained::NotReady),
            PollStatus::PeerClosed => return Ok(Drained::PeerClosed),
        }

        let frames = extract_frames(self.receiver.buffer_mut(), self.config.max_payload_size);
        if frames.is_empty() {
            Ok(Drained::NoValidFrame)
        } else {
            Ok(Drained::Frames(frames))
        }
    }

    /// Bytes received but not yet consumed as frames.
    pub fn buffered(&self) -> usize {
        self.receiver.buffer().len()
    }

    /// Issue a single write on the current connection. See [`Sender::send`].
    pub fn send(&self, bytes: &[u8]) -> Result<SendStatus> {
        self.sender.send(bytes)
    }

    /// Write every byte on the current connection. See [`Sender::send_all`].
    pub fn send_all(&self, bytes: &[u8]) -> Result<usize> {
        self.sender.send_all(bytes)
    }

    /// Encode `frame` and issue a single write.
    pub fn send_frame(&self, frame: &mut Frame) -> Result<SendStatus> {
        self.sender.send_frame(frame)
    }

    /// Encode `frame` and write it completely.
    pub fn send_frame_all(&self, frame: &mut Frame) -> Result<usize> {
        self.sender.send_frame_all(frame)
    }

    /// Encode `frame` and pick the write path by payload size.
    pub fn send_frame_adaptive(&self, frame: &mut Frame) -> Result<SendStatus> {
        self.sender.send_frame_adaptive(frame)
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decode frames from the front of `buffer`.
///
/// Stops at an incomplete frame, an empty buffer, or after
/// [`MAX_FRAMES_PER_DRAIN`] attempts. Invalid frames are consumed and logged.
pub fn extract_frames(buffer: &mut ByteAccumulator, max_payload: usize) -> Vec<Frame> {
    let mut frames = Vec::new();
    for _ in 0..MAX_FRAMES_PER_DRAIN {
        if buffer.is_empty() {
            break;
        }
        let (frame, consumed) = decode_frame(buffer.as_slice(), max_payload);
        if !frame.complete {
            break;
        }
        buffer.pop_front(consumed);
        if frame.valid {
            frames.push(frame);
        } else {
            warn!(
                kind = %frame.kind,
                consumed,
                fault = ?frame.fault,
                "discarding invalid frame"
            );
        }
    }
    frames
}

fn open_stream(
    addr: SocketAddr,
    endpoint: &str,
    timeout: Duration,
    send_timeout: Duration,
) -> Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;

    if let Err(err) = socket.set_nodelay(true) {
        warn!(error = %err, "failed to set TCP_NODELAY");
    }
    if let Err(err) = socket.set_reuse_address(true) {
        warn!(error = %err, "failed to set SO_REUSEADDR");
    }
    if let Err(err) = socket.set_write_timeout(Some(send_timeout)) {
        warn!(error = %err, "failed to set send timeout");
    }

    let connect_err = |source| TransportError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };

    match socket.connect(&addr.into()) {
        Ok(()) => {}
        Err(err)
            if err.raw_os_error() == Some(libc::EINPROGRESS)
                || err.kind() == io::ErrorKind::WouldBlock =>
        {
            match wait_ready(socket.as_fd(), Interest::Write, timeout)? {
                Readiness::Ready => {}
                Readiness::Timeout => {
                    return Err(TransportError::ConnectTimeout {
                        endpoint: endpoint.to_string(),
                        timeout,
                    })
                }
                Readiness::NotReady => {
                    return Err(connect_err(io::Error::other("socket not writable")))
                }
            }
            if let Some(err) = socket.take_error()? {
                return Err(connect_err(err));
            }
        }
        Err(err) => return Err(connect_err(err)),
    }

    socket.set_nonblocking(false)?;
    Ok(socket.into())
}
