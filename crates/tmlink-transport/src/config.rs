use std::time::Duration;

use serde::{Deserialize, Serialize};
use tmlink_frame::DEFAULT_MAX_PAYLOAD;

/// Payload size above which adaptive sends switch to the guaranteed path.
pub const DEFAULT_ADAPTIVE_THRESHOLD: usize = 4096;

/// Default receive scratch buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;

/// Send timeout applied when a connect is made without a timeout.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 1000;

/// Smallest receive scratch buffer the engine will allocate.
pub const MIN_RECV_BUFFER_SIZE: usize = 512;

/// Transport client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bytes requested per socket read. Floored at [`MIN_RECV_BUFFER_SIZE`].
    pub recv_buffer_size: usize,
    /// Largest payload accepted by the decoder.
    pub max_payload_size: usize,
    /// Payload size above which `send_frame_adaptive` uses `send_all`.
    pub adaptive_threshold: usize,
    /// Socket send timeout used when `connect` is given a zero timeout.
    /// Otherwise the connect timeout doubles as the send timeout.
    pub send_timeout_ms: u64,
}

impl ClientConfig {
    /// Config with an explicit receive buffer size and default limits.
    pub fn with_recv_buffer(recv_buffer_size: usize) -> Self {
        Self {
            recv_buffer_size,
            ..Self::default()
        }
    }

    /// Send timeout for a connection opened with `connect_timeout`.
    /// Never zero, so blocking writes are always bounded.
    pub fn send_timeout(&self, connect_timeout: Duration) -> Duration {
        if connect_timeout.is_zero() {
            Duration::from_millis(self.send_timeout_ms.max(1))
        } else {
            connect_timeout
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            adaptive_threshold: DEFAULT_ADAPTIVE_THRESHOLD,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }
}
