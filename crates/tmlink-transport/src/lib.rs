//! TCP transport for the robot control link.
//!
//! Provides the pieces between the socket and decoded frames:
//! - [`ByteAccumulator`]: FIFO byte buffer with cheap prefix consumption
//! - [`ReceiveEngine`]: one readiness wait and at most one read per poll
//! - [`TransportClient`]: connect-with-timeout, sends, and frame extraction
//! - [`Sender`]: cloneable write half shared with application threads
//!
//! Unix only: readiness waits are built on `poll(2)`.

pub mod accumulator;
pub mod client;
pub mod config;
pub mod error;
pub mod readiness;
pub mod receiver;
pub mod sender;

pub use accumulator::ByteAccumulator;
pub use client::{extract_frames, Drained, TransportClient, MAX_FRAMES_PER_DRAIN};
pub use config::ClientConfig;
pub use error::{Result, TransportError};
pub use readiness::{wait_ready, Interest, Readiness};
pub use receiver::{PollStatus, ReceiveEngine};
pub use sender::{SendStatus, Sender};
