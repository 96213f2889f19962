//! Client protocol stack for TCP industrial robot controllers.
//!
//! tmlink speaks the controller's framed text protocol over TCP: it builds
//! and validates `$TOKEN,LEN,PAYLOAD,*HH\r\n` frames, keeps a reconnecting
//! connection per channel on its own thread, and decodes the binary state
//! stream into a shared, unit-converted snapshot.
//!
//! # Crate Structure
//!
//! - [`frame`]: Envelope codec and sub-protocol payloads
//! - [`transport`]: TCP client, receive engine and frame extraction
//! - [`state`]: State record deserializer and shared snapshot
//! - [`worker`]: Connection worker and protocol channels (behind `worker` feature)
//! - [`logging`]: Subscriber setup for applications (behind `logging` feature)

/// Re-export frame types.
pub mod frame {
    pub use tmlink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use tmlink_transport::*;
}

/// Re-export state types.
pub mod state {
    pub use tmlink_state::*;
}

/// Re-export worker types (requires `worker` feature).
#[cfg(feature = "worker")]
pub mod worker {
    pub use tmlink_worker::*;
}

#[cfg(feature = "logging")]
pub mod logging;
