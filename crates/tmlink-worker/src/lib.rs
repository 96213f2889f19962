//! Connection worker and protocol channels.
//!
//! [`ConnectionWorker`] owns one [`TransportClient`](tmlink_transport::TransportClient)
//! on a dedicated thread and runs a connect, receive, back off, reconnect
//! loop, handing decoded frames to a [`FrameHandler`]. The two channels built
//! on it speak the controller's sub-protocols:
//! - [`StateChannel`]: state reports (`TMSVR`) decoded into a shared snapshot
//! - [`ScriptChannel`]: scripts (`TMSCT`) and status queries (`TMSTA`)

pub mod config;
pub mod error;
pub mod events;
pub mod script;
pub mod state;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use events::{LogEvents, ScriptEvents, StateEvents};
pub use script::{ScriptChannel, ScriptHandler, SCRIPT_PORT, SCRIPT_RECV_BUFFER};
pub use state::{StateChannel, StateHandler, STATE_PORT, STATE_RECV_BUFFER};
pub use worker::{ConnectionWorker, FrameHandler, Handled, WorkerState};
