//! Listener traits for channel events.
//!
//! Every method has a default that logs the event, so implementors only
//! override what they consume. Methods run on the channel's worker thread.

use tmlink_frame::{ErrorReport, Script, StateReport, Status};
use tmlink_state::SharedState;
use tracing::info;

/// Events from a [`StateChannel`](crate::StateChannel).
pub trait StateEvents: Send + 'static {
    /// A reply to a write request.
    fn on_response(&mut self, report: &StateReport) {
        info!(
            id = %report.id,
            code = ?report.code,
            content = %report.content_str(),
            "state response"
        );
    }

    /// A reply to a read request.
    fn on_read(&mut self, report: &StateReport) {
        info!(id = %report.id, content = %report.content_str(), "state read");
    }

    /// Called once per batch after binary state records were published.
    fn on_feedback(&mut self, _state: &SharedState) {}

    /// A controller error report.
    fn on_error(&mut self, _report: &ErrorReport) {}
}

/// Events from a [`ScriptChannel`](crate::ScriptChannel).
pub trait ScriptEvents: Send + 'static {
    /// A script reply.
    fn on_script(&mut self, script: &Script) {
        let outcome = if script.has_error { "err" } else { "res" };
        info!(id = %script.id, outcome, script = %script.script, "script reply");
    }

    /// A status reply.
    fn on_status(&mut self, status: &Status) {
        info!(subcmd = %status.subcmd, subdata = %status.subdata, "status reply");
    }

    /// A controller error report.
    fn on_error(&mut self, _report: &ErrorReport) {}
}

/// Listener that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEvents;

impl StateEvents for LogEvents {}

impl ScriptEvents for LogEvents {}
