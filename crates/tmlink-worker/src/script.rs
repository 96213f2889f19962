use std::time::Duration;

use tmlink_frame::{ErrorReport, Frame, FrameKind, Payload, Script, Status};
use tmlink_transport::{ClientConfig, Sender, TransportClient};
use tracing::{error, warn};

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::events::{LogEvents, ScriptEvents};
use crate::worker::{ConnectionWorker, FrameHandler, Handled};

/// Default script port.
pub const SCRIPT_PORT: u16 = 5890;

/// Default receive buffer for the script channel.
pub const SCRIPT_RECV_BUFFER: usize = 2048;

const CHANNEL_NAME: &str = "TM_SCT";

/// Frame handler for script and status replies.
#[derive(Debug)]
pub struct ScriptHandler<E> {
    events: E,
}

impl<E: ScriptEvents> ScriptHandler<E> {
    /// Handler delivering replies to `events`.
    pub fn new(events: E) -> Self {
        Self { events }
    }

    /// The event listener.
    pub fn events(&self) -> &E {
        &self.events
    }

    /// Mutable access to the event listener.
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }
}

impl<E: ScriptEvents> FrameHandler for ScriptHandler<E> {
    fn on_frames(&mut self, frames: Vec<Frame>) -> Handled {
        for frame in &frames {
            match frame.kind {
                FrameKind::Script => match Script::from_frame(frame) {
                    Ok(script) => self.events.on_script(&script),
                    Err(err) => warn!(error = %err, "malformed script reply"),
                },
                FrameKind::Status => match Status::from_frame(frame) {
                    Ok(status) => self.events.on_status(&status),
                    Err(err) => warn!(error = %err, "malformed status reply"),
                },
                FrameKind::Error => match ErrorReport::from_frame(frame) {
                    Ok(report) => {
                        warn!(code = ?report.code, "controller error report");
                        self.events.on_error(&report);
                    }
                    Err(err) => warn!(error = %err, "malformed error report"),
                },
                ref kind => error!(%kind, "unexpected frame on script channel"),
            }
        }
        Handled::Continue
    }
}

/// Script channel: sends scripts and status queries, reports replies.
#[derive(Debug)]
pub struct ScriptChannel<E: ScriptEvents = LogEvents> {
    worker: ConnectionWorker<ScriptHandler<E>>,
}

impl ScriptChannel<LogEvents> {
    /// Channel to `host` on the default port with logging listeners.
    pub fn connect_to(host: impl Into<String>) -> Self {
        Self::new(host, LogEvents)
    }
}

impl<E: ScriptEvents> ScriptChannel<E> {
    /// Channel to `host` on the default port.
    pub fn new(host: impl Into<String>, events: E) -> Self {
        Self::with_config(
            host,
            SCRIPT_PORT,
            ClientConfig::with_recv_buffer(SCRIPT_RECV_BUFFER),
            WorkerConfig::named(CHANNEL_NAME),
            events,
        )
    }

    /// Channel with explicit endpoint, transport and worker settings.
    pub fn with_config(
        host: impl Into<String>,
        port: u16,
        client: ClientConfig,
        worker: WorkerConfig,
        events: E,
    ) -> Self {
        let client = TransportClient::with_config(host, port, client);
        Self {
            worker: ConnectionWorker::new(client, ScriptHandler::new(events), worker),
        }
    }

    /// The underlying connection worker.
    pub fn worker(&self) -> &ConnectionWorker<ScriptHandler<E>> {
        &self.worker
    }

    /// Mutable access to the connection worker.
    pub fn worker_mut(&mut self) -> &mut ConnectionWorker<ScriptHandler<E>> {
        &mut self.worker
    }

    /// Handle for sending on the current connection.
    pub fn sender(&self) -> Sender {
        self.worker.sender()
    }

    /// Connect and start the worker thread. See [`ConnectionWorker::start`].
    pub fn start(&mut self, timeout: Duration) -> Result<()> {
        self.worker.start(timeout)
    }

    /// Stop the worker thread and close the connection.
    pub fn stop(&mut self) {
        self.worker.stop();
    }

    /// Send `script` tagged with `id`.
    pub fn send_script(&self, id: &str, script: &str) -> Result<()> {
        let mut frame = Script::new(id, script).to_frame();
        self.worker.sender().send_frame_all(&mut frame)?;
        Ok(())
    }

    /// Send a status query.
    pub fn send_status_request(&self, subcmd: &str, subdata: &str) -> Result<()> {
        let mut frame = Status::new(subcmd, subdata).to_frame();
        self.worker.sender().send_frame_all(&mut frame)?;
        Ok(())
    }
}
