use std::time::Duration;

use tmlink_frame::{ErrorReport, Frame, FrameKind, Payload, StateMode, StateReport};
use tmlink_state::{SharedState, StateDeserializer};
use tmlink_transport::{ClientConfig, Sender, TransportClient};
use tracing::{debug, error, warn};

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::events::{LogEvents, StateEvents};
use crate::worker::{ConnectionWorker, FrameHandler, Handled};

/// Default state report port.
pub const STATE_PORT: u16 = 5891;

/// Default receive buffer for the state channel.
pub const STATE_RECV_BUFFER: usize = 4096;

const CHANNEL_NAME: &str = "TM_SVR";

/// Frame handler for the state report protocol.
#[derive(Debug)]
pub struct StateHandler<E> {
    decoder: StateDeserializer,
    state: SharedState,
    events: E,
}

impl<E: StateEvents> StateHandler<E> {
    /// Handler publishing into `state` and delivering events to `events`.
    pub fn new(state: SharedState, events: E) -> Self {
        Self {
            decoder: StateDeserializer::new(),
            state,
            events,
        }
    }

    /// The event listener.
    pub fn events(&self) -> &E {
        &self.events
    }

    /// Mutable access to the event listener.
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// The state record deserializer and its learned plan.
    pub fn decoder(&self) -> &StateDeserializer {
        &self.decoder
    }

    fn handle_report(&mut self, report: &StateReport) -> bool {
        match report.mode {
            StateMode::Response => self.events.on_response(report),
            StateMode::Binary => {
                match self
                    .decoder
                    .decode_record_with_lock(&report.content, &self.state)
                {
                    Ok(summary) => {
                        debug!(id = %report.id, items = summary.items, "state record published");
                        return true;
                    }
                    Err(err) => warn!(id = %report.id, error = %err, "state record rejected"),
                }
            }
            StateMode::ReadString | StateMode::ReadJson => self.events.on_read(report),
            mode => warn!(id = %report.id, ?mode, "unsupported state report mode"),
        }
        false
    }
}

impl<E: StateEvents> FrameHandler for StateHandler<E> {
    fn on_frames(&mut self, frames: Vec<Frame>) -> Handled {
        let mut published = false;
        for frame in &frames {
            match frame.kind {
                FrameKind::StateReport => match StateReport::from_frame(frame) {
                    Ok(report) => published |= self.handle_report(&report),
                    Err(err) => warn!(error = %err, "malformed state report"),
                },
                FrameKind::Error => match ErrorReport::from_frame(frame) {
                    Ok(report) => {
                        warn!(code = ?report.code, "controller error report");
                        self.events.on_error(&report);
                    }
                    Err(err) => warn!(error = %err, "malformed error report"),
                },
                ref kind => error!(%kind, "unexpected frame on state channel"),
            }
        }
        if published {
            self.events.on_feedback(&self.state);
        }
        Handled::Continue
    }
}

/// State report channel: a [`ConnectionWorker`] publishing into a
/// [`SharedState`].
#[derive(Debug)]
pub struct StateChannel<E: StateEvents = LogEvents> {
    worker: ConnectionWorker<StateHandler<E>>,
    state: SharedState,
}

impl StateChannel<LogEvents> {
    /// Channel to `host` on the default port with logging listeners.
    pub fn connect_to(host: impl Into<String>) -> Self {
        Self::new(host, LogEvents)
    }
}

impl<E: StateEvents> StateChannel<E> {
    /// Channel to `host` on the default port.
    pub fn new(host: impl Into<String>, events: E) -> Self {
        Self::with_config(
            host,
            STATE_PORT,
            ClientConfig::with_recv_buffer(STATE_RECV_BUFFER),
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
        let state = SharedState::new();
        let client = TransportClient::with_config(host, port, client);
        let handler = StateHandler::new(state.clone(), events);
        Self {
            worker: ConnectionWorker::new(client, handler, worker),
            state,
        }
    }

    /// The published robot state.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// The underlying connection worker.
    pub fn worker(&self) -> &ConnectionWorker<StateHandler<E>> {
        &self.worker
    }

    /// Mutable access to the connection worker.
    pub fn worker_mut(&mut self) -> &mut ConnectionWorker<StateHandler<E>> {
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

    /// Send a state report with `content` in `mode`.
    ///
    /// A failed send forces a reconnect.
    pub fn send_content(&self, id: &str, mode: StateMode, content: &[u8]) -> Result<()> {
        let mut frame = StateReport::new(id, mode, content.to_vec()).to_frame();
        if let Err(err) = self.worker.sender().send_frame_all(&mut frame) {
            warn!(channel = CHANNEL_NAME, error = %err, "send failed, forcing reconnect");
            self.worker.request_reconnect();
            return Err(err.into());
        }
        Ok(())
    }
}
