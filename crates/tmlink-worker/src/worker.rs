use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tmlink_frame::Frame;
use tmlink_transport::{Drained, Sender, TransportClient};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};

/// Backoff sleep granularity.
const TICK_MS: u64 = 10;
const TICK: Duration = Duration::from_millis(TICK_MS);

/// Pause between loop iterations when reconnects are disabled, and before an
/// immediate reconnect.
const SHORT_SLEEP: Duration = Duration::from_millis(100);

/// Ticks between countdown log lines.
const COUNTDOWN_LOG_TICKS: u64 = 50;

/// What the worker should do after a batch of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Keep receiving on this connection.
    Continue,
    /// Drop the connection and go through backoff.
    Reconnect,
}

/// Per-protocol frame consumer, run inline on the worker thread.
pub trait FrameHandler: Send + 'static {
    /// Handle the frames extracted by one receive pass, in arrival order.
    fn on_frames(&mut self, frames: Vec<Frame>) -> Handled;
}

/// Where the worker loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// No thread is running.
    Stopped = 0,
    /// A connect attempt is in progress.
    Connecting = 1,
    /// Connected and polling for frames.
    Receiving = 2,
    /// Waiting out the reconnect interval.
    Backoff = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Connecting,
            2 => WorkerState::Receiving,
            3 => WorkerState::Backoff,
            _ => WorkerState::Stopped,
        }
    }
}

type Liveness = Arc<dyn Fn() -> bool + Send + Sync>;

/// What the worker thread hands back on join.
type Parts<H> = (TransportClient, H);

/// Body of the worker thread.
type ThreadBody<H> = Box<dyn FnOnce() -> Option<Parts<H>> + Send>;

struct Shared {
    name: String,
    poll_timeout: Duration,
    keep_alive: AtomicBool,
    reconnect_interval_ms: AtomicI64,
    reconnect_timeout_ms: AtomicU64,
    connect_attempts: AtomicU64,
    state: AtomicU8,
    liveness: Mutex<Liveness>,
}

impl Shared {
    fn keep_alive(&self) -> bool {
        self.keep_alive.load(Ordering::Acquire)
    }

    fn is_live(&self) -> bool {
        let liveness = Arc::clone(&self.liveness.lock().unwrap_or_else(PoisonError::into_inner));
        liveness()
    }

    /// Outer loop condition.
    fn should_run(&self) -> bool {
        self.keep_alive() && self.is_live()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms.load(Ordering::Acquire))
    }

    fn connect(&self, client: &mut TransportClient, timeout: Duration) {
        self.set_state(WorkerState::Connecting);
        self.connect_attempts.fetch_add(1, Ordering::AcqRel);
        info!(channel = %self.name, endpoint = %client.endpoint(), ?timeout, "connecting");
        if let Err(err) = client.connect(timeout) {
            warn!(channel = %self.name, error = %err, "connect failed");
        }
    }
}

/// Runs one [`TransportClient`] on a dedicated thread.
///
/// The loop connects, receives until the transport fails or the handler asks
/// for a reconnect, then backs off and reconnects. It runs while keep-alive
/// is set and the liveness predicate holds. Stopping is cooperative: worst
/// case latency is one poll timeout plus one backoff tick.
pub struct ConnectionWorker<H: FrameHandler> {
    shared: Arc<Shared>,
    sender: Sender,
    parked: Option<Parts<H>>,
    thread: Option<JoinHandle<Option<Parts<H>>>>,
}

impl<H: FrameHandler> ConnectionWorker<H> {
    /// A stopped worker owning `client` and `handler`.
    pub fn new(client: TransportClient, handler: H, config: WorkerConfig) -> Self {
        let shared = Shared {
            poll_timeout: config.poll_timeout(),
            keep_alive: AtomicBool::new(false),
            reconnect_interval_ms: AtomicI64::new(config.reconnect_interval_ms),
            reconnect_timeout_ms: AtomicU64::new(config.reconnect_timeout_ms),
            connect_attempts: AtomicU64::new(0),
            state: AtomicU8::new(WorkerState::Stopped as u8),
            liveness: Mutex::new(Arc::new(|| true) as Liveness),
            name: config.name,
        };
        Self {
            shared: Arc::new(shared),
            sender: client.sender(),
            parked: Some((client, handler)),
            thread: None,
        }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Stop any previous run, make one connect attempt, and spawn the loop.
    ///
    /// A failed connect does not prevent the start; the loop retries it
    /// through backoff. If the thread cannot be spawned the client and
    /// handler stay with the worker, so a later `start` can retry.
    pub fn start(&mut self, timeout: Duration) -> Result<()> {
        self.start_with(timeout, |builder, body| builder.spawn(body))
    }

    fn start_with<S>(&mut self, timeout: Duration, spawn: S) -> Result<()>
    where
        S: FnOnce(thread::Builder, ThreadBody<H>) -> io::Result<JoinHandle<Option<Parts<H>>>>,
    {
        self.stop();
        let (mut client, handler) = self
            .parked
            .take()
            .ok_or_else(|| WorkerError::Unavailable(self.shared.name.clone()))?;

        self.shared.keep_alive.store(true, Ordering::Release);
        self.shared.connect(&mut client, timeout);

        // Handed over through a slot so a failed spawn can give them back.
        let handoff = Arc::new(Mutex::new(Some((client, handler))));
        let slot = Arc::clone(&handoff);
        let shared = Arc::clone(&self.shared);
        let body: ThreadBody<H> = Box::new(move || {
            let (client, handler) = slot.lock().unwrap_or_else(PoisonError::into_inner).take()?;
            Some(run(&shared, client, handler))
        });

        let builder = thread::Builder::new().name(self.shared.name.clone());
        match spawn(builder, body) {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(err) => {
                error!(channel = %self.shared.name, error = %err, "failed to spawn worker thread");
                self.shared.keep_alive.store(false, Ordering::Release);
                self.shared.set_state(WorkerState::Stopped);
                let mut parts = handoff.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some((client, _)) = parts.as_mut() {
                    client.close();
                }
                self.parked = parts;
                Err(WorkerError::Spawn(err))
            }
        }
    }

    /// Start with the configured reconnect timeout.
    pub fn start_default(&mut self) -> Result<()> {
        self.start(self.shared.reconnect_timeout())
    }

    /// Clear keep-alive and join the thread. Idempotent.
    pub fn stop(&mut self) {
        self.shared.keep_alive.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(parts) => self.parked = parts,
                Err(_) => error!(channel = %self.shared.name, "worker thread panicked"),
            }
        }
        self.shared.set_state(WorkerState::Stopped);
    }

    /// Returns true while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Where the loop currently is.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Connection attempts made so far, including the one in `start`.
    pub fn connect_attempts(&self) -> u64 {
        self.shared.connect_attempts.load(Ordering::Acquire)
    }

    /// Handle for sending on the worker's current connection.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Returns true while the worker holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Force the current connection down; the loop then reconnects.
    pub fn request_reconnect(&self) {
        info!(channel = %self.shared.name, "reconnect requested");
        self.sender.reset();
    }

    /// Delay before reconnecting. `None` disables automatic reconnects: the
    /// loop keeps running but only idles once the connection drops.
    pub fn set_reconnect_interval(&self, interval: Option<Duration>) {
        let ms = interval.map_or(-1, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        self.shared.reconnect_interval_ms.store(ms, Ordering::Release);
    }

    /// Current reconnect delay, or `None` when reconnects are disabled.
    pub fn reconnect_interval(&self) -> Option<Duration> {
        let ms = self.shared.reconnect_interval_ms.load(Ordering::Acquire);
        u64::try_from(ms).ok().map(Duration::from_millis)
    }

    /// Connect timeout for reconnect attempts.
    pub fn set_reconnect_timeout(&self, timeout: Duration) {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.shared.reconnect_timeout_ms.store(ms, Ordering::Release);
    }

    /// Extra run condition checked every loop iteration and backoff tick.
    pub fn set_liveness_predicate<F>(&self, predicate: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        *self
            .shared
            .liveness
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(predicate);
    }

    /// The handler, while the worker is stopped.
    pub fn handler(&self) -> Option<&H> {
        self.parked.as_ref().map(|(_, handler)| handler)
    }

    /// Mutable access to the handler, while the worker is stopped.
    pub fn handler_mut(&mut self) -> Option<&mut H> {
        self.parked.as_mut().map(|(_, handler)| handler)
    }
}

impl<H: FrameHandler> fmt::Debug for ConnectionWorker<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("connect_attempts", &self.connect_attempts())
            .finish_non_exhaustive()
    }
}

impl<H: FrameHandler> Drop for ConnectionWorker<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<H: FrameHandler>(
    shared: &Shared,
    mut client: TransportClient,
    mut handler: H,
) -> (TransportClient, H) {
    info!(channel = %shared.name, "worker started");

    while shared.should_run() {
        if client.prepare_receiver() {
            shared.set_state(WorkerState::Receiving);
            receive(shared, &mut client, &mut handler);
        } else {
            debug!(channel = %shared.name, "not connected");
        }
        client.close();
        backoff(shared, &mut client);
    }

    client.close();
    shared.set_state(WorkerState::Stopped);
    info!(channel = %shared.name, "worker stopped");
    (client, handler)
}

fn receive<H: FrameHandler>(shared: &Shared, client: &mut TransportClient, handler: &mut H) {
    while shared.should_run() && client.is_connected() {
        match client.drain_once(shared.poll_timeout) {
            Ok(Drained::Frames(frames)) => {
                if handler.on_frames(frames) == Handled::Reconnect {
                    warn!(channel = %shared.name, "handler requested reconnect");
                    return;
                }
            }
            Ok(Drained::Timeout) => {}
            Ok(Drained::NoValidFrame) => debug!(channel = %shared.name, "no valid frame"),
            Ok(Drained::PeerClosed) => {
                info!(channel = %shared.name, "connection closed by peer");
                return;
            }
            Ok(Drained::NotReady) => {
                warn!(channel = %shared.name, "receiver not ready");
                return;
            }
            Err(err) => {
                warn!(channel = %shared.name, error = %err, "receive failed");
                return;
            }
        }
    }
}

fn backoff(shared: &Shared, client: &mut TransportClient) {
    if !shared.should_run() {
        return;
    }
    shared.set_state(WorkerState::Backoff);

    let interval_ms = shared.reconnect_interval_ms.load(Ordering::Acquire);
    let Ok(interval_ms) = u64::try_from(interval_ms) else {
        thread::sleep(SHORT_SLEEP);
        return;
    };
    if interval_ms == 0 {
        thread::sleep(SHORT_SLEEP);
    }

    info!(channel = %shared.name, interval_ms, "reconnecting after backoff");
    let ticks = interval_ms.div_ceil(TICK_MS);
    for tick in 0..ticks {
        if !shared.should_run() {
            return;
        }
        if tick % COUNTDOWN_LOG_TICKS == 0 && tick > 0 {
            debug!(
                channel = %shared.name,
                remaining_ms = interval_ms.saturating_sub(tick * TICK_MS),
                "reconnect countdown"
            );
        }
        thread::sleep(TICK);
    }

    if shared.should_run() {
        shared.connect(client, shared.reconnect_timeout());
    }
}
