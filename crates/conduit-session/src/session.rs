use std::sync::Arc;
use std::time::Duration;

use conduit_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use conduit_transport::TlsPolicy;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Action, Command, ConduitId, InboundEvent};
use crate::error::{Result, SessionError};
use crate::membership::{Membership, MembershipChange};

/// Connection lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Tunables for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for establishing the transport (including TLS).
    pub connect_timeout: Duration,
    /// Frames that may wait in the send queue before `send` applies backpressure.
    pub send_queue_depth: usize,
    /// Events buffered for the observer before the receive loop waits.
    pub event_buffer: usize,
    /// Frame codec limits and resynchronization policy.
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            send_queue_depth: 64,
            event_buffer: 256,
            frame: FrameConfig::default(),
        }
    }
}

/// Client side of one conduit protocol connection.
///
/// The session owns at most one connection at a time. Each connection runs
/// two tasks: a writer that drains a FIFO send queue one whole frame at a
/// time, and a receive loop that decodes frames in arrival order and hands
/// the events to the registered observer. Both stop when the connection's
/// cancellation token fires.
pub struct Session {
    config: SessionConfig,
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    state: watch::Sender<SessionState>,
    slot: Mutex<Slot>,
    observer: Mutex<Option<mpsc::Sender<InboundEvent>>>,
    pub(crate) membership: Mutex<Membership>,
}

/// The live connection, if any. `generation` changes whenever the slot is
/// reset so tasks of a replaced connection cannot touch its successor.
#[derive(Default)]
struct Slot {
    generation: u64,
    cancel: Option<CancellationToken>,
    outbound: Option<mpsc::Sender<Outbound>>,
}

struct Outbound {
    payload: Vec<u8>,
    action: Action,
    /// Applied by the writer once the frame is flushed, so the membership
    /// follows wire order.
    membership: Option<MembershipChange>,
    done: oneshot::Sender<Result<()>>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            shared: Arc::new(Shared {
                state,
                slot: Mutex::new(Slot::default()),
                observer: Mutex::new(None),
                membership: Mutex::new(Membership::default()),
            }),
        }
    }

    /// Connect to `host:port` and start the connection tasks.
    ///
    /// Fails with [`SessionError::AlreadyActive`] while connecting or connected.
    pub async fn open(&self, host: &str, port: u16, tls: TlsPolicy) -> Result<()> {
        let (generation, cancel) = self.shared.begin()?;
        info!(host, port, ?tls, "opening session");

        let timeout = self.config.connect_timeout;
        let connect = conduit_transport::connect(host, port, tls);
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            result = tokio::time::timeout(timeout, connect) => match result {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(err)) => Err(SessionError::from(err)),
                Err(_) => Err(SessionError::Timeout(timeout)),
            },
        };

        match connected {
            Ok(stream) => self.start(stream, generation, cancel),
            Err(err) => {
                warn!(host, port, error = %err, "open failed");
                self.shared.teardown(Some(generation));
                Err(err)
            }
        }
    }

    /// Run the session over an already-established byte stream.
    pub async fn open_stream<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (generation, cancel) = self.shared.begin()?;
        debug!("opening session over caller-provided stream");
        self.start(stream, generation, cancel)
    }

    fn start<S>(&self, stream: S, generation: u64, cancel: CancellationToken) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = FrameReader::with_config(read_half, self.config.frame.clone());
        let writer = FrameWriter::with_config(write_half, self.config.frame.clone());
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.send_queue_depth.max(1));

        if !self.shared.promote(generation, outbound_tx) {
            cancel.cancel();
            return Err(SessionError::Cancelled);
        }

        tokio::spawn(write_loop(
            writer,
            outbound_rx,
            Arc::clone(&self.shared),
            generation,
            cancel.clone(),
        ));
        tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.shared),
            generation,
            cancel,
        ));

        info!(generation, "session connected");
        Ok(())
    }

    /// Close the connection. Closing a disconnected session is a no-op.
    ///
    /// Pending sends resolve with [`SessionError::Cancelled`].
    pub async fn close(&self) {
        if self.shared.teardown(None) {
            info!("session closed");
        }
    }

    /// Send one command and wait until its frame has been written and flushed.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.send_with(command, None).await
    }

    pub(crate) async fn send_with(
        &self,
        command: Command,
        membership: Option<MembershipChange>,
    ) -> Result<()> {
        let payload = command.encode()?;
        let queue = self
            .shared
            .slot
            .lock()
            .outbound
            .clone()
            .ok_or(SessionError::NotConnected)?;

        let (done, ack) = oneshot::channel();
        queue
            .send(Outbound {
                payload,
                action: command.action,
                membership,
                done,
            })
            .await
            .map_err(|_| SessionError::Cancelled)?;

        ack.await.map_err(|_| SessionError::Cancelled)?
    }

    /// Publish `message` to `conduit`.
    pub async fn send_message(
        &self,
        conduit: impl Into<ConduitId>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.send(Command::send(conduit, message)).await
    }

    /// Store `value` under `key` in `conduit`.
    pub async fn store(
        &self,
        conduit: impl Into<ConduitId>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.send(Command::store(conduit, key, value)).await
    }

    /// Ask the peer for values under `key`. Answers arrive as events.
    pub async fn retrieve(
        &self,
        conduit: impl Into<ConduitId>,
        key: impl Into<String>,
        single: bool,
    ) -> Result<()> {
        self.send(Command::retrieve(conduit, key, single)).await
    }

    /// Register the event observer, replacing any previous one.
    ///
    /// Events are delivered in arrival order. A full receiver slows the
    /// receive loop down instead of losing events.
    pub fn subscribe(&self) -> mpsc::Receiver<InboundEvent> {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        *self.shared.observer.lock() = Some(tx);
        rx
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.teardown(None);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl Shared {
    /// Reserve the slot for a new connection and enter `Connecting`.
    fn begin(&self) -> Result<(u64, CancellationToken)> {
        let mut slot = self.slot.lock();
        if *self.state.borrow() != SessionState::Disconnected {
            return Err(SessionError::AlreadyActive);
        }
        if let Some(prior) = slot.cancel.take() {
            prior.cancel();
        }
        slot.outbound = None;
        slot.generation += 1;

        let cancel = CancellationToken::new();
        slot.cancel = Some(cancel.clone());
        self.state.send_replace(SessionState::Connecting);
        Ok((slot.generation, cancel))
    }

    /// Publish the send queue and enter `Connected`, unless the attempt was
    /// cancelled in the meantime.
    fn promote(&self, generation: u64, outbound: mpsc::Sender<Outbound>) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation || slot.cancel.is_none() {
            return false;
        }
        slot.outbound = Some(outbound);
        self.state.send_replace(SessionState::Connected);
        true
    }

    /// Cancel the connection and enter `Disconnected`.
    ///
    /// With `Some(generation)` only that connection is torn down. Returns
    /// whether a connection (or attempt) was active.
    fn teardown(&self, generation: Option<u64>) -> bool {
        let mut slot = self.slot.lock();
        if generation.is_some_and(|g| g != slot.generation) {
            return false;
        }
        let active = match slot.cancel.take() {
            Some(cancel) => {
                cancel.cancel();
                slot.generation += 1;
                true
            }
            None => false,
        };
        slot.outbound = None;
        self.state.send_replace(SessionState::Disconnected);
        active
    }
}

async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut queue: mpsc::Receiver<Outbound>,
    shared: Arc<Shared>,
    generation: u64,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = queue.recv() => next,
        };
        let Some(Outbound {
            payload,
            action,
            membership,
            done,
        }) = next
        else {
            break;
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = writer.send(&payload) => Some(result),
        };

        match written {
            Some(Ok(bytes)) => {
                debug!(%action, bytes, "frame sent");
                if let Some(change) = membership {
                    shared.membership.lock().apply(change);
                }
                let _ = done.send(Ok(()));
            }
            Some(Err(err)) => {
                warn!(%action, error = %err, "send failed, closing connection");
                let _ = done.send(Err(err.into()));
                shared.teardown(Some(generation));
                break;
            }
            None => {
                let _ = done.send(Err(SessionError::Cancelled));
                break;
            }
        }
    }

    queue.close();
    while let Ok(pending) = queue.try_recv() {
        let _ = pending.done.send(Err(SessionError::Cancelled));
    }
    debug!(generation, "writer stopped");
}

async fn receive_loop<R>(
    mut reader: FrameReader<R>,
    shared: Arc<Shared>,
    generation: u64,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = reader.read_frame() => frame,
        };

        let payload = match next {
            Ok(payload) => payload,
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "dropping corrupt frame");
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                info!("peer closed the connection");
                shared.teardown(Some(generation));
                break;
            }
            Err(err) => {
                warn!(error = %err, "receive failed, closing connection");
                shared.teardown(Some(generation));
                break;
            }
        };

        let event = match InboundEvent::decode(&payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, size = payload.len(), "dropping unparseable event");
                continue;
            }
        };

        let observer = shared.observer.lock().clone();
        let Some(observer) = observer else {
            debug!(source = event.source, "no observer registered, event dropped");
            continue;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = observer.send(event) => {
                if sent.is_err() {
                    debug!("event observer went away");
                }
            }
        }
    }
    debug!(generation, "receive loop stopped");
}
