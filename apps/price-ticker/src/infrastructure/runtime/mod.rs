//! Ticker Runtime
//!
//! Async driver for the [`TickerManager`] state machine. A single task owns
//! the manager and processes events one at a time to completion. Timers,
//! fetches, and sockets run in their own tasks and only ever talk back
//! through the event channel, so no two transitions interleave.
//!
//! ```text
//! TickerHandle ──▶ event channel ──▶ driver task ──▶ TickerManager::handle
//!                        ▲                │
//!   timer / fetch / socket tasks ◀── Commands
//! ```
//!
//! The read model is published on a `watch` channel after every event that
//! changed it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedCodec, QuoteFetcher};
use crate::application::services::{
    Command, Event, TickerManager, TickerManagerConfig, TickerSnapshot, TimerKind,
};
use crate::domain::connection::{ConnectionId, FetchId, TimerId};
use crate::domain::quote::Instrument;
use crate::infrastructure::coinbase::SocketHandle;

/// Runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The driver task has exited.
    #[error("ticker runtime is not running")]
    Stopped,

    /// The driver task panicked or was aborted.
    #[error("ticker runtime task failed: {0}")]
    Join(String),
}

/// Entry point for running the ticker.
#[derive(Debug)]
pub struct TickerRuntime;

impl TickerRuntime {
    /// Spawn the driver task.
    ///
    /// The ticker is idle until [`TickerHandle::start`] is called.
    #[must_use]
    pub fn spawn(
        config: TickerManagerConfig,
        codec: Box<dyn FeedCodec>,
        fetcher: Arc<dyn QuoteFetcher>,
    ) -> TickerHandle {
        let manager = TickerManager::new(config, codec);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(manager.snapshot());
        let shutdown = CancellationToken::new();

        let driver = Driver {
            manager,
            fetcher,
            events: events_tx.clone(),
            snapshot: snapshot_tx,
            timers: HashMap::new(),
            sockets: HashMap::new(),
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(driver.run(events_rx));

        TickerHandle {
            events: events_tx,
            snapshot: snapshot_rx,
            shutdown,
            task,
        }
    }
}

/// Handle to a running ticker.
#[derive(Debug)]
pub struct TickerHandle {
    events: mpsc::UnboundedSender<Event>,
    snapshot: watch::Receiver<TickerSnapshot>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Start tracking an instrument, replacing any current one.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime has shut down.
    pub fn start(&self, instrument: Instrument) -> Result<(), RuntimeError> {
        self.send(Event::Start(instrument))
    }

    /// Stop tracking, releasing every timer and socket.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime has shut down.
    pub fn stop(&self) -> Result<(), RuntimeError> {
        self.send(Event::Stop)
    }

    /// Reconnect the stream now, with a fresh reconnect budget.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime has shut down.
    pub fn reconnect(&self) -> Result<(), RuntimeError> {
        self.send(Event::Reconnect)
    }

    /// Current read model.
    #[must_use]
    pub fn snapshot(&self) -> TickerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to read model changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TickerSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the ticker and wait for the driver task to exit.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Join` if the driver task panicked.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| RuntimeError::Join(e.to_string()))
    }

    fn send(&self, event: Event) -> Result<(), RuntimeError> {
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::Stopped);
        }
        self.events.send(event).map_err(|_| RuntimeError::Stopped)
    }
}

struct Driver {
    manager: TickerManager,
    fetcher: Arc<dyn QuoteFetcher>,
    events: mpsc::UnboundedSender<Event>,
    snapshot: watch::Sender<TickerSnapshot>,
    timers: HashMap<TimerId, CancellationToken>,
    sockets: HashMap<ConnectionId, SocketHandle>,
    shutdown: CancellationToken,
}

impl Driver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        tracing::info!("Ticker runtime started");
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }

        self.dispatch(Event::Stop);
        for (connection, socket) in self.sockets.drain() {
            tracing::debug!(%connection, "Aborting socket task");
            socket.abort();
        }
        for (_, token) in self.timers.drain() {
            token.cancel();
        }
        // Fetch tasks hold child tokens of the shutdown token.
        self.shutdown.cancel();

        tracing::info!("Ticker runtime stopped");
    }

    fn dispatch(&mut self, event: Event) {
        match &event {
            Event::TimerFired(timer) => {
                self.timers.remove(timer);
            }
            Event::SocketClosed { connection, .. } => {
                self.sockets.remove(connection);
            }
            _ => {}
        }

        for command in self.manager.handle(event) {
            self.execute(command);
        }

        let next = self.manager.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn execute(&mut self, command: Command) {
        tracing::trace!(?command, "Executing command");
        match command {
            Command::OpenSocket { connection, url } => {
                let socket = SocketHandle::spawn(connection, url, self.events.clone());
                self.sockets.insert(connection, socket);
            }
            Command::SendText { connection, text } => match self.sockets.get(&connection) {
                Some(socket) => socket.send_text(text),
                None => tracing::debug!(%connection, "No socket to send to"),
            },
            Command::CloseSocket {
                connection,
                code,
                reason,
            } => {
                if let Some(socket) = self.sockets.remove(&connection) {
                    socket.close(code, reason);
                }
            }
            Command::ScheduleTimer { timer, kind, delay } => self.schedule(timer, kind, delay),
            Command::CancelTimer { timer } => {
                if let Some(token) = self.timers.remove(&timer) {
                    token.cancel();
                }
            }
            Command::Fetch { fetch, instrument } => self.fetch(fetch, instrument),
        }
    }

    fn schedule(&mut self, timer: TimerId, kind: TimerKind, delay: Duration) {
        let token = self.shutdown.child_token();
        self.timers.insert(timer, token.clone());
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    tracing::trace!(%timer, kind = kind.as_str(), "Timer fired");
                    let _ = events.send(Event::TimerFired(timer));
                }
            }
        });
    }

    fn fetch(&self, fetch: FetchId, instrument: Instrument) {
        let token = self.shutdown.child_token();
        let fetcher = Arc::clone(&self.fetcher);
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                result = fetcher.fetch(&instrument) => {
                    let _ = events.send(Event::FetchCompleted { fetch, result });
                }
            }
        });
    }
}
