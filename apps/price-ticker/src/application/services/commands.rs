//! Ticker Events and Commands
//!
//! The ticker state machine consumes [`Event`]s and produces [`Command`]s.
//! Events come from the caller (start, stop, reconnect) or report the
//! outcome of an earlier command (timer fired, fetch completed, socket
//! lifecycle). Commands describe side effects for the runtime to perform.

use std::time::Duration;

use crate::application::ports::FetchError;
use crate::domain::connection::{ConnectionId, FetchId, IdAllocator, TimerId};
use crate::domain::quote::{Instrument, Quote};

/// Input to the ticker state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Begin tracking an instrument (stopping any previous one first).
    Start(Instrument),
    /// Tear down every timer, socket, and polling loop.
    Stop,
    /// Manual reconnect request.
    Reconnect,
    /// A scheduled timer elapsed.
    TimerFired(TimerId),
    /// A REST fetch finished.
    FetchCompleted {
        /// Fetch that completed.
        fetch: FetchId,
        /// Quote or failure.
        result: Result<Quote, FetchError>,
    },
    /// Socket finished its handshake.
    SocketOpened {
        /// Socket instance.
        connection: ConnectionId,
    },
    /// Socket delivered a text frame.
    SocketMessage {
        /// Socket instance.
        connection: ConnectionId,
        /// Raw frame payload.
        text: String,
    },
    /// Socket reported a transport error. A close event always follows.
    SocketError {
        /// Socket instance.
        connection: ConnectionId,
        /// Error description for logs.
        message: String,
    },
    /// Socket closed.
    SocketClosed {
        /// Socket instance.
        connection: ConnectionId,
        /// WebSocket close code.
        code: u16,
        /// Close reason sent by the peer, if any.
        reason: String,
    },
}

/// What a scheduled timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Delay between start and the first streaming attempt.
    Settle,
    /// Bound on how long a connect may stay pending.
    Watchdog,
    /// Retry after a watchdog timeout.
    WatchdogRetry,
    /// Backoff before an automatic reconnect.
    Reconnect,
    /// Next polling tick.
    Poll,
}

impl TimerKind {
    /// Get the timer name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Settle => "settle",
            Self::Watchdog => "watchdog",
            Self::WatchdogRetry => "watchdog_retry",
            Self::Reconnect => "reconnect",
            Self::Poll => "poll",
        }
    }
}

/// Side effect requested by the ticker state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a new socket.
    OpenSocket {
        /// Identifier to tag every event from this socket with.
        connection: ConnectionId,
        /// WebSocket URL.
        url: String,
    },
    /// Send a text frame.
    SendText {
        /// Target socket.
        connection: ConnectionId,
        /// Frame payload.
        text: String,
    },
    /// Close and discard a socket.
    CloseSocket {
        /// Target socket.
        connection: ConnectionId,
        /// Close code to send.
        code: u16,
        /// Close reason to send.
        reason: String,
    },
    /// Arm a one-shot timer.
    ScheduleTimer {
        /// Identifier reported back in `Event::TimerFired`.
        timer: TimerId,
        /// Purpose, for logging.
        kind: TimerKind,
        /// Delay until firing.
        delay: Duration,
    },
    /// Cancel a timer armed earlier.
    CancelTimer {
        /// Timer to cancel.
        timer: TimerId,
    },
    /// Issue a REST fetch.
    Fetch {
        /// Identifier reported back in `Event::FetchCompleted`.
        fetch: FetchId,
        /// Instrument to fetch.
        instrument: Instrument,
    },
}

/// Command buffer plus identifier allocation shared by the sub-machines.
#[derive(Debug, Default)]
pub struct Effects {
    ids: IdAllocator,
    commands: Vec<Command>,
}

impl Effects {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Arm a timer and return its identifier.
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let timer = self.ids.timer();
        self.commands.push(Command::ScheduleTimer { timer, kind, delay });
        timer
    }

    /// Cancel a timer if one is armed.
    pub fn cancel(&mut self, timer: Option<TimerId>) {
        if let Some(timer) = timer {
            self.commands.push(Command::CancelTimer { timer });
        }
    }

    /// Allocate a socket identifier.
    pub const fn next_connection(&mut self) -> ConnectionId {
        self.ids.connection()
    }

    /// Queue a fetch and return its identifier.
    pub fn fetch(&mut self, instrument: &Instrument) -> FetchId {
        let fetch = self.ids.fetch();
        self.commands.push(Command::Fetch {
            fetch,
            instrument: instrument.clone(),
        });
        fetch
    }

    /// Take every queued command.
    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}
