//! Feed Socket Transport
//!
//! One task per socket instance. The task owns the WebSocket, forwards
//! every lifecycle change to the ticker event loop tagged with its
//! [`ConnectionId`], and writes whatever the event loop sends it. It makes
//! no decisions of its own: reconnecting, subscribing, and timeouts are all
//! driven by the state machine.
//!
//! # Lifecycle events
//!
//! - handshake done: `SocketOpened`
//! - text frame: `SocketMessage`
//! - close frame: `SocketClosed` with the peer's code, or 1005 when the
//!   frame carried none
//! - transport error: `SocketError` followed by `SocketClosed` with 1006
//! - stream ended without a close frame: `SocketClosed` with 1006

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::application::services::Event;
use crate::domain::connection::ConnectionId;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when a close frame carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Instruction for a socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame.
    Text(String),
    /// Send a close frame and stop. No further events are reported.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Handle to a running socket task.
#[derive(Debug)]
pub struct SocketHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

impl SocketHandle {
    /// Open a socket in a new task.
    #[must_use]
    pub fn spawn(
        connection: ConnectionId,
        url: String,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let (outbound, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(connection, url, rx, events));
        Self { outbound, task }
    }

    /// Queue a text frame.
    pub fn send_text(&self, text: String) {
        if self.outbound.send(Outbound::Text(text)).is_err() {
            tracing::debug!("Socket task already finished, dropping outbound text");
        }
    }

    /// Close the socket. The task exits without reporting a close event.
    pub fn close(self, code: u16, reason: String) {
        if self.outbound.send(Outbound::Close { code, reason }).is_err() {
            tracing::debug!("Socket task already finished");
        }
    }

    /// Kill the task without a close handshake.
    pub fn abort(self) {
        self.task.abort();
    }
}

async fn run(
    connection: ConnectionId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<Event>,
) {
    let report = |event: Event| {
        // The event loop is gone only during shutdown.
        let _ = events.send(event);
    };
    let report_drop = |message: String| {
        report(Event::SocketError {
            connection,
            message,
        });
        report(Event::SocketClosed {
            connection,
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
        });
    };

    tracing::debug!(%connection, url = %url, "Opening socket");

    // Only a close can arrive before the socket is open.
    let ws_stream = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                tracing::warn!(%connection, error = %e, "Socket handshake failed");
                report_drop(e.to_string());
                return;
            }
        },
        _ = outbound.recv() => {
            tracing::debug!(%connection, "Socket discarded before open");
            return;
        }
    };

    report(Event::SocketOpened { connection });
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            instruction = outbound.recv() => match instruction {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        tracing::warn!(%connection, error = %e, "Socket write failed");
                        report_drop(e.to_string());
                        return;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        tracing::debug!(%connection, error = %e, "Close frame not delivered");
                    }
                    tracing::debug!(%connection, code, "Socket closed locally");
                    return;
                }
                None => {
                    let _ = write.close().await;
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    report(Event::SocketMessage {
                        connection,
                        text: text.as_str().to_owned(),
                    });
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        tracing::warn!(%connection, error = %e, "Pong failed");
                        report_drop(e.to_string());
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (NO_STATUS_RECEIVED, String::new()),
                        |f| (u16::from(f.code), f.reason.as_str().to_owned()),
                    );
                    tracing::info!(%connection, code, reason = %reason, "Server sent close frame");
                    report(Event::SocketClosed {
                        connection,
                        code,
                        reason,
                    });
                    return;
                }
                Some(Ok(_)) => {
                    tracing::trace!(%connection, "Ignoring non-text frame");
                }
                Some(Err(e)) => {
                    tracing::warn!(%connection, error = %e, "Socket read failed");
                    report_drop(e.to_string());
                    return;
                }
                None => {
                    tracing::info!(%connection, "Socket stream ended");
                    report(Event::SocketClosed {
                        connection,
                        code: ABNORMAL_CLOSURE,
                        reason: String::new(),
                    });
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;

    async fn local_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for socket event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn reports_open_messages_and_close() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let Some(Ok(Message::Text(subscribe))) = ws.next().await else {
                panic!("expected subscribe");
            };
            ws.send(Message::Text(format!("echo:{}", subscribe.as_str()).into()))
                .await
                .unwrap();
            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(1011),
                reason: "maintenance".into(),
            })))
            .await
            .unwrap();
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::new(7);
        let socket = SocketHandle::spawn(connection, url, tx);

        assert_eq!(next_event(&mut rx).await, Event::SocketOpened { connection });
        socket.send_text("hello".to_string());
        assert_eq!(
            next_event(&mut rx).await,
            Event::SocketMessage {
                connection,
                text: "echo:hello".to_string()
            }
        );
        assert_eq!(
            next_event(&mut rx).await,
            Event::SocketClosed {
                connection,
                code: 1011,
                reason: "maintenance".to_string()
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_reports_error_then_abnormal_close() {
        let (listener, url) = local_server().await;
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::new(1);
        let _socket = SocketHandle::spawn(connection, url, tx);

        assert!(matches!(
            next_event(&mut rx).await,
            Event::SocketError { connection: c, .. } if c == connection
        ));
        assert_eq!(
            next_event(&mut rx).await,
            Event::SocketClosed {
                connection,
                code: ABNORMAL_CLOSURE,
                reason: String::new()
            }
        );
    }

    #[tokio::test]
    async fn local_close_reports_nothing() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            match ws.next().await {
                Some(Ok(Message::Close(Some(frame)))) => u16::from(frame.code),
                other => panic!("expected close frame, got {other:?}"),
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::new(3);
        let socket = SocketHandle::spawn(connection, url, tx);
        assert_eq!(next_event(&mut rx).await, Event::SocketOpened { connection });

        socket.close(1000, "Ticker stopped".to_string());

        assert_eq!(server.await.unwrap(), 1000);
        // Task exits and drops its sender without reporting a close
        assert!(rx.recv().await.is_none());
    }
}
