//! Reconnecting receive loop
//!
//! The [`Supervisor`] owns the connection lifecycle for a
//! [`TransferSession`]: it connects, pumps frames into the session one at a
//! time, and when the connection closes or fails it waits a fixed delay and
//! connects again. It runs until the shutdown signal fires.

use crate::protocol::Event;
use crate::session::TransferSession;
use crate::streamer::MessageSink;
use lidarlod_core::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Delay between a lost connection and the next attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// An open connection delivering text frames in order
pub trait Transport: Send {
    /// Next frame, or `None` once the peer closed the connection
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Opens connections to one fixed endpoint
pub trait Connector: Send {
    type Conn: Transport;

    fn connect(&mut self) -> impl Future<Output = Result<Self::Conn>> + Send;
}

// ============================================================
// Shutdown
// ============================================================

/// Stops a running supervisor, including a pending reconnect delay
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked shutdown handle and signal
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // no receivers left means nothing is running
        let _ = self.tx.send(true);
    }
}

/// Receiving side of a [`ShutdownHandle`]
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested or every handle is dropped
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

// ============================================================
// Supervisor
// ============================================================

/// Counters describing a finished supervisor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub connections: usize,
    pub failed_connects: usize,
    pub frames: usize,
}

/// Fixed-delay reconnect loop
#[derive(Debug, Clone)]
pub struct Supervisor {
    reconnect_delay: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Drive `session` from connections made by `connector` until shutdown.
    ///
    /// Transport failures never surface here; they only lead to a reconnect.
    pub async fn run<C: Connector>(
        &self,
        connector: &mut C,
        session: &mut TransferSession,
        mut shutdown: ShutdownSignal,
    ) -> SupervisorReport {
        let mut report = SupervisorReport::default();

        while !shutdown.is_shutdown() {
            let connected = tokio::select! {
                result = connector.connect() => result,
                _ = shutdown.wait() => break,
            };

            match connected {
                Ok(mut conn) => {
                    report.connections += 1;
                    log::info!("connected (attempt {})", report.connections + report.failed_connects);

                    loop {
                        let frame = tokio::select! {
                            frame = conn.recv() => frame,
                            _ = shutdown.wait() => return report,
                        };
                        match frame {
                            Ok(Some(text)) => {
                                report.frames += 1;
                                session.handle_frame(&text);
                            }
                            Ok(None) => {
                                log::info!("connection closed by peer");
                                break;
                            }
                            Err(e) => {
                                log::warn!("connection error, closing: {}", e);
                                break;
                            }
                        }
                    }
                    session.on_disconnect();
                }
                Err(e) => {
                    report.failed_connects += 1;
                    log::warn!("connect failed: {}", e);
                }
            }

            log::info!("reconnecting in {:?}", self.reconnect_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.wait() => break,
            }
        }

        report
    }
}

// ============================================================
// In-process channel transport
// ============================================================

/// Server end of an in-process connection; serializes events to frames
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// Send a raw frame, for peers that produce their own text
    pub fn send_frame(&self, frame: impl Into<String>) -> Result<()> {
        self.tx
            .send(frame.into())
            .map_err(|_| Error::Transport("channel receiver dropped".to_string()))
    }
}

impl MessageSink for ChannelSink {
    fn send(&mut self, event: Event) -> Result<()> {
        self.send_frame(event.to_json()?)
    }
}

/// Client end of an in-process connection; closes once every sink is dropped
#[derive(Debug)]
pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<String>,
}

impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

/// Create a connected sink/transport pair
pub fn channel_pair() -> (ChannelSink, ChannelTransport) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, ChannelTransport { rx })
}

/// Hands out queued connections, one per connect call.
///
/// `Err` entries simulate refused connections. Once the queue is closed and
/// drained every connect fails.
#[derive(Debug)]
pub struct ChannelConnector {
    incoming: mpsc::UnboundedReceiver<Result<ChannelTransport>>,
}

/// Create a connector together with the queue that feeds it
pub fn connector_channel() -> (mpsc::UnboundedSender<Result<ChannelTransport>>, ChannelConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ChannelConnector { incoming: rx })
}

impl Connector for ChannelConnector {
    type Conn = ChannelTransport;

    async fn connect(&mut self) -> Result<ChannelTransport> {
        match self.incoming.recv().await {
            Some(conn) => conn,
            None => Err(Error::Transport("no more connections".to_string())),
        }
    }
}
