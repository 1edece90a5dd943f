//! WebSocket client for the realtime channel.
//!
//! The socket lives on a background thread. It reconnects with exponential
//! backoff and replays the join message on every connect; the UI thread
//! polls events without blocking.

use crate::protocol::Envelope;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tungstenite::{Message, connect};
use url::Url;

/// Channel client errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Channel closed")]
    Closed,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events from the socket thread.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    /// The connection dropped; a reconnect is scheduled.
    Disconnected,
    Message(Envelope),
    Error { message: String },
}

/// Exponential reconnect delay: doubles from `initial` up to `max`, and
/// starts over after a successful connect.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn from_millis(initial_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(initial_ms), Duration::from_millis(max_ms))
    }

    /// Delay to wait now; the following one is doubled.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Commands sent to the socket thread.
enum Command {
    Send(String),
    Close,
}

/// How a connected session ended.
enum SessionEnd {
    Closed,
    Lost,
}

/// Realtime channel client backed by a thread running `tungstenite`.
pub struct ChannelClient {
    state: ConnectionState,
    cmd_tx: Option<Sender<Command>>,
    event_rx: Option<Receiver<SyncEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl ChannelClient {
    /// Start connecting to `url`. `join` is sent first on every connect.
    pub fn connect(url: &str, join: Envelope, backoff: Backoff) -> Result<Self, ChannelError> {
        let parsed = Url::parse(url).map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(ChannelError::InvalidUrl(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }
        let join = join.to_json().map_err(|e| ChannelError::Send(e.to_string()))?;

        let (cmd_tx, cmd_rx) = channel::<Command>();
        let (event_tx, event_rx) = channel::<SyncEvent>();
        let url = url.to_string();
        let handle = thread::Builder::new()
            .name("inkboard-channel".into())
            .spawn(move || run(url, join, backoff, cmd_rx, event_tx))
            .map_err(|e| ChannelError::Send(e.to_string()))?;

        Ok(Self {
            state: ConnectionState::Connecting,
            cmd_tx: Some(cmd_tx),
            event_rx: Some(event_rx),
            _thread: Some(handle),
        })
    }

    /// Queue a message. Messages sent while the socket is down are delivered
    /// after the next successful connect.
    pub fn send(&self, json: impl Into<String>) -> Result<(), ChannelError> {
        let tx = self.cmd_tx.as_ref().ok_or(ChannelError::NotConnected)?;
        tx.send(Command::Send(json.into())).map_err(|_| ChannelError::Closed)
    }

    /// Drain pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<SyncEvent> {
        let Some(rx) = self.event_rx.as_ref() else {
            return Vec::new();
        };
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match &event {
                SyncEvent::Connected => self.state = ConnectionState::Connected,
                SyncEvent::Disconnected | SyncEvent::Error { .. } => {
                    self.state = ConnectionState::Connecting;
                }
                SyncEvent::Message(_) => {}
            }
            events.push(event);
        }
        events
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Close the socket and stop reconnecting.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Close);
        }
        self.event_rx = None;
        // The thread exits on its own once it sees the close.
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run(url: String, join: String, mut backoff: Backoff, cmd_rx: Receiver<Command>, event_tx: Sender<SyncEvent>) {
    let mut backlog: Vec<String> = Vec::new();
    loop {
        log::info!("Channel connecting to {}", url);
        match connect(url.as_str()) {
            Ok((mut socket, response)) => {
                log::info!("Channel connected, status: {}", response.status());
                backoff.reset();
                let _ = event_tx.send(SyncEvent::Connected);
                match socket.get_mut() {
                    tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                    }
                    #[allow(unreachable_patterns)]
                    _ => log::debug!("TLS stream, using default timeouts"),
                }
                let end = session(&mut socket, &join, &mut backlog, &cmd_rx, &event_tx);
                let _ = event_tx.send(SyncEvent::Disconnected);
                if matches!(end, SessionEnd::Closed) {
                    break;
                }
            }
            Err(e) => {
                log::error!("Channel connection failed: {}", e);
                let sent = event_tx.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                if sent.is_err() {
                    break;
                }
            }
        }

        let delay = backoff.next_delay();
        log::info!("Channel reconnecting in {:?}", delay);
        if wait(&cmd_rx, delay, &mut backlog) {
            break;
        }
    }
    log::info!("Channel thread exiting");
}

/// Sleep for `delay`, buffering sends. Returns true when asked to close.
fn wait(cmd_rx: &Receiver<Command>, delay: Duration, backlog: &mut Vec<String>) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match cmd_rx.recv_timeout(remaining) {
            Ok(Command::Send(msg)) => backlog.push(msg),
            Ok(Command::Close) | Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
}

type Socket = tungstenite::WebSocket<tungstenite::stream::MaybeTlsStream<std::net::TcpStream>>;

fn session(
    socket: &mut Socket,
    join: &str,
    backlog: &mut Vec<String>,
    cmd_rx: &Receiver<Command>,
    event_tx: &Sender<SyncEvent>,
) -> SessionEnd {
    if let Err(e) = socket.send(Message::Text(join.to_string())) {
        log::error!("Channel join failed: {}", e);
        return SessionEnd::Lost;
    }
    while !backlog.is_empty() {
        let msg = backlog.remove(0);
        if let Err(e) = socket.send(Message::Text(msg.clone())) {
            log::error!("Channel send error: {}", e);
            backlog.insert(0, msg);
            return SessionEnd::Lost;
        }
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(Command::Send(msg)) => {
                log::debug!("Channel sending: {}", &msg[..msg.len().min(100)]);
                if let Err(e) = socket.send(Message::Text(msg.clone())) {
                    log::error!("Channel send error: {}", e);
                    backlog.push(msg);
                    return SessionEnd::Lost;
                }
            }
            Ok(Command::Close) | Err(TryRecvError::Disconnected) => {
                log::info!("Channel close requested");
                let _ = socket.close(None);
                return SessionEnd::Closed;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => match Envelope::from_json(&txt) {
                Ok(envelope) => {
                    if event_tx.send(SyncEvent::Message(envelope)).is_err() {
                        return SessionEnd::Closed;
                    }
                }
                Err(e) => log::debug!("Ignoring malformed frame: {}", e),
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("Channel received close frame");
                return SessionEnd::Lost;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("Channel read error: {}", e);
                return SessionEnd::Lost;
            }
        }
    }
}
