use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::Uri;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::networking::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Frame(String),
    /// Nothing arrived within the poll interval, the caller gets a chance to send.
    Idle,
    Closed,
}

/// One open session. Used exclusively by the network thread.
pub trait Transport: Send {
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    fn receive(&mut self) -> Result<Received, TransportError>;
    fn close(&mut self);
}

/// Opens sessions, once per (re)connect.
pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError>;
}

pub struct WebSocketConnector {
    poll_interval: Duration,
    /// Bounds the TCP connect and the handshake, so a close request never waits on the OS timeout.
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(poll_interval: Duration, connect_timeout: Duration) -> Self {
        Self {
            poll_interval,
            connect_timeout,
        }
    }

    fn open_stream(&self, uri: &Uri) -> Result<TcpStream, String> {
        if uri.scheme_str() != Some("ws") {
            return Err(format!("unsupported scheme {:?}, only plain ws:// is available", uri.scheme_str()));
        }

        let host = uri
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .ok_or("the url has no host")?;
        let port = uri.port_u16().unwrap_or(80);
        let addresses = (host, port).to_socket_addrs().map_err(|err| err.to_string())?;

        let mut last_error = format!("{} did not resolve to any address", host);
        for address in addresses {
            match TcpStream::connect_timeout(&address, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    trace!("Connecting to {} failed: {}", address, err);
                    last_error = err.to_string();
                }
            }
        }
        Err(last_error)
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_secs(5))
    }
}

fn connect_error(url: &str, reason: impl ToString) -> TransportError {
    TransportError::Connect {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let request = url
            .into_client_request()
            .map_err(|err| connect_error(url, err))?;
        let stream = self
            .open_stream(request.uri())
            .map_err(|reason| connect_error(url, reason))?;

        // A server that accepts but never answers the upgrade must not stall us either.
        stream.set_read_timeout(Some(self.connect_timeout))?;
        stream.set_nodelay(true)?;

        let (mut socket, response) = tungstenite::client(request, MaybeTlsStream::Plain(stream))
            .map_err(|err| connect_error(url, err))?;
        debug!("Handshake with {} done: {}", url, response.status());

        // Reads must time out, otherwise outbound frames would wait for the next inbound one.
        if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
            stream.set_read_timeout(Some(self.poll_interval))?;
        }

        Ok(Box::new(WebSocketTransport { socket }))
    }
}

pub struct WebSocketTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl Transport for WebSocketTransport {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket.send(Message::Text(text))?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Received, TransportError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Received::Frame(text)),
            Ok(Message::Binary(data)) => {
                warn!("Ignoring a binary frame of {} bytes", data.len());
                Ok(Received::Idle)
            }
            Ok(Message::Close(frame)) => {
                debug!("Server closed the socket: {:?}", frame);
                Ok(Received::Closed)
            }
            // Pings are answered by tungstenite itself.
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => Ok(Received::Idle),
            Err(tungstenite::Error::Io(err)) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(Received::Idle)
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(Received::Closed),
            Err(err) => Err(err.into()),
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.socket.close(None) {
            trace!("Closing the socket: {}", err);
        }
        // Flushes the close frame, errors are expected once the peer is gone.
        let _ = self.socket.flush();
    }
}

struct ScriptedSession {
    inbound: VecDeque<String>,
    keep_open: bool,
}

/// A scripted server. Every connect attempt takes the next queued session (or refusal); once the
/// script is exhausted all further attempts are refused.
#[derive(Default)]
pub struct MemoryConnector {
    sessions: Mutex<VecDeque<Option<ScriptedSession>>>,
    sent: Arc<Mutex<Vec<String>>>,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `frames` in order, then either idles until closed or hangs up.
    pub fn push_session<I, S>(&self, frames: I, keep_open: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sessions
            .lock()
            .expect("Sessions Lock")
            .push_back(Some(ScriptedSession {
                inbound: frames.into_iter().map(Into::into).collect(),
                keep_open,
            }));
    }

    pub fn push_refusal(&self) {
        self.sessions.lock().expect("Sessions Lock").push_back(None);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every frame sent across all sessions.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().expect("Sent Lock").clone()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().expect("Sessions Lock").pop_front();

        match next {
            Some(Some(session)) => Ok(Box::new(MemoryTransport {
                session,
                sent: self.sent.clone(),
                closed: false,
            })),
            _ => Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

struct MemoryTransport {
    session: ScriptedSession,
    sent: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

impl Transport for MemoryTransport {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().expect("Sent Lock").push(text);
        Ok(())
    }

    fn receive(&mut self) -> Result<Received, TransportError> {
        if self.closed {
            return Ok(Received::Closed);
        }

        match self.session.inbound.pop_front() {
            Some(text) => Ok(Received::Frame(text)),
            None if self.session.keep_open => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(Received::Idle)
            }
            None => Ok(Received::Closed),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    fn quick_connector() -> WebSocketConnector {
        WebSocketConnector::new(Duration::from_millis(20), Duration::from_millis(200))
    }

    #[test]
    fn websocket_sessions_exchange_text_frames() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("ws://{}", listener.local_addr()?);

        let server = std::thread::spawn(move || -> anyhow::Result<String> {
            let (stream, _) = listener.accept()?;
            let mut socket = tungstenite::accept(stream).map_err(|err| anyhow::anyhow!("Upgrade failed: {}", err))?;
            socket.send(Message::Text("RESET:".to_string()))?;
            loop {
                if let Message::Text(text) = socket.read()? {
                    return Ok(text);
                }
            }
        });

        let mut transport = quick_connector().connect(&url)?;
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = transport.receive()?;
        while received == Received::Idle && Instant::now() < deadline {
            received = transport.receive()?;
        }
        assert_eq!(received, Received::Frame("RESET:".to_string()));

        transport.send_text("SELECT:{}".to_string())?;
        assert_eq!(server.join().unwrap()?, "SELECT:{}");
        Ok(())
    }

    #[test]
    fn silent_servers_fail_within_the_connect_timeout() -> anyhow::Result<()> {
        // Bound but never accepting: the TCP connect succeeds, the upgrade never gets an answer.
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("ws://{}", listener.local_addr()?);

        let started = Instant::now();
        let result = quick_connector().connect(&url);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn refused_and_unsupported_urls_are_connect_errors() -> anyhow::Result<()> {
        let address = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
        let connector = quick_connector();

        let refused = connector.connect(&format!("ws://{}", address));
        assert!(matches!(refused, Err(TransportError::Connect { .. })));

        let tls = connector.connect("wss://localhost:8001");
        assert!(matches!(tls, Err(TransportError::Connect { ref reason, .. }) if reason.contains("ws://")));
        Ok(())
    }

    #[test]
    fn scripted_sessions_play_in_order() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        connector.push_refusal();
        connector.push_session(["A:", "B:"], false);

        assert!(connector.connect("ws://test").is_err());
        let mut transport = connector.connect("ws://test")?;
        assert_eq!(transport.receive()?, Received::Frame("A:".to_string()));
        assert_eq!(transport.receive()?, Received::Frame("B:".to_string()));
        assert_eq!(transport.receive()?, Received::Closed);

        transport.send_text("PING:".to_string())?;
        assert_eq!(connector.sent_frames(), vec!["PING:"]);

        // The script is exhausted.
        assert!(connector.connect("ws://test").is_err());
        assert_eq!(connector.attempts(), 3);
        Ok(())
    }

    #[test]
    fn kept_open_sessions_idle() -> anyhow::Result<()> {
        let connector = MemoryConnector::new();
        connector.push_session(Vec::<String>::new(), true);

        let mut transport = connector.connect("ws://test")?;
        assert_eq!(transport.receive()?, Received::Idle);
        transport.close();
        assert_eq!(transport.receive()?, Received::Closed);
        assert!(transport.send_text("X:".to_string()).is_err());
        Ok(())
    }
}
