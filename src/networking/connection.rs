use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::networking::backoff::{Backoff, ReconnectPolicy};
use crate::networking::frame::Frame;
use crate::networking::transport::{Connector, Received, Transport};
use crate::networking::{DispatchError, TransportError};
use crate::viewer::events::ViewerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

pub type InstructionHandler = Arc<dyn Fn(Option<Value>) -> anyhow::Result<()> + Send + Sync>;

const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The reconnecting socket. Frames are received on a dedicated network thread and forwarded to
/// the dispatcher, handlers only ever run where [`Connection::dispatch`] is called.
pub struct Connection {
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    handlers: RwLock<HashMap<String, InstructionHandler>>,
    state: watch::Sender<ConnectionState>,
    outbound_sender: Sender<String>,
    outbound_receiver: Mutex<Receiver<String>>,
    events: Sender<ViewerEvent>,
    running: AtomicBool,
    close_requested: AtomicBool,
    session_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        events: Sender<ViewerEvent>,
    ) -> Self {
        let (outbound_sender, outbound_receiver) = std::sync::mpsc::channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            url: url.into(),
            connector,
            policy,
            handlers: RwLock::new(HashMap::new()),
            state,
            outbound_sender,
            outbound_receiver: Mutex::new(outbound_receiver),
            events,
            running: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            session_thread: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Starts the network thread, which keeps (re)connecting until [`Connection::shutdown`].
    /// Calling it while that thread is alive does nothing.
    pub fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        if self.running.swap(true, SeqCst) {
            debug!("Connection to {} is already being maintained", self.url);
            return Ok(());
        }
        self.close_requested.store(false, SeqCst);

        let connection = self.clone();
        let handle = std::thread::Builder::new()
            .name("Network".to_string())
            .spawn(move || connection.run_sessions())
            .map_err(|err| {
                self.running.store(false, SeqCst);
                TransportError::Spawn(err)
            })?;

        *self.session_thread.lock().expect("Session Thread Lock") = Some(handle);
        Ok(())
    }

    /// Stops reconnecting, closes the current session and waits for the network thread.
    pub fn shutdown(&self) {
        self.close_requested.store(true, SeqCst);
        let handle = self.session_thread.lock().expect("Session Thread Lock").take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("The network thread panicked");
            }
        }
    }

    /// Last registration for a tag wins.
    pub fn register_handler<F>(&self, tag: &str, handler: F)
    where
        F: Fn(Option<Value>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let previous = self
            .handlers
            .write()
            .expect("Handlers Lock")
            .insert(tag.to_string(), Arc::new(handler));

        if previous.is_some() {
            debug!("Replaced the handler for {}", tag);
        }
    }

    pub fn send<T: Serialize + ?Sized>(&self, tag: &str, payload: Option<&T>) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let text = Frame::encode(tag, payload)?;
        self.outbound_sender
            .send(text)
            .map_err(|_| TransportError::NotConnected)
    }

    /// Parses a received frame and runs its handler on the calling thread.
    pub fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        let frame = Frame::parse(text)?;

        // Cloned out, so handlers may register handlers themselves.
        let handler = self
            .handlers
            .read()
            .expect("Handlers Lock")
            .get(&frame.tag)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownTag(frame.tag.clone()))?;

        trace!("Dispatching {}", frame.tag);
        handler(frame.body).map_err(|source| DispatchError::Handler { tag: frame.tag, source })
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!("Connection to {}: {} -> {}", self.url, previous, state);
        }
    }

    fn run_sessions(&self) {
        let mut backoff = Backoff::new(self.policy);

        while !self.close_requested.load(SeqCst) {
            self.set_state(ConnectionState::Connecting);

            match self.connector.connect(&self.url) {
                Ok(transport) => {
                    self.set_state(ConnectionState::Open);
                    if self.pump(transport) > 0 {
                        backoff.reset();
                    }
                }
                Err(err) => warn!("{}", err),
            }

            self.set_state(ConnectionState::Closed);
            if self.close_requested.load(SeqCst) {
                break;
            }

            let delay = backoff.next_delay();
            warn!(
                "Reconnecting to {} in {}ms (attempt {})",
                self.url,
                delay.as_millis(),
                backoff.attempt()
            );
            self.sleep_unless_closing(delay);
        }

        self.set_state(ConnectionState::Disconnected);
        self.running.store(false, SeqCst);
    }

    /// Moves frames until the session ends, returns how many frames were received.
    fn pump(&self, mut transport: Box<dyn Transport>) -> usize {
        let outbound = self.outbound_receiver.lock().expect("Outbound Lock");
        let stale = outbound.try_iter().count();
        if stale > 0 {
            debug!("Discarding {} frames queued for the previous session", stale);
        }

        let mut received = 0;
        loop {
            if self.close_requested.load(SeqCst) {
                transport.close();
                return received;
            }

            for text in outbound.try_iter() {
                if let Err(err) = transport.send_text(text) {
                    warn!("Sending to {} failed: {}", self.url, err);
                    transport.close();
                    return received;
                }
            }

            match transport.receive() {
                Ok(Received::Frame(text)) => {
                    received += 1;
                    if self.events.send(ViewerEvent::Frame(text)).is_err() {
                        info!("Dispatcher is gone, closing the connection");
                        self.close_requested.store(true, SeqCst);
                        transport.close();
                        return received;
                    }
                }
                Ok(Received::Idle) => {}
                Ok(Received::Closed) => {
                    info!("{} closed the connection", self.url);
                    return received;
                }
                Err(err) => {
                    warn!("Connection to {} failed: {}", self.url, err);
                    transport.close();
                    return received;
                }
            }
        }
    }

    fn sleep_unless_closing(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.close_requested.load(SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(CLOSE_POLL_INTERVAL));
        }
    }
}
