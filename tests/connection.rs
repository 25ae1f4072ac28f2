use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use simview::networking::backoff::ReconnectPolicy;
use simview::networking::connection::{Connection, ConnectionState};
use simview::networking::TransportError;
use simview::networking::transport::{Connector, MemoryConnector, Transport};
use simview::scene::host::HeadlessHost;
use simview::viewer::application::{ViewerApplication, ViewerConfig};
use simview::viewer::events::ViewerEvent;

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn fast_retries() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        multiplier: 2,
        jitter: 0.0,
    }
}

fn connection(connector: Arc<MemoryConnector>) -> (Arc<Connection>, Receiver<ViewerEvent>) {
    let (sender, receiver) = channel();
    let connection = Arc::new(Connection::new("ws://scene", connector, fast_retries(), sender));
    (connection, receiver)
}

/// Holds every connect attempt until the test lets it through.
struct GatedConnector {
    inner: MemoryConnector,
    gate: Mutex<Receiver<()>>,
    waiting: AtomicUsize,
}

impl GatedConnector {
    fn new(inner: MemoryConnector) -> (Arc<Self>, Sender<()>) {
        let (release, gate) = channel();
        let connector = Arc::new(Self {
            inner,
            gate: Mutex::new(gate),
            waiting: AtomicUsize::new(0),
        });
        (connector, release)
    }

    fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

impl Connector for GatedConnector {
    fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let released = self.gate.lock().unwrap().recv();
        if released.is_err() {
            return Err(TransportError::NotConnected);
        }
        self.inner.connect(url)
    }
}

fn next_frame(receiver: &Receiver<ViewerEvent>) -> String {
    match receiver.recv_timeout(Duration::from_secs(5)) {
        Ok(ViewerEvent::Frame(text)) => text,
        other => panic!("expected a frame, got {:?}", other),
    }
}

#[test]
fn frames_are_handled_in_arrival_order() {
    let connector = Arc::new(MemoryConnector::new());
    connector.push_session(["A:1", "B:2", "C:3"], true);
    let (connection, receiver) = connection(connector);

    let seen = Arc::new(Mutex::new(Vec::new()));
    for tag in ["A", "B", "C"] {
        let seen = seen.clone();
        connection.register_handler(tag, move |body| {
            seen.lock().unwrap().push(format!("{}={}", tag, body.unwrap_or_default()));
            Ok(())
        });
    }

    connection.connect().unwrap();
    for _ in 0..3 {
        connection.dispatch(&next_frame(&receiver)).unwrap();
    }
    connection.shutdown();

    assert_eq!(*seen.lock().unwrap(), vec!["A=1", "B=2", "C=3"]);
}

#[test]
fn reconnects_after_refusals_and_hangups() {
    let connector = Arc::new(MemoryConnector::new());
    connector.push_refusal();
    connector.push_refusal();
    connector.push_session(["RESET:"], false);
    connector.push_session(["RESET:", "LOAD_COMPLETE:"], true);
    let (connection, receiver) = connection(connector.clone());

    connection.connect().unwrap();
    assert_eq!(next_frame(&receiver), "RESET:");
    assert_eq!(next_frame(&receiver), "RESET:");
    assert_eq!(next_frame(&receiver), "LOAD_COMPLETE:");

    wait_until("the connection to open", || connection.is_connected());
    assert_eq!(connector.attempts(), 4);

    connection.shutdown();
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[test]
fn state_changes_are_published() {
    let scripted = MemoryConnector::new();
    scripted.push_refusal();
    scripted.push_refusal();
    scripted.push_session(Vec::<String>::new(), true);
    let (connector, release) = GatedConnector::new(scripted);

    // The first retry is immediate, the second one waits long enough to see the closed state.
    let policy = ReconnectPolicy {
        initial_delay: Duration::from_millis(200),
        max_delay: Duration::from_millis(200),
        multiplier: 1,
        jitter: 0.0,
    };
    let (sender, _receiver) = channel();
    let connection = Arc::new(Connection::new("ws://scene", connector.clone(), policy, sender));
    let mut states = connection.subscribe();
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);

    connection.connect().unwrap();

    let mut seen = Vec::new();
    let mut released = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    while seen.last() != Some(&ConnectionState::Open) {
        assert!(Instant::now() < deadline, "timed out, states so far: {:?}", seen);
        let state = *states.borrow_and_update();
        if state != ConnectionState::Disconnected && seen.last() != Some(&state) {
            seen.push(state);
        }
        if state == ConnectionState::Connecting && connector.waiting() > released {
            release.send(()).unwrap();
            released += 1;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    // The closed state after the first refusal is only held for an instant.
    assert_eq!(seen[0], ConnectionState::Connecting);
    assert!(seen.ends_with(&[
        ConnectionState::Connecting,
        ConnectionState::Closed,
        ConnectionState::Connecting,
        ConnectionState::Open
    ]));
    assert_eq!(released, 3);

    drop(release);
    connection.shutdown();
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
}

#[test]
fn connect_is_idempotent() {
    let connector = Arc::new(MemoryConnector::new());
    connector.push_session(Vec::<String>::new(), true);
    let (connection, _receiver) = connection(connector.clone());

    connection.connect().unwrap();
    connection.connect().unwrap();
    wait_until("the connection to open", || connection.is_connected());
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(connector.attempts(), 1);
    connection.shutdown();
}

#[test]
fn sends_frames_while_open() {
    let connector = Arc::new(MemoryConnector::new());
    connector.push_session(Vec::<String>::new(), true);
    let (connection, _receiver) = connection(connector.clone());
    let states = connection.subscribe();

    connection.connect().unwrap();
    wait_until("the connection to open", || connection.is_connected());
    assert_eq!(*states.borrow(), ConnectionState::Open);

    connection.send("SELECT", Some(&json!({"id": 3}))).unwrap();
    wait_until("the frame to be sent", || !connector.sent_frames().is_empty());
    assert_eq!(connector.sent_frames(), vec![r#"SELECT:{"id":3}"#]);

    connection.shutdown();
    assert!(connection.send("SELECT", Some(&json!({}))).is_err());
}

#[test]
fn viewer_runs_until_closed() {
    let connector = Arc::new(MemoryConnector::new());
    connector.push_session(
        [
            "RESET:".to_string(),
            format!(
                "CREATE_OBJECT:{}",
                json!({"name": "robot", "visuals": [{"type": "SPHERE"}]})
            ),
            "LOAD_COMPLETE:".to_string(),
        ],
        true,
    );

    let host = Arc::new(HeadlessHost::new());
    let config = ViewerConfig {
        socket_url: "ws://scene".to_string(),
        asset_base_url: "http://assets/".to_string(),
        fetch_workers: 1,
        reconnect_policy: fast_retries(),
    };
    let (app, receiver) = ViewerApplication::new(
        &config,
        host.clone(),
        connector,
        Arc::new(simview::assets::fetcher::MemoryFetcher::new()),
    );

    let runner = app.clone();
    let handle = std::thread::spawn(move || runner.run(receiver));

    wait_until("the robot to be created", || host.object_names() == vec!["robot"]);
    app.request_close();
    handle.join().unwrap().unwrap();

    assert_eq!(app.connection.state(), ConnectionState::Disconnected);
}
