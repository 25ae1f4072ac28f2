use std::io::Read;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, trace, warn};

use crate::assets::cache::FetchJob;
use crate::assets::{AssetError, FetchError};
use crate::viewer::events::ViewerEvent;

/// Where asset payloads come from. Implementations are shared between all fetch workers.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => FetchError::Transport {
                url: url.to_string(),
                reason: transport.to_string(),
            },
        })?;

        let mut payload = Vec::new();
        response.into_reader().read_to_end(&mut payload)?;
        trace!("Fetched {} bytes from {}", payload.len(), url);
        Ok(payload)
    }
}

/// Serves payloads from memory, unknown urls answer with a 404.
#[derive(Default)]
pub struct MemoryFetcher {
    payloads: DashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, payload: Vec<u8>) {
        self.payloads.insert(url.into(), payload);
    }

    /// Every url that has been asked for, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("Requests Lock").clone()
    }
}

impl AssetFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests
            .lock()
            .expect("Requests Lock")
            .push(url.to_string());

        self.payloads
            .get(url)
            .map(|payload| payload.value().clone())
            .ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// A fixed set of named threads that download and decode assets. Results are handed back as
/// [`ViewerEvent`]s, nothing in here touches the asset tables.
pub struct FetchPool {
    sender: Mutex<Option<Sender<FetchJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FetchPool {
    pub fn new(worker_count: usize, fetcher: Arc<dyn AssetFetcher>, events: Sender<ViewerEvent>) -> Self {
        let (sender, receiver) = std::sync::mpsc::channel::<FetchJob>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count.max(1))
            .filter_map(|index| {
                let receiver = receiver.clone();
                let fetcher = fetcher.clone();
                let events = events.clone();
                std::thread::Builder::new()
                    .name(format!("Asset Fetch #{}", index))
                    .spawn(move || Self::work(receiver, fetcher, events))
                    .inspect_err(|err| warn!("Could not spawn fetch worker {}: {}", index, err))
                    .ok()
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Hands the job back if the pool has already been shut down.
    pub fn submit(&self, job: FetchJob) -> Result<(), FetchJob> {
        let sender = self.sender.lock().expect("Fetch Sender Lock");
        match sender.as_ref() {
            Some(sender) => sender.send(job).map_err(|err| err.0),
            None => Err(job),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().expect("Fetch Workers Lock").len()
    }

    /// Lets the workers finish their current download and joins them. Queued jobs are still worked
    /// off, but their results go nowhere once the dispatcher is gone.
    pub fn shutdown(&self) {
        drop(self.sender.lock().expect("Fetch Sender Lock").take());
        let workers = std::mem::take(&mut *self.workers.lock().expect("Fetch Workers Lock"));
        for worker in workers {
            if worker.join().is_err() {
                warn!("A fetch worker panicked");
            }
        }
    }

    fn work(receiver: Arc<Mutex<Receiver<FetchJob>>>, fetcher: Arc<dyn AssetFetcher>, events: Sender<ViewerEvent>) {
        loop {
            // Holding the lock only for the recv, so the others can pick up jobs while we download.
            let job = receiver.lock().expect("Fetch Receiver Lock").recv();
            let Ok(FetchJob { url, request }) = job else {
                debug!("Fetch queue closed, worker exiting");
                return;
            };

            debug!("Fetching {} {} from {}", request.kind(), request.name(), url);
            let result = fetcher
                .fetch(&url)
                .map_err(AssetError::from)
                .and_then(|payload| request.decode(&payload).map_err(AssetError::from));

            let event = match result {
                Ok(asset) => ViewerEvent::AssetLoaded(asset),
                Err(error) => ViewerEvent::AssetFailed { request, error },
            };

            if events.send(event).is_err() {
                debug!("Dispatcher is gone, dropping the result of {}", url);
                return;
            }
        }
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        // Workers are detached if shutdown() never ran, closing the queue is enough to end them.
        drop(self.sender.get_mut().expect("Fetch Sender Lock").take());
    }
}
