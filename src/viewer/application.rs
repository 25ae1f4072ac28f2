use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::mpsc::{Receiver, channel};
use std::sync::{Arc, RwLock, Weak};
use std::thread::JoinHandle;

use anyhow::Context;
use glam::Vec3;
use log::{debug, error, info, warn};
use simview_assets::descriptors::{
    BodyDescriptor, GeometryDescriptor, MaterialDescriptor, TextureDescriptor, TransformBatch,
};

use crate::assets::cache::{AssetCache, FetchJob};
use crate::assets::fetcher::{AssetFetcher, FetchPool, HttpFetcher};
use crate::assets::{AssetError, FetchError};
use crate::networking::backoff::ReconnectPolicy;
use crate::networking::connection::Connection;
use crate::networking::transport::{Connector, WebSocketConnector};
use crate::scene::SceneError;
use crate::scene::graph::SceneGraph;
use crate::scene::host::{HeadlessHost, RenderHost};
use crate::settings::CliArgs;
use crate::viewer::dispatcher::EventDispatcher;
use crate::viewer::events::ViewerEvent;
use crate::viewer::instruction_handlers::register_instructions;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub socket_url: String,
    pub asset_base_url: String,
    pub fetch_workers: usize,
    pub reconnect_policy: ReconnectPolicy,
}

impl From<&CliArgs> for ViewerConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            socket_url: args.socket_url(),
            asset_base_url: args.asset_base_url(),
            fetch_workers: args.fetch_workers,
            reconnect_policy: args.reconnect_policy(),
        }
    }
}

pub struct ViewerApplication {
    pub assets: Arc<AssetCache>,
    pub scene: RwLock<SceneGraph>,
    pub connection: Arc<Connection>,
    fetch_pool: FetchPool,
    pub close_requested: AtomicBool,
    weak_self: Weak<ViewerApplication>,
}

impl ViewerApplication {
    /// Wires everything up, without connecting yet. The returned receiver is what
    /// [`ViewerApplication::run`] (or a test, via [`ViewerApplication::handle_event`]) consumes.
    pub fn new(
        config: &ViewerConfig,
        host: Arc<dyn RenderHost>,
        connector: Arc<dyn Connector>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> (Arc<Self>, Receiver<ViewerEvent>) {
        let (sender, receiver) = channel();

        let app = Arc::new_cyclic(|weak: &Weak<ViewerApplication>| {
            let connection = Arc::new(Connection::new(
                config.socket_url.clone(),
                connector,
                config.reconnect_policy,
                sender.clone(),
            ));
            register_instructions(&connection, weak);

            Self {
                assets: Arc::new(AssetCache::new(config.asset_base_url.clone())),
                scene: RwLock::new(SceneGraph::new(host)),
                connection,
                fetch_pool: FetchPool::new(config.fetch_workers, fetcher, sender),
                close_requested: AtomicBool::new(false),
                weak_self: weak.clone(),
            }
        });

        (app, receiver)
    }

    pub fn from_args(args: &CliArgs) -> (Arc<Self>, Receiver<ViewerEvent>) {
        Self::new(
            &ViewerConfig::from(args),
            Arc::new(HeadlessHost::new()),
            Arc::new(WebSocketConnector::default()),
            Arc::new(HttpFetcher::new(args.fetch_timeout())),
        )
    }

    /// Connects and processes events until [`ViewerApplication::request_close`].
    pub fn run(&self, receiver: Receiver<ViewerEvent>) -> anyhow::Result<()> {
        info!("Connecting to {}", self.connection.url());
        self.connection.connect()?;

        let dispatcher = self.run_dispatcher(receiver)?;
        if dispatcher.join().is_err() {
            error!("The dispatcher thread panicked");
        }

        self.connection.shutdown();
        self.fetch_pool.shutdown();
        info!("Viewer stopped");
        Ok(())
    }

    fn run_dispatcher(&self, receiver: Receiver<ViewerEvent>) -> anyhow::Result<JoinHandle<()>> {
        let weak = self.weak_self.clone();
        std::thread::Builder::new()
            .name("Dispatcher".into())
            .spawn(move || EventDispatcher::new(weak, receiver).run())
            .context("Spawning the dispatcher thread")
    }

    pub fn request_close(&self) {
        info!("Close requested");
        self.close_requested.store(true, SeqCst);
    }

    /// Reacts to a single event. Every failure is logged here and isolated to this event.
    pub fn handle_event(&self, event: ViewerEvent) {
        match event {
            ViewerEvent::Frame(text) => {
                if let Err(err) = self.connection.dispatch(&text) {
                    warn!("{}", err);
                }
            }
            ViewerEvent::AssetLoaded(asset) => {
                if let Err(err) = self.assets.fulfill(asset) {
                    error!("{}", err);
                }
            }
            ViewerEvent::AssetFailed { request, error } => self.assets.record_failure(&request, &error),
        }
    }

    pub fn load_mesh(&self, descriptor: GeometryDescriptor) {
        if let Some(job) = self.assets.request_geometry(descriptor) {
            self.submit(job);
        }
    }

    pub fn load_texture(&self, descriptor: TextureDescriptor) {
        if let Some(job) = self.assets.request_texture(descriptor) {
            self.submit(job);
        }
    }

    fn submit(&self, job: FetchJob) {
        if let Err(job) = self.fetch_pool.submit(job) {
            let error = AssetError::Fetch(FetchError::Transport {
                url: job.url.clone(),
                reason: "the fetch workers are shut down".to_string(),
            });
            self.assets.record_failure(&job.request, &error);
        }
    }

    pub fn load_material(&self, descriptor: &MaterialDescriptor) -> Result<(), AssetError> {
        self.assets.load_material(descriptor)
    }

    pub fn load_complete(&self) -> Option<Vec3> {
        let position = self.scene.read().expect("Scene Read Lock").center_root();
        match position {
            Some(position) => info!("Scene loaded, root placed at {}", position),
            None => debug!("Scene loaded without a root"),
        }
        position
    }

    pub fn reset(&self) {
        info!("Resetting the scene");
        self.scene.write().expect("Scene Write Lock").reset();
    }

    pub fn update_transforms(&self, batch: &TransformBatch) {
        let missing = self
            .scene
            .read()
            .expect("Scene Read Lock")
            .update_transforms(batch);

        for err in missing {
            warn!("Skipping transform update: {}", err);
        }
    }

    pub fn create_object(&self, descriptor: &BodyDescriptor) -> Result<(), SceneError> {
        self.scene
            .write()
            .expect("Scene Write Lock")
            .create_body(descriptor, &self.assets)
            .map(|body| debug!("Created {} with {} visuals", body.name, body.visuals.len()))
    }
}
