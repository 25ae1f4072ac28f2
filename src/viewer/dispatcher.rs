use std::sync::atomic::Ordering::SeqCst;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::viewer::application::ViewerApplication;
use crate::viewer::events::ViewerEvent;

const SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

/// The single thread that runs instruction handlers and resolves asset slots.
pub struct EventDispatcher {
    app: Weak<ViewerApplication>,
    receiver: Receiver<ViewerEvent>,
}

impl EventDispatcher {
    pub fn new(app: Weak<ViewerApplication>, receiver: Receiver<ViewerEvent>) -> Self {
        Self { app, receiver }
    }

    fn app(&self) -> Option<Arc<ViewerApplication>> {
        self.app.upgrade()
    }

    pub fn run(&self) {
        let mut last_summary = Instant::now();

        loop {
            let Some(app) = self.app() else {
                info!("Viewer dropped, stopping the dispatcher");
                return;
            };

            if app.close_requested.load(SeqCst) {
                info!("App closing requested, shutting down");
                return;
            }

            if last_summary.elapsed() >= SUMMARY_INTERVAL {
                Self::log_summary(&app);
                last_summary = Instant::now();
            }

            match self.receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => app.handle_event(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Dispatcher: Broken Pipe");
                    return;
                }
            }
        }
    }

    fn log_summary(app: &ViewerApplication) {
        let stats = app.scene.read().expect("Scene Read Lock").stats();
        debug!(
            "{} bodies ({} parked), {} visible and {} hidden visuals, {} pending assets, connection {}",
            stats.bodies,
            stats.parked_bodies,
            stats.visible_visuals,
            stats.hidden_visuals,
            app.assets.pending_count(),
            app.connection.state()
        );
    }
}
