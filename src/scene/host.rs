use std::sync::{Arc, RwLock};

use log::trace;

use crate::scene::body::Body;

/// The 3D scene the bodies end up in. Drawing is entirely up to the implementation, it only
/// learns about top level objects, their subtrees are reachable through [`Body::children`].
pub trait RenderHost: Send + Sync {
    fn add_object(&self, body: Arc<Body>);
    fn remove_object(&self, body: &Arc<Body>);
}

/// Keeps track of the top level objects without drawing them.
#[derive(Default)]
pub struct HeadlessHost {
    objects: RwLock<Vec<Arc<Body>>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> Vec<Arc<Body>> {
        self.objects.read().expect("Objects Read Lock").clone()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("Objects Read Lock")
            .iter()
            .map(|body| body.name.clone())
            .collect()
    }
}

impl RenderHost for HeadlessHost {
    fn add_object(&self, body: Arc<Body>) {
        trace!("Adding {} to the scene", body.name);
        self.objects.write().expect("Objects Write Lock").push(body);
    }

    fn remove_object(&self, body: &Arc<Body>) {
        trace!("Removing {} from the scene", body.name);
        self.objects
            .write()
            .expect("Objects Write Lock")
            .retain(|existing| !Arc::ptr_eq(existing, body));
    }
}
