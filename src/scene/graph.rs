use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use glam::{Affine3A, Vec3};
use log::{debug, info, warn};
use simview_assets::descriptors::{BodyDescriptor, TransformBatch};

use crate::assets::cache::AssetCache;
use crate::scene::SceneError;
use crate::scene::body::{Body, BodyTransform};
use crate::scene::host::RenderHost;
use crate::scene::visual::{SharedVisual, VisualObject};

/// Height the root is placed at once the scene is complete.
pub const ROOT_ELEVATION: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub bodies: usize,
    pub visible_visuals: usize,
    pub hidden_visuals: usize,
    pub parked_bodies: usize,
}

/// Named bodies, the single root, and the bodies still waiting for their parent.
pub struct SceneGraph {
    host: Arc<dyn RenderHost>,
    bodies: HashMap<String, Arc<Body>>,
    root: Option<Arc<Body>>,
    /// Keyed by the missing parent's name.
    orphans: HashMap<String, Vec<Arc<Body>>>,
}

impl SceneGraph {
    pub fn new(host: Arc<dyn RenderHost>) -> Self {
        Self {
            host,
            bodies: HashMap::new(),
            root: None,
            orphans: HashMap::new(),
        }
    }

    pub fn root(&self) -> Option<Arc<Body>> {
        self.root.clone()
    }

    pub fn body(&self, name: &str) -> Option<Arc<Body>> {
        self.bodies.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Builds the body with its visuals and links it into the graph. Visuals referencing assets get
    /// them attached whenever those resolve, which may already be the case.
    ///
    /// A body whose parent is unknown is still registered (transforms apply to it), but parked
    /// until the parent shows up. That case is reported as [`SceneError::UnknownParent`], as is a
    /// parent that would close a cycle; such a body stays registered but detached.
    pub fn create_body(&mut self, descriptor: &BodyDescriptor, assets: &AssetCache) -> Result<Arc<Body>, SceneError> {
        let mut visuals = Vec::with_capacity(descriptor.visuals.len());
        for (index, visual_descriptor) in descriptor.visuals.iter().enumerate() {
            let visual = match VisualObject::from_descriptor(visual_descriptor) {
                Ok(visual) => Arc::new(RwLock::new(visual)),
                Err(err) => {
                    warn!("Skipping visual #{} of {}: {}", index, descriptor.name, err);
                    continue;
                }
            };

            Self::wire_assets(&visual, visual_descriptor.mesh.as_deref(), visual_descriptor.material.as_deref(), assets);
            visuals.push(visual);
        }

        let body = Arc::new(Body::new(
            descriptor.name.clone(),
            descriptor.parent.clone(),
            BodyTransform::from(&descriptor.transform),
            visuals,
        ));

        if self.bodies.contains_key(&body.name) {
            warn!("A body named {} already exists, replacing it", body.name);
            self.remove_body(&body.name);
        }
        self.bodies.insert(body.name.clone(), body.clone());

        if let Some(orphans) = self.orphans.remove(&body.name) {
            debug!("{} adopts {} waiting children", body.name, orphans.len());
            for orphan in orphans {
                body.add_child(orphan);
            }
        }

        match &descriptor.parent {
            Some(parent_name) => match self.bodies.get(parent_name) {
                // A subtree contains its own top, so a body naming itself as parent ends up here too.
                Some(parent) if body.subtree().iter().any(|member| Arc::ptr_eq(member, parent)) => {
                    warn!("{} cannot hang below {}, which is part of its own subtree", body.name, parent_name);
                    Err(SceneError::UnknownParent {
                        body: descriptor.name.clone(),
                        parent: parent_name.clone(),
                    })
                }
                Some(parent) => {
                    parent.add_child(body.clone());
                    Ok(body)
                }
                None => {
                    self.orphans
                        .entry(parent_name.clone())
                        .or_default()
                        .push(body);
                    Err(SceneError::UnknownParent {
                        body: descriptor.name.clone(),
                        parent: parent_name.clone(),
                    })
                }
            },
            None => {
                self.set_root(body.clone());
                Ok(body)
            }
        }
    }

    fn wire_assets(visual: &SharedVisual, mesh: Option<&str>, material: Option<&str>, assets: &AssetCache) {
        if let Some(mesh) = mesh {
            let target = visual.clone();
            assets.on_geometry_load(mesh, move |geometry| {
                target
                    .write()
                    .expect("Visual Write Lock")
                    .attach_geometry(geometry)
            });
        }

        if let Some(material) = material {
            let target = visual.clone();
            assets.on_material_load(material, move |material| {
                target
                    .write()
                    .expect("Visual Write Lock")
                    .attach_material(material)
            });
        }
    }

    /// There is only ever one root: a previous one leaves the scene together with its subtree.
    fn set_root(&mut self, body: Arc<Body>) {
        if let Some(previous) = self.root.take() {
            info!("{} replaces {} as the scene root", body.name, previous.name);
            self.host.remove_object(&previous);
            self.forget_subtree(&previous);
        }

        self.host.add_object(body.clone());
        self.root = Some(body);
    }

    /// Drops a body and its subtree from wherever it is attached and from the name index.
    fn remove_body(&mut self, name: &str) {
        let Some(body) = self.bodies.get(name).cloned() else {
            return;
        };

        if self.root.as_ref().is_some_and(|root| Arc::ptr_eq(root, &body)) {
            self.host.remove_object(&body);
            self.root = None;
        } else if let Some(parent_name) = &body.parent {
            let attached = self
                .bodies
                .get(parent_name)
                .is_some_and(|parent| parent.remove_child(&body));

            if !attached {
                if let Some(waiting) = self.orphans.get_mut(parent_name) {
                    waiting.retain(|orphan| !Arc::ptr_eq(orphan, &body));
                }
            }
        }

        self.forget_subtree(&body);
    }

    fn forget_subtree(&mut self, body: &Arc<Body>) {
        for member in body.subtree() {
            let indexed = self
                .bodies
                .get(&member.name)
                .is_some_and(|existing| Arc::ptr_eq(existing, &member));
            if indexed {
                self.bodies.remove(&member.name);
            }
        }
    }

    /// Applies every entry it can and reports the names it could not find.
    pub fn update_transforms(&self, batch: &TransformBatch) -> Vec<SceneError> {
        let mut missing = Vec::new();
        for (name, transform) in batch {
            match self.bodies.get(name) {
                Some(body) => body.set_transform(BodyTransform::from(transform)),
                None => missing.push(SceneError::UnknownBody(name.clone())),
            }
        }
        missing
    }

    /// Moves the root so that the scene's footprint is centered on the origin, slightly above the
    /// ground. Returns the new root position, `None` if there is no root.
    pub fn center_root(&self) -> Option<Vec3> {
        let root = self.root.as_ref()?;
        let bounds = root.world_bounds(&Affine3A::IDENTITY);
        let current = root.transform().position;

        let position = if bounds.is_empty() {
            Vec3::new(current.x, ROOT_ELEVATION, current.z)
        } else {
            let center = bounds.center();
            Vec3::new(current.x - center.x, ROOT_ELEVATION, current.z - center.z)
        };

        root.set_position(position);
        Some(position)
    }

    /// Empties the scene: the root leaves the host, the name index and parked bodies are dropped.
    /// Loaded assets are not affected.
    pub fn reset(&mut self) {
        if let Some(root) = self.root.take() {
            self.host.remove_object(&root);
        }
        self.bodies.clear();
        self.orphans.clear();
    }

    pub fn stats(&self) -> SceneStats {
        let (visible_visuals, hidden_visuals) = self
            .bodies
            .values()
            .flat_map(|body| body.visuals.iter())
            .fold((0, 0), |(visible, hidden), visual| {
                if visual.read().expect("Visual Read Lock").visible {
                    (visible + 1, hidden)
                } else {
                    (visible, hidden + 1)
                }
            });

        SceneStats {
            bodies: self.bodies.len(),
            visible_visuals,
            hidden_visuals,
            parked_bodies: self.orphans.values().map(Vec::len).sum(),
        }
    }
}
