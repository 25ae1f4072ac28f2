use std::sync::{Arc, RwLock};

use glam::{Affine3A, Quat, Vec3};
use simview_assets::descriptors::TransformDescriptor;

use crate::scene::visual::SharedVisual;
use crate::util::bounds::BoundingBox;
use crate::util::{array_as_quat, array_as_vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyTransform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for BodyTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

/// Bodies are rigid, a scale in the descriptor is ignored.
impl From<&TransformDescriptor> for BodyTransform {
    fn from(value: &TransformDescriptor) -> Self {
        Self {
            position: array_as_vec3(value.position),
            orientation: array_as_quat(value.quaternion),
        }
    }
}

#[derive(Debug)]
pub struct Body {
    pub name: String,
    /// Only the name, the parent owns its children and not the other way around.
    pub parent: Option<String>,
    transform: RwLock<BodyTransform>,
    pub visuals: Vec<SharedVisual>,
    children: RwLock<Vec<Arc<Body>>>,
}

impl Body {
    pub fn new(name: String, parent: Option<String>, transform: BodyTransform, visuals: Vec<SharedVisual>) -> Self {
        Self {
            name,
            parent,
            transform: RwLock::new(transform),
            visuals,
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn transform(&self) -> BodyTransform {
        *self.transform.read().expect("Transform Read Lock")
    }

    pub fn set_transform(&self, transform: BodyTransform) {
        *self.transform.write().expect("Transform Write Lock") = transform;
    }

    pub fn set_position(&self, position: Vec3) {
        self.transform.write().expect("Transform Write Lock").position = position;
    }

    pub fn local_matrix(&self) -> Affine3A {
        let transform = self.transform();
        Affine3A::from_rotation_translation(transform.orientation, transform.position)
    }

    pub fn children(&self) -> Vec<Arc<Body>> {
        self.children.read().expect("Children Read Lock").clone()
    }

    pub fn add_child(&self, child: Arc<Body>) {
        self.children
            .write()
            .expect("Children Write Lock")
            .push(child);
    }

    pub fn remove_child(&self, child: &Arc<Body>) -> bool {
        let mut children = self.children.write().expect("Children Write Lock");
        let before = children.len();
        children.retain(|existing| !Arc::ptr_eq(existing, child));
        children.len() != before
    }

    /// This body and all of its descendants, depth first.
    pub fn subtree(self: &Arc<Self>) -> Vec<Arc<Body>> {
        let mut bodies = vec![self.clone()];
        let mut index = 0;
        while index < bodies.len() {
            let children = bodies[index].children();
            bodies.extend(children);
            index += 1;
        }
        bodies
    }

    /// World space bounds of every visual in this subtree, hidden ones included.
    pub fn world_bounds(&self, parent_world: &Affine3A) -> BoundingBox {
        let world = *parent_world * self.local_matrix();

        let own = self
            .visuals
            .iter()
            .map(|visual| {
                visual
                    .read()
                    .expect("Visual Read Lock")
                    .local_bounds()
                    .transformed(&world)
            })
            .fold(BoundingBox::EMPTY, BoundingBox::union);

        self.children()
            .iter()
            .map(|child| child.world_bounds(&world))
            .fold(own, BoundingBox::union)
    }
}
