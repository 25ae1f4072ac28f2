use std::str::FromStr;
use std::sync::{Arc, RwLock};

use glam::{Affine3A, Quat, Vec3};
use simview_assets::descriptors::VisualDescriptor;

use crate::assets::types::{Geometry, Material};
use crate::scene::SceneError;
use crate::util::bounds::{
    BoundingBox, CAPSULE_BOUNDS, CUBE_BOUNDS, CYLINDER_BOUNDS, PLANE_BOUNDS, SPHERE_BOUNDS,
};
use crate::util::{array_as_quat, array_as_vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Mesh,
    Plane,
    Quad,
    Sphere,
    Cube,
    Cylinder,
    Capsule,
}

impl FromStr for ShapeKind {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MESH" => Ok(ShapeKind::Mesh),
            "PLANE" => Ok(ShapeKind::Plane),
            "QUAD" => Ok(ShapeKind::Quad),
            "SPHERE" => Ok(ShapeKind::Sphere),
            "CUBE" => Ok(ShapeKind::Cube),
            "CYLINDER" => Ok(ShapeKind::Cylinder),
            "CAPSULE" => Ok(ShapeKind::Capsule),
            other => Err(SceneError::UnsupportedShape(other.to_string())),
        }
    }
}

impl ShapeKind {
    /// Bounds of the procedural shape that stands in until (or instead of) a real geometry.
    pub fn placeholder_bounds(&self) -> BoundingBox {
        match self {
            ShapeKind::Mesh | ShapeKind::Cube => CUBE_BOUNDS,
            ShapeKind::Plane | ShapeKind::Quad => PLANE_BOUNDS,
            ShapeKind::Sphere => SPHERE_BOUNDS,
            ShapeKind::Cylinder => CYLINDER_BOUNDS,
            ShapeKind::Capsule => CAPSULE_BOUNDS,
        }
    }
}

pub type SharedVisual = Arc<RwLock<VisualObject>>;

#[derive(Debug)]
pub struct VisualObject {
    pub kind: ShapeKind,
    /// `None` while the placeholder shape is in use.
    pub geometry: Option<Arc<Geometry>>,
    pub material: Arc<Material>,
    pub geometry_ref: Option<String>,
    pub material_ref: Option<String>,
    pub scale: Vec3,
    pub position: Vec3,
    pub orientation: Quat,
    pub visible: bool,
}

impl VisualObject {
    /// Visuals referencing a mesh start out hidden, their placeholder is never shown.
    pub fn from_descriptor(descriptor: &VisualDescriptor) -> Result<Self, SceneError> {
        let kind = descriptor.kind.parse::<ShapeKind>()?;
        Ok(Self {
            kind,
            geometry: None,
            material: Arc::new(Material::placeholder()),
            geometry_ref: descriptor.mesh.clone(),
            material_ref: descriptor.material.clone(),
            scale: array_as_vec3(descriptor.transform.scale),
            position: array_as_vec3(descriptor.transform.position),
            orientation: array_as_quat(descriptor.transform.quaternion),
            visible: descriptor.mesh.is_none(),
        })
    }

    pub fn local_transform(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }

    /// Bounds in the space of the owning body.
    pub fn local_bounds(&self) -> BoundingBox {
        let bounds = match &self.geometry {
            Some(geometry) => geometry.bounds,
            None => self.kind.placeholder_bounds(),
        };
        bounds.transformed(&self.local_transform())
    }

    pub fn attach_geometry(&mut self, geometry: Arc<Geometry>) {
        self.geometry = Some(geometry);
        self.visible = true;
    }

    pub fn attach_material(&mut self, material: Arc<Material>) {
        self.material = material;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simview_assets::descriptors::TransformDescriptor;

    fn descriptor(kind: &str, mesh: Option<&str>) -> VisualDescriptor {
        VisualDescriptor {
            kind: kind.to_string(),
            mesh: mesh.map(str::to_string),
            material: Some("red".to_string()),
            transform: TransformDescriptor {
                position: [1.0, 0.0, 0.0],
                quaternion: [0.0, 0.0, 0.0, 1.0],
                scale: [2.0, 2.0, 2.0],
            },
        }
    }

    #[test]
    fn parses_every_shape_kind() {
        for (name, kind) in [
            ("MESH", ShapeKind::Mesh),
            ("PLANE", ShapeKind::Plane),
            ("QUAD", ShapeKind::Quad),
            ("SPHERE", ShapeKind::Sphere),
            ("CUBE", ShapeKind::Cube),
            ("CYLINDER", ShapeKind::Cylinder),
            ("CAPSULE", ShapeKind::Capsule),
        ] {
            assert_eq!(name.parse::<ShapeKind>().unwrap(), kind);
        }

        assert_eq!(
            "NONE".parse::<ShapeKind>().unwrap_err(),
            SceneError::UnsupportedShape("NONE".to_string())
        );
    }

    #[test]
    fn mesh_visuals_start_hidden() {
        let hidden = VisualObject::from_descriptor(&descriptor("MESH", Some("foo"))).unwrap();
        assert!(!hidden.visible);
        assert_eq!(hidden.material.base_color, Material::PLACEHOLDER_COLOR);
        assert_eq!(hidden.material.label, "placeholder");

        let shown = VisualObject::from_descriptor(&descriptor("SPHERE", None)).unwrap();
        assert!(shown.visible);
    }

    #[test]
    fn placeholder_bounds_follow_the_local_transform() {
        let visual = VisualObject::from_descriptor(&descriptor("CUBE", None)).unwrap();
        let bounds = visual.local_bounds();
        assert_eq!(bounds.min, Vec3::new(0.0, -1.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 1.0, 1.0));
    }
}
