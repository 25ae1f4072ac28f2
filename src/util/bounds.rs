use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box. The default box is empty, so it can be grown with [`BoundingBox::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Unit cube, centered at the origin.
pub const CUBE_BOUNDS: BoundingBox = BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5));

/// Unit plane, lying in XY.
pub const PLANE_BOUNDS: BoundingBox = BoundingBox::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 0.0));

/// Sphere of radius 1.
pub const SPHERE_BOUNDS: BoundingBox = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));

/// Cylinder of radius 1 and height 1 along Y.
pub const CYLINDER_BOUNDS: BoundingBox = BoundingBox::new(Vec3::new(-1.0, -0.5, -1.0), Vec3::new(1.0, 0.5, 1.0));

/// Capsule of radius 1 with a straight section of length 1 along Y.
pub const CAPSULE_BOUNDS: BoundingBox = BoundingBox::new(Vec3::new(-1.0, -1.5, -1.0), Vec3::new(1.0, 1.5, 1.0));

impl BoundingBox {
    pub const EMPTY: BoundingBox = BoundingBox::new(Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY));

    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |bounds, point| bounds.including(point))
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// The center of an empty box is the origin.
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn including(self, point: Vec3) -> Self {
        Self::new(self.min.min(point), self.max.max(point))
    }

    pub fn union(self, other: BoundingBox) -> Self {
        if other.is_empty() {
            return self;
        }
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Bounds of this box after transforming it, which may be larger than the tight bounds of the
    /// transformed contents.
    pub fn transformed(&self, transform: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(
            self.corners()
                .into_iter()
                .map(|corner| transform.transform_point3(corner)),
        )
    }
}
