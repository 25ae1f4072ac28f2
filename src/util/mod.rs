use glam::{Quat, Vec3, Vec4};

pub mod bounds;

pub fn array_as_color(rgba: [f32; 4]) -> Vec4 {
    Vec4::from_array(rgba).clamp(Vec4::ZERO, Vec4::ONE)
}

/// The server sends `[x, y, z, w]`. A degenerate (all zero) quaternion would collapse everything it
/// touches, so that one is replaced by the identity.
pub fn array_as_quat(xyzw: [f32; 4]) -> Quat {
    let quat = Quat::from_array(xyzw);
    if quat.length_squared() <= f32::EPSILON {
        Quat::IDENTITY
    } else {
        quat.normalize()
    }
}

pub fn array_as_vec3(xyz: [f32; 3]) -> Vec3 {
    Vec3::from_array(xyz)
}
