//! The JSON payloads of the scene instructions. Field names follow the wire format of the scene
//! server, unknown fields are ignored and anything optional falls back to the server's defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `[byte_offset, element_count]` of one typed array inside a geometry payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferLayout(pub usize, pub usize);

impl BufferLayout {
    pub fn offset(&self) -> usize {
        self.0
    }

    pub fn count(&self) -> usize {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDescriptor {
    pub name: String,
    pub hash: String,
    pub index_layout: BufferLayout,
    pub vertex_layout: BufferLayout,
    pub normal_layout: BufferLayout,
    #[serde(default)]
    pub uv_layout: BufferLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDescriptor {
    pub name: String,
    pub hash: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default = "default_repeat")]
    pub repeat: [f32; 2],
    #[serde(default, rename = "textureType", skip_serializing_if = "Option::is_none")]
    pub texture_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDescriptor {
    pub name: String,
    pub color: [f32; 4],
    #[serde(default = "half")]
    pub shininess: f32,
    #[serde(default)]
    pub reflectance: f32,
    #[serde(default = "half")]
    pub specular: f32,
    #[serde(default)]
    pub emission: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDescriptor {
    #[serde(default)]
    pub position: [f32; 3],
    /// `[x, y, z, w]`
    #[serde(default = "identity_quaternion")]
    pub quaternion: [f32; 4],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

impl Default for TransformDescriptor {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            quaternion: identity_quaternion(),
            scale: unit_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDescriptor {
    /// One of `MESH`, `PLANE`, `QUAD`, `SPHERE`, `CUBE`, `CYLINDER`, `CAPSULE`. Kept as the raw
    /// string, so the consumer can report what exactly it did not understand.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub mesh: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub transform: TransformDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub transform: TransformDescriptor,
    #[serde(default)]
    pub visuals: Vec<VisualDescriptor>,
}

/// Payload of `UPDATE_TRANSFORM`: body name to its new local transform.
pub type TransformBatch = BTreeMap<String, TransformDescriptor>;

fn default_repeat() -> [f32; 2] {
    [1.0, 1.0]
}

fn half() -> f32 {
    0.5
}

fn identity_quaternion() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}
