use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use glam::{UVec2, Vec2, Vec3, Vec4};
use itertools::Itertools;
use simview_assets::descriptors::MaterialDescriptor;
use simview_assets::geometry::DecodedGeometry;
use simview_assets::texture::DecodedTexture;

use crate::util::array_as_color;
use crate::util::bounds::BoundingBox;

#[derive(Clone)]
pub struct Geometry {
    pub vertex_buffers: VertexBuffers,
    pub index_buffer: Vec<u32>,
    /// Local space bounds of the positions, computed once on import.
    pub bounds: BoundingBox,
}

impl Debug for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ vertex_buffers: {:?}, ", self.vertex_buffers)?;
        write!(f, "index_buffer: [{}] }}", self.index_buffer.len())
    }
}

#[derive(Clone)]
pub struct VertexBuffers {
    pub position_buffer: Vec<Vec3>,
    pub normals_buffer: Vec<Vec3>,
    pub texcoord_buffer: Option<Vec<Vec2>>,
}

impl Debug for VertexBuffers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ position_buffer: [{}], ", self.position_buffer.len())?;
        write!(f, "normals_buffer: [{}], ", self.normals_buffer.len())?;
        match &self.texcoord_buffer {
            Some(uvs) => write!(f, "texcoord_buffer: [{}] }}", uvs.len()),
            None => write!(f, "texcoord_buffer: None }}"),
        }
    }
}

impl From<DecodedGeometry> for Geometry {
    fn from(value: DecodedGeometry) -> Self {
        let position_buffer = value
            .positions
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .collect_vec();
        let normals_buffer = value
            .normals
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .collect_vec();
        let texcoord_buffer = value
            .uvs
            .map(|uvs| uvs.chunks_exact(2).map(Vec2::from_slice).collect_vec());

        Self {
            bounds: BoundingBox::from_points(position_buffer.iter().copied()),
            vertex_buffers: VertexBuffers {
                position_buffer,
                normals_buffer,
                texcoord_buffer,
            },
            index_buffer: value.indices,
        }
    }
}

#[derive(Clone)]
pub struct Texture {
    pub label: String,
    /// RGBA8, row-major.
    pub data: Vec<u8>,
    pub size: UVec2,
    /// Tiling factor along (u, v), the texture always wraps.
    pub repeat: Vec2,
    pub offset: Vec2,
}

impl Debug for Texture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("label", &self.label)
            .field("data", &format_args!("[{}]", self.data.len()))
            .field("size", &self.size)
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl Texture {
    pub fn from_decoded(label: &str, value: DecodedTexture) -> Self {
        Self {
            label: label.to_string(),
            size: UVec2::new(value.width, value.height),
            data: value.rgba,
            repeat: Vec2::from_array(value.repeat),
            offset: Vec2::ZERO,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / 4
    }
}

/// Physically based material. Everything but the albedo texture is fixed on creation, the texture
/// may arrive (and be swapped in) at any later point.
pub struct Material {
    pub label: String,
    pub base_color: Vec4,
    pub roughness: f32,
    pub metalness: f32,
    pub specular_intensity: f32,
    pub emissive_intensity: f32,
    pub albedo_texture: ArcSwapOption<Texture>,
}

impl Debug for Material {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("label", &self.label)
            .field("base_color", &self.base_color)
            .field("roughness", &self.roughness)
            .field("metalness", &self.metalness)
            .field("specular_intensity", &self.specular_intensity)
            .field("has_texture", &self.albedo_texture.load().is_some())
            .finish()
    }
}

impl Material {
    pub const PLACEHOLDER_COLOR: Vec4 = Vec4::new(1.0, 1.0, 0.9, 1.0);

    /// What visuals are drawn with until their own material arrives.
    pub fn placeholder() -> Self {
        Self {
            label: "placeholder".to_string(),
            base_color: Self::PLACEHOLDER_COLOR,
            roughness: 1.0,
            metalness: 0.0,
            specular_intensity: 1.0,
            emissive_intensity: 0.0,
            albedo_texture: ArcSwapOption::empty(),
        }
    }

    /// Shininess is the inverse of roughness, reflectance drives the metalness.
    pub fn from_descriptor(descriptor: &MaterialDescriptor) -> Self {
        Self {
            label: descriptor.name.clone(),
            base_color: array_as_color(descriptor.color),
            roughness: 1.0 - descriptor.shininess.clamp(0.0, 1.0),
            metalness: descriptor.reflectance.clamp(0.0, 1.0),
            specular_intensity: descriptor.specular.max(0.0),
            emissive_intensity: descriptor.emission.max(0.0),
            albedo_texture: ArcSwapOption::empty(),
        }
    }

    pub fn texture(&self) -> Option<Arc<Texture>> {
        self.albedo_texture.load_full()
    }

    pub fn attach_texture(&self, texture: Arc<Texture>) {
        self.albedo_texture.store(Some(texture));
    }
}
