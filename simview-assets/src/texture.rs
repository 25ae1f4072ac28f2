use crate::descriptors::TextureDescriptor;
use crate::DecodeError;

pub const OPAQUE_ALPHA: u8 = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, row-major.
    pub rgba: Vec<u8>,
    pub repeat: [f32; 2],
}

impl DecodedTexture {
    pub fn pixel_count(&self) -> usize {
        self.rgba.len() / 4
    }
}

/// Textures are shipped as raw, packed RGB. Uploading wants RGBA, so every pixel gets an opaque
/// alpha byte appended, the color bytes keep their order.
pub fn expand_rgb_to_rgba(rgb: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if rgb.len() % 3 != 0 {
        return Err(DecodeError::TruncatedPixels { len: rgb.len() });
    }

    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for pixel in rgb.chunks_exact(3) {
        rgba.extend_from_slice(pixel);
        rgba.push(OPAQUE_ALPHA);
    }
    Ok(rgba)
}

pub fn decode_texture(payload: &[u8], descriptor: &TextureDescriptor) -> Result<DecodedTexture, DecodeError> {
    Ok(DecodedTexture {
        width: descriptor.width,
        height: descriptor.height,
        rgba: expand_rgb_to_rgba(payload)?,
        repeat: descriptor.repeat,
    })
}
