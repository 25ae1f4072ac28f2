use thiserror::Error;

/// Everything that can be wrong with a payload the scene server hands us. All of these leave the
/// affected asset unloaded, they never take down the viewer.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("The {buffer} range (offset {offset}, {count} elements) exceeds the payload of {payload_len} bytes")]
    RangeOutOfBounds {
        buffer: &'static str,
        offset: usize,
        count: usize,
        payload_len: usize,
    },

    #[error("The {buffer} range starts at offset {offset}, which is not 4-byte aligned")]
    Misaligned { buffer: &'static str, offset: usize },

    #[error("The {buffer} buffer has {count} elements, which is not a multiple of its stride {stride}")]
    BadStride {
        buffer: &'static str,
        count: usize,
        stride: usize,
    },

    #[error("Index {index} references a vertex beyond the {vertex_count} vertices of the geometry")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("Packed RGB payload of {len} bytes is not a whole number of pixels")]
    TruncatedPixels { len: usize },
}

pub mod descriptors;
pub mod geometry;
pub mod texture;
