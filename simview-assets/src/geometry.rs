use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::descriptors::{BufferLayout, GeometryDescriptor};
use crate::DecodeError;

const ELEMENT_SIZE: usize = 4;
pub const POSITION_STRIDE: usize = 3;
pub const NORMAL_STRIDE: usize = 3;
pub const UV_STRIDE: usize = 2;

/// The typed arrays of a geometry payload, still flat as they were on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGeometry {
    pub indices: Vec<u32>,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    /// Only present if the descriptor declared a non-empty uv range.
    pub uvs: Option<Vec<f32>>,
}

impl DecodedGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / POSITION_STRIDE
    }
}

/// Slices the four (three, without uvs) little endian arrays out of a single payload buffer.
pub fn decode_geometry(payload: &[u8], descriptor: &GeometryDescriptor) -> Result<DecodedGeometry, DecodeError> {
    let indices = read_u32s(payload, descriptor.index_layout, "index")?;

    let positions = read_f32s(payload, descriptor.vertex_layout, "vertex")?;
    check_stride(positions.len(), POSITION_STRIDE, "vertex")?;

    let normals = read_f32s(payload, descriptor.normal_layout, "normal")?;
    check_stride(normals.len(), NORMAL_STRIDE, "normal")?;

    let uvs = if descriptor.uv_layout.count() > 0 {
        let uvs = read_f32s(payload, descriptor.uv_layout, "uv")?;
        check_stride(uvs.len(), UV_STRIDE, "uv")?;
        Some(uvs)
    } else {
        None
    };

    let vertex_count = positions.len() / POSITION_STRIDE;
    if let Some(&index) = indices.iter().find(|&&index| index as usize >= vertex_count) {
        return Err(DecodeError::IndexOutOfRange { index, vertex_count });
    }

    Ok(DecodedGeometry {
        indices,
        positions,
        normals,
        uvs,
    })
}

fn byte_range(payload_len: usize, layout: BufferLayout, buffer: &'static str) -> Result<Range<usize>, DecodeError> {
    let BufferLayout(offset, count) = layout;
    if offset % ELEMENT_SIZE != 0 {
        return Err(DecodeError::Misaligned { buffer, offset });
    }

    let end = count
        .checked_mul(ELEMENT_SIZE)
        .and_then(|len| offset.checked_add(len))
        .filter(|&end| end <= payload_len)
        .ok_or(DecodeError::RangeOutOfBounds {
            buffer,
            offset,
            count,
            payload_len,
        })?;

    Ok(offset..end)
}

fn read_u32s(payload: &[u8], layout: BufferLayout, buffer: &'static str) -> Result<Vec<u32>, DecodeError> {
    let range = byte_range(payload.len(), layout, buffer)?;
    let mut values = vec![0u32; layout.count()];
    LittleEndian::read_u32_into(&payload[range], &mut values);
    Ok(values)
}

fn read_f32s(payload: &[u8], layout: BufferLayout, buffer: &'static str) -> Result<Vec<f32>, DecodeError> {
    let range = byte_range(payload.len(), layout, buffer)?;
    let mut values = vec![0f32; layout.count()];
    LittleEndian::read_f32_into(&payload[range], &mut values);
    Ok(values)
}

fn check_stride(count: usize, stride: usize, buffer: &'static str) -> Result<(), DecodeError> {
    if count % stride != 0 {
        return Err(DecodeError::BadStride { buffer, count, stride });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_count_range_may_sit_at_the_end() {
        assert_eq!(byte_range(8, BufferLayout(8, 0), "uv").unwrap(), 8..8);
    }

    #[test]
    fn overflowing_counts_are_rejected() {
        let err = byte_range(8, BufferLayout(4, usize::MAX), "vertex").unwrap_err();
        assert!(matches!(err, DecodeError::RangeOutOfBounds { buffer: "vertex", .. }));
    }

    #[test]
    fn unaligned_offsets_are_rejected() {
        let err = byte_range(64, BufferLayout(6, 1), "normal").unwrap_err();
        assert!(matches!(err, DecodeError::Misaligned { offset: 6, .. }));
    }
}
