use bytemuck::{Pod, Zeroable};
use std::mem;

/// Vertex stream 0: position, normal and both UV sets interleaved.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct BasicVertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
}

impl BasicVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x2
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<BasicVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Vertex stream 1: skinning attributes. Loaders fill this stream with
/// zeroes for rigid meshes so that every model can be drawn with the same
/// pipeline layout.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct SkinVertex {
    pub joints: [f32; 4],
    pub weights: [f32; 4],
}

impl SkinVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        4 => Float32x4,
        5 => Float32x4
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<SkinVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_vertex_stride_matches_struct_size() {
        assert_eq!(
            BasicVertex::layout().array_stride,
            std::mem::size_of::<BasicVertex>() as wgpu::BufferAddress
        );
        assert_eq!(std::mem::size_of::<BasicVertex>(), 40);
    }

    #[test]
    fn skin_vertex_stride_matches_struct_size() {
        assert_eq!(
            SkinVertex::layout().array_stride,
            std::mem::size_of::<SkinVertex>() as wgpu::BufferAddress
        );
        assert_eq!(std::mem::size_of::<SkinVertex>(), 32);
    }
}
