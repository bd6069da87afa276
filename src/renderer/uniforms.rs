use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::scene::MaterialShaderAttribs;

/// Per-draw node transform block (`NodeTransforms` in `shader/pbr.wgsl`).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct NodeTransforms {
    pub node_matrix: [[f32; 4]; 4],
    pub joint_count: i32,
    pub _pad: [i32; 3],
}

impl NodeTransforms {
    pub fn new(node_matrix: Mat4, joint_count: u32) -> Self {
        Self {
            node_matrix: node_matrix.to_cols_array_2d(),
            joint_count: joint_count as i32,
            _pad: [0; 3],
        }
    }
}

/// Renderer-wide shader parameters, re-uploaded with every draw alongside
/// the material attribs (`RendererParams` in `shader/pbr.wgsl`).
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RendererShaderParams {
    pub debug_view: i32,
    pub occlusion_strength: f32,
    pub emission_scale: f32,
    pub ibl_scale: f32,
    pub average_log_lum: f32,
    pub middle_gray: f32,
    pub white_point: f32,
    pub prefiltered_mip_count: f32,
}

/// The combined per-draw constant block: renderer parameters followed by
/// the material's shader attribs, written with one arena push per draw.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct PrimitiveShaderData {
    pub render: RendererShaderParams,
    pub material: MaterialShaderAttribs,
}

// Per-draw data is re-uploaded for every primitive; keep it small.
const _: () = assert!(std::mem::size_of::<PrimitiveShaderData>() <= 256);

/// Layout contract for the caller-supplied camera constant buffer
/// (`CameraAttribs` in `shader/pbr.wgsl`).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CameraAttribs {
    pub view_proj: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub _pad: f32,
}

impl CameraAttribs {
    pub fn new(view_proj: Mat4, position: Vec3) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            position: position.to_array(),
            _pad: 0.0,
        }
    }
}

/// Layout contract for the caller-supplied light constant buffer: one
/// directional light (`LightAttribs` in `shader/pbr.wgsl`).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightAttribs {
    /// Direction the light travels, xyz; w unused.
    pub direction: [f32; 4],
    /// Linear RGB intensity; w unused.
    pub intensity: [f32; 4],
}

/// Per-iteration parameters for the environment precompute passes
/// (`EnvMapRenderAttribs` in the precompute shaders).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct EnvMapRenderAttribs {
    pub rotation: [[f32; 4]; 4],
    pub roughness: f32,
    pub env_map_dim: f32,
    pub num_samples: u32,
    pub _pad: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_transforms_is_80_bytes() {
        // mat4x4<f32> = 64 bytes, i32 + 12 bytes padding = 80 bytes
        assert_eq!(std::mem::size_of::<NodeTransforms>(), 80);
    }

    #[test]
    fn renderer_params_is_32_bytes() {
        assert_eq!(std::mem::size_of::<RendererShaderParams>(), 32);
    }

    #[test]
    fn primitive_shader_data_fits_one_arena_slot() {
        assert_eq!(std::mem::size_of::<PrimitiveShaderData>(), 224);
        assert!(std::mem::size_of::<PrimitiveShaderData>() <= 256);
    }

    #[test]
    fn camera_attribs_is_80_bytes() {
        assert_eq!(std::mem::size_of::<CameraAttribs>(), 80);
    }

    #[test]
    fn env_map_attribs_is_80_bytes() {
        assert_eq!(std::mem::size_of::<EnvMapRenderAttribs>(), 80);
    }
}
