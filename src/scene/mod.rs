//! Scene-graph data consumed by the renderer.
//!
//! These types are the interface boundary towards the asset/import layer:
//! a loader builds a [`Model`] (node hierarchy flattened into
//! `linear_nodes`, meshes with primitives, materials, GPU buffers and
//! textures) and hands it to the renderer, which never mutates it.

pub mod vertex;

pub use vertex::{BasicVertex, SkinVertex};

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// glTF material alpha mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

/// PBR workflow selector stored in [`MaterialShaderAttribs::workflow`].
pub const PBR_WORKFLOW_METALLIC_ROUGHNESS: f32 = 0.0;
pub const PBR_WORKFLOW_SPECULAR_GLOSSINESS: f32 = 1.0;

/// Shader-visible material parameters, uploaded verbatim per draw.
///
/// Layout mirrors the `MaterialAttribs` struct in `shader/pbr.wgsl`; the
/// per-slot UV selectors pick between the two UV sets and the per-slot
/// slice/scale-bias values address texture-atlas sub-rectangles.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialShaderAttribs {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 4],
    pub specular_factor: [f32; 4],
    pub workflow: f32,
    pub base_color_uv: f32,
    pub physical_desc_uv: f32,
    pub normal_uv: f32,
    pub occlusion_uv: f32,
    pub emissive_uv: f32,
    pub base_color_slice: f32,
    pub physical_desc_slice: f32,
    pub normal_slice: f32,
    pub occlusion_slice: f32,
    pub emissive_slice: f32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_mode: f32,
    pub alpha_cutoff: f32,
    pub _pad: f32,
    pub uv_scale_bias: [[f32; 4]; 5],
}

impl Default for MaterialShaderAttribs {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            emissive_factor: [0.0, 0.0, 0.0, 1.0],
            specular_factor: [1.0; 4],
            workflow: PBR_WORKFLOW_METALLIC_ROUGHNESS,
            base_color_uv: 0.0,
            physical_desc_uv: 0.0,
            normal_uv: 0.0,
            occlusion_uv: 0.0,
            emissive_uv: 0.0,
            base_color_slice: 0.0,
            physical_desc_slice: 0.0,
            normal_slice: 0.0,
            occlusion_slice: 0.0,
            emissive_slice: 0.0,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            alpha_mode: 0.0,
            alpha_cutoff: 0.5,
            _pad: 0.0,
            uv_scale_bias: [[1.0, 1.0, 0.0, 0.0]; 5],
        }
    }
}

/// Per-slot texture references into [`Model::textures`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureSlots {
    pub base_color: Option<u32>,
    pub physical_descriptor: Option<u32>,
    pub normal: Option<u32>,
    pub occlusion: Option<u32>,
    pub emissive: Option<u32>,
}

/// A glTF material record: shader parameters plus the pipeline-relevant
/// state (alpha mode, double-sidedness) and texture slot assignments.
#[derive(Debug, Clone)]
pub struct Material {
    pub attribs: MaterialShaderAttribs,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub textures: TextureSlots,
}

impl Material {
    pub fn new() -> Self {
        Self {
            attribs: MaterialShaderAttribs::default(),
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            textures: TextureSlots::default(),
        }
    }

    pub fn with_base_color(mut self, factor: [f32; 4]) -> Self {
        self.attribs.base_color_factor = factor;
        self
    }

    pub fn with_metallic_roughness(mut self, metallic: f32, roughness: f32) -> Self {
        self.attribs.metallic_factor = metallic.clamp(0.0, 1.0);
        self.attribs.roughness_factor = roughness.clamp(0.0, 1.0);
        self
    }

    /// Sets the alpha mode both on the CPU record (pass selection) and in
    /// the shader attribs (per-pixel mask test).
    pub fn with_alpha_mode(mut self, mode: AlphaMode, cutoff: f32) -> Self {
        self.alpha_mode = mode;
        self.attribs.alpha_mode = match mode {
            AlphaMode::Opaque => 0.0,
            AlphaMode::Mask => 1.0,
            AlphaMode::Blend => 2.0,
        };
        self.attribs.alpha_cutoff = cutoff;
        self
    }

    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    pub fn with_base_color_texture(mut self, index: u32) -> Self {
        self.textures.base_color = Some(index);
        self
    }

    pub fn with_physical_descriptor_texture(mut self, index: u32) -> Self {
        self.textures.physical_descriptor = Some(index);
        self
    }

    pub fn with_normal_texture(mut self, index: u32) -> Self {
        self.textures.normal = Some(index);
        self
    }

    pub fn with_occlusion_texture(mut self, index: u32) -> Self {
        self.textures.occlusion = Some(index);
        self
    }

    pub fn with_emissive_texture(mut self, index: u32) -> Self {
        self.textures.emissive = Some(index);
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

/// A drawable sub-range of the model's vertex/index data.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    pub material_index: u32,
    /// Offset into the index buffer, relative to the model's `first_index`.
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_count: u32,
}

impl Primitive {
    pub fn has_indices(&self) -> bool {
        self.index_count > 0
    }
}

/// Evaluated transforms for one mesh: the node-local matrix and, for
/// skinned meshes, the current joint palette.
#[derive(Debug, Clone, Default)]
pub struct MeshTransforms {
    pub matrix: Mat4,
    pub joint_matrices: Vec<Mat4>,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
    pub transforms: MeshTransforms,
}

/// One entry of the flattened node list. Nodes without a mesh (joints,
/// cameras, pure transforms) carry `None` and are skipped by the renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Node {
    pub mesh: Option<usize>,
}

/// Logical buffer slots exposed by models and resource caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    BasicAttribs,
    SkinAttribs,
    Index,
}

/// A texture owned by a model, with an optional per-texture sampler used
/// when the renderer is configured for dynamic (non-immutable) samplers.
pub struct ModelTexture {
    pub texture: wgpu::Texture,
    pub sampler: Option<wgpu::Sampler>,
}

/// GPU buffers backing a model. Both vertex streams are mandatory; the
/// index buffer is absent for purely non-indexed models.
pub struct ModelBuffers {
    pub basic_attribs: wgpu::Buffer,
    pub skin_attribs: wgpu::Buffer,
    pub index: Option<wgpu::Buffer>,
}

/// A loaded glTF model: the flattened scene graph plus its GPU resources.
///
/// `base_vertex` / `first_index` locate the model inside sub-allocated
/// buffer regions when several models share one buffer pool.
pub struct Model {
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub linear_nodes: Vec<Node>,
    pub textures: Vec<ModelTexture>,
    pub buffers: ModelBuffers,
    pub base_vertex: i32,
    pub first_index: u32,
}

impl Model {
    pub fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        match id {
            BufferId::BasicAttribs => Some(&self.buffers.basic_attribs),
            BufferId::SkinAttribs => Some(&self.buffers.skin_attribs),
            BufferId::Index => self.buffers.index.as_ref(),
        }
    }
}

/// Shared texture/buffer pool consumed by the resource-cache render path.
///
/// The version counter must increase whenever atlas content changes; the
/// renderer compares it against the stamp stored in its cache binding and
/// rebuilds lazily. Callers serialize cache mutation against rendering.
pub trait ResourceCache {
    fn version(&self) -> u32;
    /// Texture atlas lookup by pixel format.
    fn texture(&self, format: wgpu::TextureFormat) -> Option<&wgpu::Texture>;
    fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer>;
}

/// Formats used to resolve the five material texture slots against a
/// [`ResourceCache`]'s per-format atlases.
#[derive(Debug, Clone, Copy)]
pub struct CacheUseInfo {
    pub base_color_format: wgpu::TextureFormat,
    pub physical_descriptor_format: wgpu::TextureFormat,
    pub normal_format: wgpu::TextureFormat,
    pub occlusion_format: wgpu::TextureFormat,
    pub emissive_format: wgpu::TextureFormat,
}

impl Default for CacheUseInfo {
    fn default() -> Self {
        Self {
            base_color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            physical_descriptor_format: wgpu::TextureFormat::Rgba8Unorm,
            normal_format: wgpu::TextureFormat::Rgba8Unorm,
            occlusion_format: wgpu::TextureFormat::Rgba8Unorm,
            emissive_format: wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_attribs_size_is_uniform_compatible() {
        // Must match the WGSL MaterialAttribs struct and stay 16-aligned.
        assert_eq!(std::mem::size_of::<MaterialShaderAttribs>(), 192);
        assert_eq!(std::mem::size_of::<MaterialShaderAttribs>() % 16, 0);
    }

    #[test]
    fn alpha_mode_builder_keeps_shader_attribs_in_sync() {
        let m = Material::new().with_alpha_mode(AlphaMode::Mask, 0.25);
        assert_eq!(m.alpha_mode, AlphaMode::Mask);
        assert_eq!(m.attribs.alpha_mode, 1.0);
        assert_eq!(m.attribs.alpha_cutoff, 0.25);
    }
}
