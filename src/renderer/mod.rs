pub mod uniforms;

mod draw_plan;
mod pipeline_builder;
mod renderer;

pub(crate) mod internal;

pub use internal::variants::PipelineKey;
pub use renderer::PbrRenderer;

use bitflags::bitflags;
use glam::Mat4;

bitflags! {
    /// Selects which alpha-mode passes a render call emits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AlphaModeFlags: u32 {
        const OPAQUE = 1 << 0;
        const MASK = 1 << 1;
        const BLEND = 1 << 2;
        const ALL = Self::OPAQUE.bits() | Self::MASK.bits() | Self::BLEND.bits();
    }
}

/// Shader debug output selector; only honored when the renderer was
/// constructed with `allow_debug_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugView {
    None = 0,
    BaseColor = 1,
    Transparency = 2,
    NormalMap = 3,
    Occlusion = 4,
    Emissive = 5,
    Metallic = 6,
    Roughness = 7,
    DiffuseColor = 8,
    SpecularColor = 9,
    Reflectance90 = 10,
    MeshNormal = 11,
    PerturbedNormal = 12,
    NdotV = 13,
    DiffuseIbl = 14,
    SpecularIbl = 15,
}

/// Per-frame render parameters: a read-only snapshot consumed by one
/// render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderParams {
    /// Root transform applied on top of every node's mesh transform.
    pub model_transform: Mat4,
    pub alpha_modes: AlphaModeFlags,
    pub debug_view: DebugView,
    pub occlusion_strength: f32,
    pub emission_scale: f32,
    pub ibl_scale: f32,
    /// Average log luminance used by tone mapping.
    pub average_log_lum: f32,
    /// Middle gray value used by tone mapping.
    pub middle_gray: f32,
    /// White point value used by tone mapping.
    pub white_point: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            model_transform: Mat4::IDENTITY,
            alpha_modes: AlphaModeFlags::ALL,
            debug_view: DebugView::None,
            occlusion_strength: 1.0,
            emission_scale: 1.0,
            ibl_scale: 1.0,
            average_log_lum: 0.3,
            middle_gray: 0.18,
            white_point: 1.0,
        }
    }
}

/// One material's shader-resource binding. The texture set is fixed at
/// creation; the constant-buffer bindings inside it reference the same
/// camera/light buffers as every other binding of the model.
pub struct MaterialBinding {
    pub(crate) bind_group: wgpu::BindGroup,
}

/// Caller-owned binding set for a model: one binding per material index,
/// order-preserving.
#[derive(Default)]
pub struct ModelBindings {
    pub materials: Vec<MaterialBinding>,
}

impl ModelBindings {
    pub fn clear(&mut self) {
        self.materials.clear();
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Shared binding for the resource-cache render path, stamped with the
/// cache's texture-atlas version so it can be rebuilt lazily when the
/// atlas changes and reused (identity-stable) otherwise.
pub struct CacheBindings {
    pub version: u32,
    pub(crate) binding: Option<MaterialBinding>,
    pub(crate) basic_attribs: Option<wgpu::Buffer>,
    pub(crate) skin_attribs: Option<wgpu::Buffer>,
    pub(crate) index: Option<wgpu::Buffer>,
}

impl CacheBindings {
    pub(crate) fn is_stale(&self, version: u32) -> bool {
        self.binding.is_none() || self.version != version
    }

    pub fn has_binding(&self) -> bool {
        self.binding.is_some()
    }
}

impl Default for CacheBindings {
    fn default() -> Self {
        Self {
            version: u32::MAX,
            binding: None,
            basic_attribs: None,
            skin_attribs: None,
            index: None,
        }
    }
}

/// Exactly one binding source accompanies every render call; the enum
/// makes the either/or contract structural.
pub enum BindingSource<'a> {
    Model(&'a ModelBindings),
    Cache(&'a CacheBindings),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cache_bindings_are_stale_for_any_version() {
        let bindings = CacheBindings::default();
        assert!(bindings.is_stale(0));
        assert!(bindings.is_stale(u32::MAX));
    }

    #[test]
    fn cache_bindings_staleness_follows_the_version_stamp() {
        // A populated binding is only stale when the version differs.
        let bindings = CacheBindings {
            version: 7,
            binding: None,
            ..CacheBindings::default()
        };
        // Without a binding object even a matching version is stale.
        assert!(bindings.is_stale(7));
    }

    #[test]
    fn alpha_mode_flags_all_covers_every_pass() {
        assert!(AlphaModeFlags::ALL.contains(AlphaModeFlags::OPAQUE));
        assert!(AlphaModeFlags::ALL.contains(AlphaModeFlags::MASK));
        assert!(AlphaModeFlags::ALL.contains(AlphaModeFlags::BLEND));
    }
}
