use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Renderer construction parameters.
///
/// The attachment formats are runtime values and are not serialized; when
/// both are `None` the renderer runs headless: no pipelines or constant
/// buffers are created and only the default/environment resources exist,
/// for callers that do fully custom rendering on top of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(skip)]
    pub color_format: Option<wgpu::TextureFormat>,
    #[serde(skip)]
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Counter-clockwise triangles are front-facing when true.
    #[serde(default)]
    pub front_ccw: bool,
    #[serde(default)]
    pub allow_debug_view: bool,
    #[serde(default)]
    pub use_ibl: bool,
    #[serde(default = "default_true")]
    pub use_ao: bool,
    #[serde(default = "default_true")]
    pub use_emissive: bool,
    /// When true, material bind groups use renderer-owned samplers built
    /// from the per-slot descriptors below; when false, the sampler comes
    /// from the model texture itself.
    #[serde(default = "default_true")]
    pub use_immutable_samplers: bool,
    #[serde(default)]
    pub use_texture_atlas: bool,
    #[serde(default)]
    pub tone_mapping: ToneMappingMode,
    /// Upper bound on skinning joints; drives joint constant-buffer sizing.
    #[serde(default = "RendererConfig::default_max_joint_count")]
    pub max_joint_count: u32,
    #[serde(default)]
    pub color_map_sampler: SamplerConfig,
    #[serde(default)]
    pub physical_map_sampler: SamplerConfig,
    #[serde(default)]
    pub normal_map_sampler: SamplerConfig,
    #[serde(default)]
    pub occlusion_map_sampler: SamplerConfig,
    #[serde(default)]
    pub emissive_map_sampler: SamplerConfig,
}

fn default_true() -> bool {
    true
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            color_format: None,
            depth_format: None,
            front_ccw: false,
            allow_debug_view: false,
            use_ibl: false,
            use_ao: true,
            use_emissive: true,
            use_immutable_samplers: true,
            use_texture_atlas: false,
            tone_mapping: ToneMappingMode::default(),
            max_joint_count: Self::default_max_joint_count(),
            color_map_sampler: SamplerConfig::default(),
            physical_map_sampler: SamplerConfig::default(),
            normal_map_sampler: SamplerConfig::default(),
            occlusion_map_sampler: SamplerConfig::default(),
            emissive_map_sampler: SamplerConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Loads serializable tunables from a JSON file, falling back to the
    /// defaults on any error. Attachment formats stay `None` and must be
    /// filled in by the caller before constructing the renderer.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RendererConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded renderer config from {:?}", path);
                    config.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default renderer config.",
                        path, err
                    );
                    RendererConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Renderer config file {:?} not found. Using defaults.",
                    path
                );
                RendererConfig::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default renderer config.",
                    path, err
                );
                RendererConfig::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.max_joint_count > Self::MAX_SUPPORTED_JOINTS {
            warn!(
                "Max joint count {} exceeds the supported maximum {}. Clamping.",
                self.max_joint_count,
                Self::MAX_SUPPORTED_JOINTS
            );
            self.max_joint_count = Self::MAX_SUPPORTED_JOINTS;
        }
        self
    }

    pub(crate) fn has_render_targets(&self) -> bool {
        self.color_format.is_some() || self.depth_format.is_some()
    }

    pub const fn default_max_joint_count() -> u32 {
        64
    }

    /// Keeps the joint palette within default uniform-buffer limits
    /// (256 * 64 bytes = 16 KiB).
    pub const MAX_SUPPORTED_JOINTS: u32 = 256;
}

/// Tone-mapping operator baked into the compiled pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMappingMode {
    None,
    Reinhard,
    Uncharted2,
}

impl ToneMappingMode {
    pub(crate) fn shader_id(self) -> i32 {
        match self {
            ToneMappingMode::None => 0,
            ToneMappingMode::Reinhard => 1,
            ToneMappingMode::Uncharted2 => 2,
        }
    }
}

impl Default for ToneMappingMode {
    fn default() -> Self {
        ToneMappingMode::Reinhard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressModeConfig {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

impl AddressModeConfig {
    fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressModeConfig::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressModeConfig::Repeat => wgpu::AddressMode::Repeat,
            AddressModeConfig::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterModeConfig {
    Nearest,
    Linear,
}

impl FilterModeConfig {
    fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterModeConfig::Nearest => wgpu::FilterMode::Nearest,
            FilterModeConfig::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Per-slot sampler description used under the immutable-sampler policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "SamplerConfig::default_address_mode")]
    pub address_mode: AddressModeConfig,
    #[serde(default = "SamplerConfig::default_filter")]
    pub mag_filter: FilterModeConfig,
    #[serde(default = "SamplerConfig::default_filter")]
    pub min_filter: FilterModeConfig,
    #[serde(default = "SamplerConfig::default_filter")]
    pub mipmap_filter: FilterModeConfig,
}

impl SamplerConfig {
    const fn default_address_mode() -> AddressModeConfig {
        AddressModeConfig::ClampToEdge
    }

    const fn default_filter() -> FilterModeConfig {
        FilterModeConfig::Linear
    }

    pub(crate) fn create_sampler(&self, device: &wgpu::Device, label: &str) -> wgpu::Sampler {
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: self.address_mode.to_wgpu(),
            address_mode_v: self.address_mode.to_wgpu(),
            address_mode_w: self.address_mode.to_wgpu(),
            mag_filter: self.mag_filter.to_wgpu(),
            min_filter: self.min_filter.to_wgpu(),
            mipmap_filter: self.mipmap_filter.to_wgpu(),
            ..Default::default()
        })
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            address_mode: Self::default_address_mode(),
            mag_filter: Self::default_filter(),
            min_filter: Self::default_filter(),
            mipmap_filter: Self::default_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_clamps_excessive_joint_count() {
        let config = RendererConfig {
            max_joint_count: 100_000,
            ..RendererConfig::default()
        };
        assert_eq!(
            config.validate().max_joint_count,
            RendererConfig::MAX_SUPPORTED_JOINTS
        );
    }

    #[test]
    fn validate_preserves_valid_joint_count() {
        let config = RendererConfig {
            max_joint_count: 128,
            ..RendererConfig::default()
        };
        assert_eq!(config.validate().max_joint_count, 128);
    }

    #[test]
    fn default_config_has_no_render_targets() {
        let config = RendererConfig::default();
        assert!(!config.has_render_targets());
    }
}
