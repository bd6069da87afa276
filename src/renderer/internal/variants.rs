//! The fixed table of compiled pipeline variants.
//!
//! Four pipelines cover every material: (opaque-or-masked, blend) ×
//! (back-face culled, double-sided). Alpha masking is a per-pixel discard
//! in the shader, so Mask intentionally aliases the Opaque pipeline.
//! Everything else (feature toggles, joint capacity, tone mapping) is
//! baked into the shader source at construction instead of being branched
//! on at draw time.

use crate::config::RendererConfig;
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::scene::{AlphaMode, BasicVertex, SkinVertex};

/// Pipeline selector: the only two pieces of material state that require
/// distinct compiled pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

/// Dense index into the variant table. Mask maps onto Opaque.
pub(crate) fn variant_index(alpha_mode: AlphaMode, double_sided: bool) -> usize {
    let blend = matches!(alpha_mode, AlphaMode::Blend) as usize;
    blend * 2 + double_sided as usize
}

pub(crate) struct PipelineVariants {
    pipelines: [wgpu::RenderPipeline; 4],
}

impl PipelineVariants {
    pub(crate) fn new(
        device: &wgpu::Device,
        config: &RendererConfig,
        frame_layout: &wgpu::BindGroupLayout,
        material_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let source = compose_pbr_shader(config);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PbrShader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PbrPipelineLayout"),
            bind_group_layouts: &[frame_layout, material_layout],
            push_constant_ranges: &[],
        });

        let front_face = if config.front_ccw {
            wgpu::FrontFace::Ccw
        } else {
            wgpu::FrontFace::Cw
        };

        // Standard alpha-over blending for the Blend variants; the alpha
        // channel accumulates coverage with (1 - src_alpha, 0).
        let alpha_blending = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipelines = std::array::from_fn(|idx| {
            let blend = idx / 2 == 1;
            let double_sided = idx % 2 == 1;

            let mut builder = PipelineBuilder::new(device, &layout, &shader)
                .with_label(if blend {
                    "PbrPipelineBlend"
                } else {
                    "PbrPipelineOpaque"
                })
                .with_vertex_buffer(BasicVertex::layout())
                .with_vertex_buffer(SkinVertex::layout())
                .with_front_face(front_face)
                .with_cull_mode(if double_sided {
                    None
                } else {
                    Some(wgpu::Face::Back)
                });

            if let Some(format) = config.color_format {
                let blend_state = if blend {
                    Some(alpha_blending)
                } else {
                    Some(wgpu::BlendState::REPLACE)
                };
                builder = builder.with_color_target(format, blend_state);
            }
            if let Some(format) = config.depth_format {
                builder =
                    builder.with_depth_stencil(format, true, wgpu::CompareFunction::LessEqual);
            }

            builder.build()
        });

        Self { pipelines }
    }

    pub(crate) fn variant(&self, alpha_mode: AlphaMode, double_sided: bool) -> &wgpu::RenderPipeline {
        &self.pipelines[variant_index(alpha_mode, double_sided)]
    }
}

/// Builds the final WGSL from the config: a generated constants header,
/// shared BRDF helpers, the static binding declarations plus the optional
/// ones, and the shader body with its feature-dependent sections patched in.
fn compose_pbr_shader(config: &RendererConfig) -> String {
    let mut source = String::new();

    source.push_str(&format!(
        "const MAX_JOINT_COUNT: u32 = {}u;\n\
         const ALLOW_DEBUG_VIEW: bool = {};\n\
         const TONE_MAPPING_MODE: i32 = {};\n\
         const USE_TEXTURE_ATLAS: bool = {};\n\
         const ALPHA_MODE_OPAQUE: f32 = 0.0;\n\
         const ALPHA_MODE_MASK: f32 = 1.0;\n\
         const ALPHA_MODE_BLEND: f32 = 2.0;\n\
         const PBR_WORKFLOW_METALLIC_ROUGHNESS: f32 = 0.0;\n\
         const PBR_WORKFLOW_SPECULAR_GLOSSINESS: f32 = 1.0;\n\n",
        config.max_joint_count.max(1),
        config.allow_debug_view,
        config.tone_mapping.shader_id(),
        config.use_texture_atlas,
    ));

    source.push_str(include_str!("../../shader/brdf_common.wgsl"));
    source.push('\n');

    let mut extra_bindings = String::new();
    if config.use_ao {
        extra_bindings.push_str(
            "@group(1) @binding(8) var t_occlusion: texture_2d_array<f32>;\n\
             @group(1) @binding(9) var s_occlusion: sampler;\n",
        );
    }
    if config.use_emissive {
        extra_bindings.push_str(
            "@group(1) @binding(10) var t_emissive: texture_2d_array<f32>;\n\
             @group(1) @binding(11) var s_emissive: sampler;\n",
        );
    }
    if config.use_ibl {
        extra_bindings.push_str(
            "@group(1) @binding(12) var t_irradiance: texture_cube<f32>;\n\
             @group(1) @binding(13) var t_prefiltered_env: texture_cube<f32>;\n\
             @group(1) @binding(14) var s_env: sampler;\n\
             @group(1) @binding(15) var t_brdf_lut: texture_2d<f32>;\n\
             @group(1) @binding(16) var s_brdf_lut: sampler;\n",
        );
    }

    let occlusion_sample = if config.use_ao {
        "occlusion = textureSample(t_occlusion, s_occlusion, occlusion_uv, \
         i32(attribs.material.occlusion_slice)).r;"
    } else {
        ""
    };
    let emissive_sample = if config.use_emissive {
        "emissive = attribs.material.emissive_factor.rgb * \
         textureSample(t_emissive, s_emissive, emissive_uv, \
         i32(attribs.material.emissive_slice)).rgb;"
    } else {
        ""
    };
    let ibl_apply = if config.use_ibl {
        "let irradiance = textureSample(t_irradiance, s_env, n).rgb;\n    \
         let prefiltered = textureSampleLevel(t_prefiltered_env, s_env, \
         reflect(-v, n), roughness * (attribs.render.prefiltered_mip_count - 1.0)).rgb;\n    \
         let env_brdf = textureSample(t_brdf_lut, s_brdf_lut, \
         vec2f(n_dot_v, roughness)).rg;\n    \
         ibl_diffuse = irradiance * diffuse_color * attribs.render.ibl_scale;\n    \
         ibl_specular = prefiltered * (specular_color * env_brdf.x + vec3f(env_brdf.y)) * \
         attribs.render.ibl_scale;"
    } else {
        ""
    };

    let body = include_str!("../../shader/pbr.wgsl")
        .replace("//@EXTRA_BINDINGS", &extra_bindings)
        .replace("//@SAMPLE_OCCLUSION", occlusion_sample)
        .replace("//@SAMPLE_EMISSIVE", emissive_sample)
        .replace("//@APPLY_IBL", ibl_apply);
    source.push_str(&body);

    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_index_is_dense_over_the_key_space() {
        let mut seen = [false; 4];
        for alpha_mode in [AlphaMode::Opaque, AlphaMode::Blend] {
            for double_sided in [false, true] {
                let idx = variant_index(alpha_mode, double_sided);
                assert!(idx < 4);
                assert!(!seen[idx]);
                seen[idx] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn mask_aliases_the_opaque_variant() {
        for double_sided in [false, true] {
            assert_eq!(
                variant_index(AlphaMode::Mask, double_sided),
                variant_index(AlphaMode::Opaque, double_sided)
            );
        }
    }

    #[test]
    fn culling_mode_distinguishes_variants() {
        for alpha_mode in [AlphaMode::Opaque, AlphaMode::Mask, AlphaMode::Blend] {
            assert_ne!(
                variant_index(alpha_mode, false),
                variant_index(alpha_mode, true)
            );
        }
    }

    #[test]
    fn composed_shader_respects_feature_toggles() {
        let mut config = crate::config::RendererConfig::default();
        config.use_ao = false;
        config.use_emissive = true;
        config.use_ibl = false;
        let source = compose_pbr_shader(&config);
        assert!(!source.contains("t_occlusion"));
        assert!(source.contains("t_emissive"));
        assert!(!source.contains("t_irradiance"));
        assert!(source.contains("const MAX_JOINT_COUNT: u32 = 64u;"));
    }
}
