//! Material shader-resource-binding factory.
//!
//! One bind group per material: the shared camera/light constant buffers,
//! the five material texture slots (placeholders where the material or the
//! model has no texture) and, when image-based lighting is enabled, the
//! precomputed environment resources. All pipeline variants share the same
//! layout, so a binding built here works with any of them.

use crate::config::RendererConfig;
use crate::renderer::internal::defaults::DefaultTextures;
use crate::renderer::internal::precompute::EnvironmentMaps;
use crate::scene::{CacheUseInfo, Material, Model, ResourceCache};

// Fixed binding indices in group 1; disabled features leave gaps.
const BIND_CAMERA: u32 = 0;
const BIND_LIGHT: u32 = 1;
const BIND_BASE_COLOR_TEX: u32 = 2;
const BIND_BASE_COLOR_SAMP: u32 = 3;
const BIND_PHYSICAL_TEX: u32 = 4;
const BIND_PHYSICAL_SAMP: u32 = 5;
const BIND_NORMAL_TEX: u32 = 6;
const BIND_NORMAL_SAMP: u32 = 7;
const BIND_OCCLUSION_TEX: u32 = 8;
const BIND_OCCLUSION_SAMP: u32 = 9;
const BIND_EMISSIVE_TEX: u32 = 10;
const BIND_EMISSIVE_SAMP: u32 = 11;
const BIND_IRRADIANCE: u32 = 12;
const BIND_PREFILTERED: u32 = 13;
const BIND_ENV_SAMP: u32 = 14;
const BIND_BRDF_LUT: u32 = 15;
const BIND_BRDF_LUT_SAMP: u32 = 16;

pub(crate) struct BindingFactory {
    pub(crate) layout: wgpu::BindGroupLayout,
    use_ao: bool,
    use_emissive: bool,
    use_immutable_samplers: bool,
    samplers: SlotSamplers,
}

/// Renderer-owned samplers, one per logical texture slot, built from the
/// config's sampler descriptors (the immutable-sampler policy).
struct SlotSamplers {
    base_color: wgpu::Sampler,
    physical: wgpu::Sampler,
    normal: wgpu::Sampler,
    occlusion: wgpu::Sampler,
    emissive: wgpu::Sampler,
}

/// The five logical texture slots, resolved to concrete views/samplers.
struct ResolvedSlot {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl BindingFactory {
    pub(crate) fn new(device: &wgpu::Device, config: &RendererConfig) -> Self {
        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: BIND_CAMERA,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: BIND_LIGHT,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ];

        let texture_slot = |tex_binding: u32, samp_binding: u32| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: tex_binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: samp_binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        };

        entries.extend(texture_slot(BIND_BASE_COLOR_TEX, BIND_BASE_COLOR_SAMP));
        entries.extend(texture_slot(BIND_PHYSICAL_TEX, BIND_PHYSICAL_SAMP));
        entries.extend(texture_slot(BIND_NORMAL_TEX, BIND_NORMAL_SAMP));
        if config.use_ao {
            entries.extend(texture_slot(BIND_OCCLUSION_TEX, BIND_OCCLUSION_SAMP));
        }
        if config.use_emissive {
            entries.extend(texture_slot(BIND_EMISSIVE_TEX, BIND_EMISSIVE_SAMP));
        }
        if config.use_ibl {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: BIND_IRRADIANCE,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::Cube,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: BIND_PREFILTERED,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::Cube,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: BIND_ENV_SAMP,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: BIND_BRDF_LUT,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: BIND_BRDF_LUT_SAMP,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PbrMaterialBindLayout"),
            entries: &entries,
        });

        let samplers = SlotSamplers {
            base_color: config
                .color_map_sampler
                .create_sampler(device, "PbrColorMapSampler"),
            physical: config
                .physical_map_sampler
                .create_sampler(device, "PbrPhysicalMapSampler"),
            normal: config
                .normal_map_sampler
                .create_sampler(device, "PbrNormalMapSampler"),
            occlusion: config
                .occlusion_map_sampler
                .create_sampler(device, "PbrOcclusionMapSampler"),
            emissive: config
                .emissive_map_sampler
                .create_sampler(device, "PbrEmissiveMapSampler"),
        };

        Self {
            layout,
            use_ao: config.use_ao,
            use_emissive: config.use_emissive,
            use_immutable_samplers: config.use_immutable_samplers,
            samplers,
        }
    }

    /// Builds the bind group for one material of a model. Returns `None`
    /// (with the validation error logged) when creation fails.
    pub(crate) fn create_material_binding(
        &self,
        device: &wgpu::Device,
        defaults: &DefaultTextures,
        env: Option<&EnvironmentMaps>,
        model: &Model,
        material: &Material,
        camera_attribs: &wgpu::Buffer,
        light_attribs: &wgpu::Buffer,
    ) -> Option<wgpu::BindGroup> {
        let slots = [
            self.resolve_model_slot(
                model,
                material.textures.base_color,
                &defaults.white.view,
                &self.samplers.base_color,
            ),
            self.resolve_model_slot(
                model,
                material.textures.physical_descriptor,
                &defaults.physical.view,
                &self.samplers.physical,
            ),
            self.resolve_model_slot(
                model,
                material.textures.normal,
                &defaults.normal.view,
                &self.samplers.normal,
            ),
            self.resolve_model_slot(
                model,
                material.textures.occlusion,
                &defaults.white.view,
                &self.samplers.occlusion,
            ),
            self.resolve_model_slot(
                model,
                material.textures.emissive,
                &defaults.black.view,
                &self.samplers.emissive,
            ),
        ];

        self.create_binding(
            device,
            "PbrMaterialBindGroup",
            camera_attribs,
            light_attribs,
            &slots,
            env,
        )
    }

    /// Builds the shared bind group for the resource-cache render path,
    /// resolving each slot through the cache's per-format atlas lookup.
    pub(crate) fn create_cache_binding(
        &self,
        device: &wgpu::Device,
        defaults: &DefaultTextures,
        env: Option<&EnvironmentMaps>,
        cache: &dyn ResourceCache,
        use_info: &CacheUseInfo,
        camera_attribs: &wgpu::Buffer,
        light_attribs: &wgpu::Buffer,
    ) -> Option<wgpu::BindGroup> {
        let slots = [
            self.resolve_cache_slot(
                cache,
                use_info.base_color_format,
                &defaults.white.view,
                &self.samplers.base_color,
            ),
            self.resolve_cache_slot(
                cache,
                use_info.physical_descriptor_format,
                &defaults.physical.view,
                &self.samplers.physical,
            ),
            self.resolve_cache_slot(
                cache,
                use_info.normal_format,
                &defaults.normal.view,
                &self.samplers.normal,
            ),
            self.resolve_cache_slot(
                cache,
                use_info.occlusion_format,
                &defaults.white.view,
                &self.samplers.occlusion,
            ),
            self.resolve_cache_slot(
                cache,
                use_info.emissive_format,
                &defaults.black.view,
                &self.samplers.emissive,
            ),
        ];

        self.create_binding(
            device,
            "PbrResourceCacheBindGroup",
            camera_attribs,
            light_attribs,
            &slots,
            env,
        )
    }

    fn resolve_model_slot(
        &self,
        model: &Model,
        texture_index: Option<u32>,
        fallback_view: &wgpu::TextureView,
        slot_sampler: &wgpu::Sampler,
    ) -> ResolvedSlot {
        let Some(index) = texture_index else {
            return ResolvedSlot {
                view: fallback_view.clone(),
                sampler: slot_sampler.clone(),
            };
        };

        let Some(entry) = model.textures.get(index as usize) else {
            log::warn!(
                "Material references texture {} but the model only has {}. Using placeholder.",
                index,
                model.textures.len()
            );
            return ResolvedSlot {
                view: fallback_view.clone(),
                sampler: slot_sampler.clone(),
            };
        };

        // Plain 2D textures are coerced to single-layer arrays so the
        // shader can address every slot uniformly.
        let view = entry.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("PbrMaterialTextureView"),
            format: None,
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
            usage: None,
        });

        let sampler = if self.use_immutable_samplers {
            slot_sampler.clone()
        } else {
            entry.sampler.clone().unwrap_or_else(|| slot_sampler.clone())
        };

        ResolvedSlot { view, sampler }
    }

    fn resolve_cache_slot(
        &self,
        cache: &dyn ResourceCache,
        format: wgpu::TextureFormat,
        fallback_view: &wgpu::TextureView,
        slot_sampler: &wgpu::Sampler,
    ) -> ResolvedSlot {
        let Some(texture) = cache.texture(format) else {
            log::warn!(
                "Resource cache has no texture atlas for {:?}. Using placeholder.",
                format
            );
            return ResolvedSlot {
                view: fallback_view.clone(),
                sampler: slot_sampler.clone(),
            };
        };

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("PbrCacheTextureView"),
            format: None,
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
            usage: None,
        });

        ResolvedSlot {
            view,
            sampler: slot_sampler.clone(),
        }
    }

    fn create_binding(
        &self,
        device: &wgpu::Device,
        label: &str,
        camera_attribs: &wgpu::Buffer,
        light_attribs: &wgpu::Buffer,
        slots: &[ResolvedSlot; 5],
        env: Option<&EnvironmentMaps>,
    ) -> Option<wgpu::BindGroup> {
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: BIND_CAMERA,
                resource: camera_attribs.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: BIND_LIGHT,
                resource: light_attribs.as_entire_binding(),
            },
        ];

        let slot_bindings = [
            (BIND_BASE_COLOR_TEX, BIND_BASE_COLOR_SAMP, true),
            (BIND_PHYSICAL_TEX, BIND_PHYSICAL_SAMP, true),
            (BIND_NORMAL_TEX, BIND_NORMAL_SAMP, true),
            (BIND_OCCLUSION_TEX, BIND_OCCLUSION_SAMP, self.use_ao),
            (BIND_EMISSIVE_TEX, BIND_EMISSIVE_SAMP, self.use_emissive),
        ];
        for (slot, (tex_binding, samp_binding, enabled)) in slots.iter().zip(slot_bindings) {
            if !enabled {
                continue;
            }
            entries.push(wgpu::BindGroupEntry {
                binding: tex_binding,
                resource: wgpu::BindingResource::TextureView(&slot.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: samp_binding,
                resource: wgpu::BindingResource::Sampler(&slot.sampler),
            });
        }

        if let Some(env) = env {
            entries.push(wgpu::BindGroupEntry {
                binding: BIND_IRRADIANCE,
                resource: wgpu::BindingResource::TextureView(env.irradiance_view()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: BIND_PREFILTERED,
                resource: wgpu::BindingResource::TextureView(env.prefiltered_view()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: BIND_ENV_SAMP,
                resource: wgpu::BindingResource::Sampler(env.env_sampler()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: BIND_BRDF_LUT,
                resource: wgpu::BindingResource::TextureView(env.brdf_lut_view()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: BIND_BRDF_LUT_SAMP,
                resource: wgpu::BindingResource::Sampler(env.brdf_lut_sampler()),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layout,
            entries: &entries,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Failed to create {}: {}", label, err);
            return None;
        }

        Some(bind_group)
    }
}
