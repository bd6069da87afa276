use crate::config::RendererConfig;
use crate::renderer::draw_plan::{build_draw_plan, BindingMode, DrawCall};
use crate::renderer::internal::bindings::BindingFactory;
use crate::renderer::internal::defaults::DefaultTextures;
use crate::renderer::internal::frame::FrameArena;
use crate::renderer::internal::precompute::EnvironmentMaps;
use crate::renderer::internal::variants::PipelineVariants;
use crate::renderer::uniforms::{NodeTransforms, PrimitiveShaderData, RendererShaderParams};
use crate::renderer::{
    BindingSource, CacheBindings, MaterialBinding, ModelBindings, RenderParams,
};
use crate::scene::{AlphaMode, BufferId, CacheUseInfo, Material, Model, ResourceCache};

/// glTF PBR renderer over wgpu.
///
/// Construction compiles the four pipeline variants against the configured
/// attachment formats and creates the placeholder texture set, plus the
/// environment map resources and BRDF lookup table when image-based
/// lighting is enabled. All of that state is immutable afterwards; a
/// render call only advances the per-frame constant arenas.
pub struct PbrRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RendererConfig,
    defaults: DefaultTextures,
    env: Option<EnvironmentMaps>,
    factory: Option<BindingFactory>,
    frame: Option<FrameArena>,
    variants: Option<PipelineVariants>,
}

impl PbrRenderer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: RendererConfig) -> Self {
        let config = config.validate();
        let defaults = DefaultTextures::new(device, queue);
        let env = config.use_ibl.then(|| EnvironmentMaps::new(device, queue));

        let (frame, factory, variants) = if config.has_render_targets() {
            let frame = FrameArena::new(device, queue, config.max_joint_count);
            let factory = BindingFactory::new(device, &config);
            let variants =
                PipelineVariants::new(device, &config, &frame.bind_layout, &factory.layout);
            (Some(frame), Some(factory), Some(variants))
        } else {
            log::info!(
                "No attachment formats given; creating the PBR renderer in headless mode \
                 without pipelines or constant buffers"
            );
            (None, None, None)
        };

        Self {
            device: device.clone(),
            queue: queue.clone(),
            config,
            defaults,
            env,
            factory,
            frame,
            variants,
        }
    }

    /// The compiled pipeline for an (alpha mode, double-sided) key. Mask
    /// returns the same pipeline as Opaque. Panics in headless mode; that
    /// is a programming error in the integration layer, not a runtime
    /// condition.
    pub fn pipeline_variant(
        &self,
        alpha_mode: AlphaMode,
        double_sided: bool,
    ) -> &wgpu::RenderPipeline {
        self.variants
            .as_ref()
            .expect("pipeline variants are not created in headless mode")
            .variant(alpha_mode, double_sided)
    }

    /// Prepares the renderer for a new frame by rewinding the per-frame
    /// constant arenas. Must be called once per frame before the first
    /// render call.
    pub fn begin_frame(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.begin_frame();
        }
    }

    /// Per-frame preparation for the resource-cache render path: rewinds
    /// the arenas and rebuilds the cache binding if and only if the
    /// cache's texture-atlas version differs from the stamp in `bindings`
    /// (or no binding exists yet). An unchanged version reuses the
    /// identical binding object.
    pub fn begin_cache_frame(
        &mut self,
        cache: &dyn ResourceCache,
        use_info: &CacheUseInfo,
        bindings: &mut CacheBindings,
        camera_attribs: &wgpu::Buffer,
        light_attribs: &wgpu::Buffer,
    ) {
        self.begin_frame();

        let factory = self
            .factory
            .as_ref()
            .expect("resource bindings are not created in headless mode");

        let version = cache.version();
        if !bindings.is_stale(version) {
            return;
        }

        log::debug!(
            "Rebuilding resource cache binding: version {} -> {}",
            bindings.version,
            version
        );
        bindings.binding = factory
            .create_cache_binding(
                &self.device,
                &self.defaults,
                self.env.as_ref(),
                cache,
                use_info,
                camera_attribs,
                light_attribs,
            )
            .map(|bind_group| MaterialBinding { bind_group });
        bindings.version = version;
        bindings.basic_attribs = cache.buffer(BufferId::BasicAttribs).cloned();
        bindings.skin_attribs = cache.buffer(BufferId::SkinAttribs).cloned();
        bindings.index = cache.buffer(BufferId::Index).cloned();
    }

    /// Builds the shader-resource binding for one material. Returns `None`
    /// (with the failure logged) when GPU object creation fails.
    pub fn create_material_binding(
        &self,
        model: &Model,
        material: &Material,
        camera_attribs: &wgpu::Buffer,
        light_attribs: &wgpu::Buffer,
    ) -> Option<MaterialBinding> {
        let factory = self
            .factory
            .as_ref()
            .expect("resource bindings are not created in headless mode");
        factory
            .create_material_binding(
                &self.device,
                &self.defaults,
                self.env.as_ref(),
                model,
                material,
                camera_attribs,
                light_attribs,
            )
            .map(|bind_group| MaterialBinding { bind_group })
    }

    /// Builds one binding per material of the model, order-preserving.
    /// Returns `None` when any creation failed; the caller must not render
    /// with a partial set.
    pub fn create_resource_bindings(
        &self,
        model: &Model,
        camera_attribs: &wgpu::Buffer,
        light_attribs: &wgpu::Buffer,
    ) -> Option<ModelBindings> {
        let materials = model
            .materials
            .iter()
            .map(|material| {
                self.create_material_binding(model, material, camera_attribs, light_attribs)
            })
            .collect::<Option<Vec<_>>>()?;
        Some(ModelBindings { materials })
    }

    /// Convolves the given environment cube map into the irradiance and
    /// prefiltered specular maps. A no-op (with a diagnostic) when
    /// image-based lighting is disabled, so callers may invoke it
    /// unconditionally.
    pub fn precompute_cubemaps(&self, env_map: &wgpu::TextureView) {
        match &self.env {
            Some(env) => env.precompute_cubemaps(&self.device, &self.queue, env_map),
            None => log::warn!(
                "precompute_cubemaps called while image-based lighting is disabled; ignoring"
            ),
        }
    }

    /// Records the model's draw calls into `pass`, walking alpha-mode
    /// passes in fixed order (Opaque, Mask, Blend) and eliding redundant
    /// pipeline and binding state changes.
    pub fn render(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        model: &Model,
        params: &RenderParams,
        bindings: BindingSource<'_>,
    ) {
        let variants = self
            .variants
            .as_ref()
            .expect("render() is unavailable in headless mode");

        let mode = match &bindings {
            BindingSource::Model(model_bindings) => BindingMode::PerMaterial {
                count: model_bindings.materials.len(),
            },
            BindingSource::Cache(cache_bindings) => {
                assert!(
                    cache_bindings.binding.is_some(),
                    "Resource cache binding is null; call begin_cache_frame first \
                     and check has_binding()"
                );
                BindingMode::Shared
            }
        };

        let plan = build_draw_plan(
            &model.materials,
            &model.meshes,
            &model.linear_nodes,
            model.base_vertex,
            model.first_index,
            params,
            mode,
            self.config.max_joint_count,
        );
        if plan.draws.is_empty() {
            return;
        }

        let frame = self
            .frame
            .as_mut()
            .expect("frame arenas exist whenever pipelines do");
        frame.ensure_capacity(
            &self.device,
            &self.queue,
            plan.draws.len() as u32,
            plan.joint_uploads,
        );

        match &bindings {
            BindingSource::Model(_) => {
                pass.set_vertex_buffer(0, model.buffers.basic_attribs.slice(..));
                pass.set_vertex_buffer(1, model.buffers.skin_attribs.slice(..));
                if let Some(index) = &model.buffers.index {
                    pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                }
            }
            BindingSource::Cache(cache_bindings) => {
                let basic = cache_bindings
                    .basic_attribs
                    .as_ref()
                    .expect("resource cache provided no basic vertex buffer");
                let skin = cache_bindings
                    .skin_attribs
                    .as_ref()
                    .expect("resource cache provided no skin vertex buffer");
                pass.set_vertex_buffer(0, basic.slice(..));
                pass.set_vertex_buffer(1, skin.slice(..));
                if let Some(index) = &cache_bindings.index {
                    pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                }
            }
        }

        let render_params = RendererShaderParams {
            debug_view: if self.config.allow_debug_view {
                params.debug_view as i32
            } else {
                0
            },
            occlusion_strength: params.occlusion_strength,
            emission_scale: params.emission_scale,
            ibl_scale: params.ibl_scale,
            average_log_lum: params.average_log_lum,
            middle_gray: params.middle_gray,
            white_point: params.white_point,
            prefiltered_mip_count: self
                .env
                .as_ref()
                .map(|env| env.prefiltered_mip_count() as f32)
                .unwrap_or(1.0),
        };

        let mut joints_offset = 0u32;
        for draw in &plan.draws {
            if let Some(key) = draw.set_pipeline {
                pass.set_pipeline(variants.variant(key.alpha_mode, key.double_sided));
            }

            if let Some(material_index) = draw.commit_binding {
                let binding = match &bindings {
                    BindingSource::Model(model_bindings) => {
                        &model_bindings.materials[material_index as usize]
                    }
                    BindingSource::Cache(cache_bindings) => {
                        cache_bindings.binding.as_ref().unwrap()
                    }
                };
                pass.set_bind_group(1, &binding.bind_group, &[]);
            }

            if let Some(mesh_index) = draw.upload_joints {
                let joints = &model.meshes[mesh_index].transforms.joint_matrices;
                joints_offset =
                    frame.push_joints(&self.queue, &joints[..draw.joint_count as usize]);
            }

            let transforms_offset = frame.push_transforms(
                &self.queue,
                &NodeTransforms::new(draw.node_matrix, draw.joint_count),
            );
            let attribs_offset = frame.push_attribs(
                &self.queue,
                &PrimitiveShaderData {
                    render: render_params,
                    material: model.materials[draw.material_index as usize].attribs,
                },
            );
            let draw_joints_offset = if draw.joint_count > 0 { joints_offset } else { 0 };
            pass.set_bind_group(
                0,
                frame.bind_group(),
                &[transforms_offset, draw_joints_offset, attribs_offset],
            );

            match draw.call {
                DrawCall::Indexed {
                    index_count,
                    first_index,
                    base_vertex,
                } => {
                    pass.draw_indexed(first_index..first_index + index_count, base_vertex, 0..1);
                }
                DrawCall::NonIndexed {
                    vertex_count,
                    start_vertex,
                } => {
                    pass.draw(start_vertex..start_vertex + vertex_count, 0..1);
                }
            }
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Irradiance cube view, for reuse by other subsystems (skybox etc.).
    /// `None` when image-based lighting is disabled.
    pub fn irradiance_view(&self) -> Option<&wgpu::TextureView> {
        self.env.as_ref().map(|env| env.irradiance_view())
    }

    pub fn prefiltered_env_view(&self) -> Option<&wgpu::TextureView> {
        self.env.as_ref().map(|env| env.prefiltered_view())
    }

    pub fn brdf_lut_view(&self) -> Option<&wgpu::TextureView> {
        self.env.as_ref().map(|env| env.brdf_lut_view())
    }

    pub fn white_texture_view(&self) -> &wgpu::TextureView {
        &self.defaults.white.view
    }

    pub fn black_texture_view(&self) -> &wgpu::TextureView {
        &self.defaults.black.view
    }

    pub fn default_normal_view(&self) -> &wgpu::TextureView {
        &self.defaults.normal.view
    }

    pub fn default_physical_view(&self) -> &wgpu::TextureView {
        &self.defaults.physical.view
    }
}
