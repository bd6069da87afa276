//! One-shot GPU convolution of an environment map into the textures the
//! PBR shader samples for image-based lighting: an irradiance cube, a
//! roughness-prefiltered specular cube and the split-sum BRDF lookup table.

use std::f32::consts::{FRAC_PI_2, PI};
use std::mem;
use std::num::NonZeroU64;

use glam::Mat4;

use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::uniforms::EnvMapRenderAttribs;

const IRRADIANCE_CUBE_DIM: u32 = 64;
const PREFILTERED_ENV_MAP_DIM: u32 = 256;
const BRDF_LUT_DIM: u32 = 512;

// Float16 targets keep the maps linearly filterable without requiring the
// float32-filterable device feature.
const CUBE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const BRDF_LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

const PREFILTER_NUM_SAMPLES: u32 = 256;

/// Dynamic-offset stride for the per-iteration attribs slots.
const ATTRIBS_STRIDE: u32 = 256;

pub(crate) struct EnvironmentMaps {
    irradiance_tex: wgpu::Texture,
    irradiance_view: wgpu::TextureView,
    irradiance_mip_count: u32,
    prefiltered_tex: wgpu::Texture,
    prefiltered_view: wgpu::TextureView,
    prefiltered_mip_count: u32,
    _brdf_lut_tex: wgpu::Texture,
    brdf_lut_view: wgpu::TextureView,
    brdf_lut_sampler: wgpu::Sampler,
    env_sampler: wgpu::Sampler,
    irradiance_pipeline: wgpu::RenderPipeline,
    prefilter_pipeline: wgpu::RenderPipeline,
    convolve_layout: wgpu::BindGroupLayout,
    attribs_buffer: wgpu::Buffer,
}

impl EnvironmentMaps {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let irradiance_mip_count = mip_count(IRRADIANCE_CUBE_DIM);
        let prefiltered_mip_count = mip_count(PREFILTERED_ENV_MAP_DIM);

        let irradiance_tex = create_cube_texture(
            device,
            "PbrIrradianceCube",
            IRRADIANCE_CUBE_DIM,
            irradiance_mip_count,
        );
        let prefiltered_tex = create_cube_texture(
            device,
            "PbrPrefilteredEnvMap",
            PREFILTERED_ENV_MAP_DIM,
            prefiltered_mip_count,
        );

        let irradiance_view = cube_view(&irradiance_tex, "PbrIrradianceCubeView");
        let prefiltered_view = cube_view(&prefiltered_tex, "PbrPrefilteredEnvMapView");

        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PbrEnvMapSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let brdf_lut_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PbrBrdfLutSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let convolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PbrEnvConvolveBindLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(
                            mem::size_of::<EnvMapRenderAttribs>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PbrEnvConvolvePipelineLayout"),
            bind_group_layouts: &[&convolve_layout],
            push_constant_ranges: &[],
        });

        let irradiance_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PbrIrradianceConvolveShader"),
            source: wgpu::ShaderSource::Wgsl(convolve_shader_source(include_str!(
                "../../shader/irradiance.wgsl"
            ))),
        });
        let prefilter_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PbrPrefilterEnvShader"),
            source: wgpu::ShaderSource::Wgsl(convolve_shader_source(include_str!(
                "../../shader/prefilter_env.wgsl"
            ))),
        });

        let irradiance_pipeline =
            PipelineBuilder::new(device, &pipeline_layout, &irradiance_shader)
                .with_label("PbrIrradianceConvolvePipeline")
                .with_color_target(CUBE_FORMAT, None)
                .with_topology(wgpu::PrimitiveTopology::TriangleStrip)
                .with_cull_mode(None)
                .build();
        let prefilter_pipeline = PipelineBuilder::new(device, &pipeline_layout, &prefilter_shader)
            .with_label("PbrPrefilterEnvPipeline")
            .with_color_target(CUBE_FORMAT, None)
            .with_topology(wgpu::PrimitiveTopology::TriangleStrip)
            .with_cull_mode(None)
            .build();

        let iteration_count = (irradiance_mip_count + prefiltered_mip_count) * 6;
        let attribs_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("PbrEnvConvolveAttribs"),
            size: ATTRIBS_STRIDE as u64 * iteration_count as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (brdf_lut_tex, brdf_lut_view) = precompute_brdf_lut(device, queue);

        Self {
            irradiance_tex,
            irradiance_view,
            irradiance_mip_count,
            prefiltered_tex,
            prefiltered_view,
            prefiltered_mip_count,
            _brdf_lut_tex: brdf_lut_tex,
            brdf_lut_view,
            brdf_lut_sampler,
            env_sampler,
            irradiance_pipeline,
            prefilter_pipeline,
            convolve_layout,
            attribs_buffer,
        }
    }

    /// Convolves `env_map` (a cube-map view) into the irradiance and
    /// prefiltered specular cubes: one full-screen pass per (mip, face).
    /// The single submit at the end guarantees the results are safe to
    /// sample from any subsequently submitted work.
    pub(crate) fn precompute_cubemaps(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        env_map: &wgpu::TextureView,
    ) {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PbrEnvConvolveBindGroup"),
            layout: &self.convolve_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(env_map),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.env_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.attribs_buffer,
                        offset: 0,
                        size: NonZeroU64::new(mem::size_of::<EnvMapRenderAttribs>() as u64),
                    }),
                },
            ],
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!(
                "Failed to bind environment map for precompute (not a cube view?): {}",
                err
            );
            return;
        }

        // All iteration parameters are written up front at distinct
        // offsets; each pass addresses its slot with a dynamic offset.
        let mut offset = 0u32;
        let mut iterations = Vec::new();
        for mip in 0..self.irradiance_mip_count {
            for face in 0..6 {
                let attribs = EnvMapRenderAttribs {
                    rotation: face_rotation(face).to_cols_array_2d(),
                    roughness: 0.0,
                    env_map_dim: IRRADIANCE_CUBE_DIM as f32,
                    num_samples: 0,
                    _pad: 0.0,
                };
                queue.write_buffer(&self.attribs_buffer, offset as u64, bytemuck::bytes_of(&attribs));
                iterations.push((false, mip, face, offset));
                offset += ATTRIBS_STRIDE;
            }
        }
        for mip in 0..self.prefiltered_mip_count {
            for face in 0..6 {
                let attribs = EnvMapRenderAttribs {
                    rotation: face_rotation(face).to_cols_array_2d(),
                    roughness: mip as f32 / self.prefiltered_mip_count as f32,
                    env_map_dim: PREFILTERED_ENV_MAP_DIM as f32,
                    num_samples: PREFILTER_NUM_SAMPLES,
                    _pad: 0.0,
                };
                queue.write_buffer(&self.attribs_buffer, offset as u64, bytemuck::bytes_of(&attribs));
                iterations.push((true, mip, face, offset));
                offset += ATTRIBS_STRIDE;
            }
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("PbrEnvPrecomputeEncoder"),
        });

        for (prefilter, mip, face, offset) in iterations {
            let (texture, pipeline, label) = if prefilter {
                (&self.prefiltered_tex, &self.prefilter_pipeline, "PbrPrefilterFacePass")
            } else {
                (&self.irradiance_tex, &self.irradiance_pipeline, "PbrIrradianceFacePass")
            };

            let target = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(label),
                format: Some(CUBE_FORMAT),
                dimension: Some(wgpu::TextureViewDimension::D2),
                aspect: wgpu::TextureAspect::All,
                base_mip_level: mip,
                mip_level_count: Some(1),
                base_array_layer: face,
                array_layer_count: Some(1),
                usage: Some(wgpu::TextureUsages::RENDER_ATTACHMENT),
            });

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[offset]);
            rpass.draw(0..4, 0..1);
        }

        queue.submit(Some(encoder.finish()));
        log::info!(
            "Precomputed environment cube maps ({} irradiance mips, {} specular mips)",
            self.irradiance_mip_count,
            self.prefiltered_mip_count
        );
    }

    pub(crate) fn irradiance_view(&self) -> &wgpu::TextureView {
        &self.irradiance_view
    }

    pub(crate) fn prefiltered_view(&self) -> &wgpu::TextureView {
        &self.prefiltered_view
    }

    pub(crate) fn brdf_lut_view(&self) -> &wgpu::TextureView {
        &self.brdf_lut_view
    }

    pub(crate) fn env_sampler(&self) -> &wgpu::Sampler {
        &self.env_sampler
    }

    pub(crate) fn brdf_lut_sampler(&self) -> &wgpu::Sampler {
        &self.brdf_lut_sampler
    }

    pub(crate) fn prefiltered_mip_count(&self) -> u32 {
        self.prefiltered_mip_count
    }
}

/// Orientation of each cube face render pass. The fragment shader turns
/// NDC xy into a sampling direction via `rotation * vec3(ndc, 1)`; these
/// matrices must match the cube-face addressing convention exactly or the
/// environment comes out mirrored or rotated.
pub(crate) fn face_rotation(face: u32) -> Mat4 {
    match face {
        0 => Mat4::from_rotation_y(FRAC_PI_2),  // +X
        1 => Mat4::from_rotation_y(-FRAC_PI_2), // -X
        2 => Mat4::from_rotation_x(-FRAC_PI_2), // +Y
        3 => Mat4::from_rotation_x(FRAC_PI_2),  // -Y
        4 => Mat4::IDENTITY,                    // +Z
        5 => Mat4::from_rotation_y(PI),         // -Z
        _ => unreachable!("cube maps have six faces"),
    }
}

fn mip_count(dim: u32) -> u32 {
    dim.ilog2() + 1
}

fn create_cube_texture(
    device: &wgpu::Device,
    label: &str,
    dim: u32,
    mip_level_count: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: dim,
            height: dim,
            depth_or_array_layers: 6,
        },
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CUBE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

fn cube_view(texture: &wgpu::Texture, label: &str) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        format: None,
        dimension: Some(wgpu::TextureViewDimension::Cube),
        aspect: wgpu::TextureAspect::All,
        base_mip_level: 0,
        mip_level_count: None,
        base_array_layer: 0,
        array_layer_count: Some(6),
        usage: None,
    })
}

fn convolve_shader_source(body: &str) -> std::borrow::Cow<'static, str> {
    let mut source = String::new();
    source.push_str(include_str!("../../shader/brdf_common.wgsl"));
    source.push('\n');
    source.push_str(include_str!("../../shader/cubemap_face.wgsl"));
    source.push('\n');
    source.push_str(body);
    source.into()
}

/// Integrates the split-sum BRDF lookup table once at construction.
fn precompute_brdf_lut(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("PbrBrdfLut"),
        size: wgpu::Extent3d {
            width: BRDF_LUT_DIM,
            height: BRDF_LUT_DIM,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: BRDF_LUT_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("PbrBrdfLutShader"),
        source: wgpu::ShaderSource::Wgsl(
            format!(
                "{}\n{}",
                include_str!("../../shader/brdf_common.wgsl"),
                include_str!("../../shader/brdf_lut.wgsl")
            )
            .into(),
        ),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("PbrBrdfLutPipelineLayout"),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });

    let pipeline = PipelineBuilder::new(device, &layout, &shader)
        .with_label("PbrBrdfLutPipeline")
        .with_color_target(BRDF_LUT_FORMAT, None)
        .with_cull_mode(None)
        .build();

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("PbrBrdfLutEncoder"),
    });
    {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("PbrBrdfLutPass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(&pipeline);
        rpass.draw(0..3, 0..1);
    }
    queue.submit(Some(encoder.finish()));

    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn rotate(face: u32, v: Vec3) -> Vec3 {
        face_rotation(face).transform_vector3(v)
    }

    #[test]
    fn forward_axis_maps_to_each_face_direction() {
        let forward = Vec3::Z;
        let expected = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for (face, expected) in expected.iter().enumerate() {
            let dir = rotate(face as u32, forward);
            assert!(
                dir.abs_diff_eq(*expected, 1e-6),
                "face {}: {:?} != {:?}",
                face,
                dir,
                expected
            );
        }
    }

    #[test]
    fn face_rotations_are_orthonormal() {
        for face in 0..6 {
            let m = face_rotation(face);
            let det = m.determinant();
            assert!((det - 1.0).abs() < 1e-6, "face {} determinant {}", face, det);
        }
    }

    #[test]
    fn face_rotations_match_cube_addressing_table() {
        // Direction for NDC corner (sc, tc flipped): dir = rot * (sc, -tc, 1)
        // must match the WebGPU/GL cube-face table.
        let sc = 0.5;
        let tc = -0.25;
        let base = Vec3::new(sc, -tc, 1.0);
        let expected = [
            Vec3::new(1.0, -tc, -sc),
            Vec3::new(-1.0, -tc, sc),
            Vec3::new(sc, 1.0, tc),
            Vec3::new(sc, -1.0, -tc),
            Vec3::new(sc, -tc, 1.0),
            Vec3::new(-sc, -tc, -1.0),
        ];
        for (face, expected) in expected.iter().enumerate() {
            let dir = rotate(face as u32, base);
            assert!(
                dir.abs_diff_eq(*expected, 1e-6),
                "face {}: {:?} != {:?}",
                face,
                dir,
                expected
            );
        }
    }

    #[test]
    fn mip_counts_cover_full_chains() {
        assert_eq!(mip_count(IRRADIANCE_CUBE_DIM), 7);
        assert_eq!(mip_count(PREFILTERED_ENV_MAP_DIM), 9);
        assert_eq!(mip_count(1), 1);
    }
}
