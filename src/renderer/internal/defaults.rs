//! Placeholder textures bound whenever a material leaves a slot empty.

const TEX_DIM: u32 = 8;

pub(crate) struct DefaultTexture {
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

/// Renderer-owned placeholder set, created once at construction and
/// immutable afterwards. Views are exposed so other subsystems (e.g. a
/// skybox pass) can reuse them.
pub(crate) struct DefaultTextures {
    pub(crate) white: DefaultTexture,
    pub(crate) black: DefaultTexture,
    pub(crate) normal: DefaultTexture,
    pub(crate) physical: DefaultTexture,
    pub(crate) sampler: wgpu::Sampler,
}

impl DefaultTextures {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        // Byte patterns: opaque white, transparent black, +Z tangent-space
        // normal, and a physical descriptor with roughness = 1, metallic = 0.
        let white = solid_color_texture(device, queue, "PbrWhiteTexture", [0xFF, 0xFF, 0xFF, 0xFF]);
        let black = solid_color_texture(device, queue, "PbrBlackTexture", [0x00, 0x00, 0x00, 0x00]);
        let normal =
            solid_color_texture(device, queue, "PbrDefaultNormalMap", [0x7F, 0x7F, 0xFF, 0x00]);
        let physical =
            solid_color_texture(device, queue, "PbrDefaultPhysicalDesc", [0x00, 0xFF, 0x00, 0x00]);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PbrDefaultSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            white,
            black,
            normal,
            physical,
            sampler,
        }
    }
}

fn solid_color_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    rgba: [u8; 4],
) -> DefaultTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: TEX_DIM,
            height: TEX_DIM,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let data: Vec<u8> = rgba
        .iter()
        .copied()
        .cycle()
        .take((TEX_DIM * TEX_DIM * 4) as usize)
        .collect();

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(TEX_DIM * 4),
            rows_per_image: Some(TEX_DIM),
        },
        wgpu::Extent3d {
            width: TEX_DIM,
            height: TEX_DIM,
            depth_or_array_layers: 1,
        },
    );

    // The PBR shader samples every material slot as a 2D array, so even
    // placeholders expose a single-layer array view.
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        format: None,
        dimension: Some(wgpu::TextureViewDimension::D2Array),
        aspect: wgpu::TextureAspect::All,
        base_mip_level: 0,
        mip_level_count: None,
        base_array_layer: 0,
        array_layer_count: None,
        usage: None,
    });

    DefaultTexture {
        _texture: texture,
        view,
    }
}
