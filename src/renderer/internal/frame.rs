use std::mem;
use std::num::NonZeroU64;

use glam::Mat4;

use crate::renderer::uniforms::{NodeTransforms, PrimitiveShaderData};

/// 256-byte slots satisfy the required dynamic-offset alignment on every
/// backend wgpu supports.
const SLOT_ALIGN: u32 = 256;

const INITIAL_DRAW_CAPACITY: u32 = 1024;
const INITIAL_JOINT_UPLOAD_CAPACITY: u32 = 64;

/// Per-frame constant arenas: node transforms, joint palettes and the
/// combined renderer/material block, each bound with a dynamic offset.
///
/// Every draw call writes its constants into fresh slots, so queued buffer
/// writes never overlap and no write waits on a prior GPU read, the same
/// guarantee a map-discard upload gives. `begin_frame` rewinds the
/// cursors; queue ordering makes reuse across frames safe.
pub(crate) struct FrameArena {
    transforms: ArenaBuffer,
    joints: ArenaBuffer,
    attribs: ArenaBuffer,
    joints_slot_size: u32,
    joints_block_size: u32,
    joints_scratch: Vec<[[f32; 4]; 4]>,
    pub(crate) bind_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

struct ArenaBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
    slot_size: u32,
    capacity: u32,
    cursor: u32,
}

impl FrameArena {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue, max_joint_count: u32) -> Self {
        let joints_block_size = mem::size_of::<Mat4>() as u32 * max_joint_count.max(1);
        let joints_slot_size = joints_block_size.next_multiple_of(SLOT_ALIGN);

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PbrFrameBindLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(
                            mem::size_of::<NodeTransforms>() as u64
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(joints_block_size as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(
                            mem::size_of::<PrimitiveShaderData>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let transforms = ArenaBuffer::new(
            device,
            "PbrNodeTransformsArena",
            SLOT_ALIGN,
            INITIAL_DRAW_CAPACITY,
        );
        let mut joints = ArenaBuffer::new(
            device,
            "PbrJointsArena",
            joints_slot_size,
            INITIAL_JOINT_UPLOAD_CAPACITY,
        );
        let attribs = ArenaBuffer::new(
            device,
            "PbrPrimitiveAttribsArena",
            SLOT_ALIGN,
            INITIAL_DRAW_CAPACITY,
        );

        joints.cursor = 1;
        zero_first_joint_slot(queue, &joints.buffer, joints_slot_size);

        let bind_group = create_bind_group(
            device,
            &bind_layout,
            &transforms.buffer,
            &joints.buffer,
            &attribs.buffer,
            joints_block_size,
        );

        Self {
            transforms,
            joints,
            attribs,
            joints_slot_size,
            joints_block_size,
            joints_scratch: Vec::new(),
            bind_layout,
            bind_group,
        }
    }

    pub(crate) fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Rewinds all cursors; call once per frame before the first render.
    /// Slot 0 of the joints arena stays reserved (and zeroed) for draws
    /// without skinning.
    pub(crate) fn begin_frame(&mut self) {
        self.transforms.cursor = 0;
        self.joints.cursor = 1;
        self.attribs.cursor = 0;
    }

    /// Guarantees room for `draws` transform/attrib slots and
    /// `joint_uploads` palette slots before any command referencing the
    /// arena is recorded. Growth allocates fresh buffers; commands already
    /// recorded keep reading the previous ones through the bind group they
    /// were recorded with.
    pub(crate) fn ensure_capacity(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        draws: u32,
        joint_uploads: u32,
    ) {
        let mut rebuilt = false;
        rebuilt |= self.transforms.ensure(device, draws);
        rebuilt |= self.attribs.ensure(device, draws);
        if self.joints.ensure(device, joint_uploads) {
            zero_first_joint_slot(queue, &self.joints.buffer, self.joints_slot_size);
            rebuilt = true;
        }

        if rebuilt {
            self.bind_group = create_bind_group(
                device,
                &self.bind_layout,
                &self.transforms.buffer,
                &self.joints.buffer,
                &self.attribs.buffer,
                self.joints_block_size,
            );
        }
    }

    pub(crate) fn push_transforms(&mut self, queue: &wgpu::Queue, data: &NodeTransforms) -> u32 {
        let offset = self.transforms.take_slot();
        queue.write_buffer(&self.transforms.buffer, offset as u64, bytemuck::bytes_of(data));
        offset
    }

    pub(crate) fn push_attribs(&mut self, queue: &wgpu::Queue, data: &PrimitiveShaderData) -> u32 {
        let offset = self.attribs.take_slot();
        queue.write_buffer(&self.attribs.buffer, offset as u64, bytemuck::bytes_of(data));
        offset
    }

    /// Uploads a (pre-clamped) joint palette and returns its dynamic offset.
    pub(crate) fn push_joints(&mut self, queue: &wgpu::Queue, joints: &[Mat4]) -> u32 {
        let offset = self.joints.take_slot();
        self.joints_scratch.clear();
        self.joints_scratch
            .extend(joints.iter().map(|m| m.to_cols_array_2d()));
        queue.write_buffer(
            &self.joints.buffer,
            offset as u64,
            bytemuck::cast_slice(&self.joints_scratch),
        );
        offset
    }
}

impl ArenaBuffer {
    fn new(device: &wgpu::Device, label: &'static str, slot_size: u32, capacity: u32) -> Self {
        Self {
            buffer: create_buffer(device, label, slot_size as u64 * capacity as u64),
            label,
            slot_size,
            capacity,
            cursor: 0,
        }
    }

    fn ensure(&mut self, device: &wgpu::Device, required: u32) -> bool {
        let needed = self.cursor + required;
        if needed <= self.capacity {
            return false;
        }

        let new_capacity = needed.max(self.capacity * 2);
        log::info!(
            "Growing {}: {} -> {} slots",
            self.label,
            self.capacity,
            new_capacity
        );
        self.buffer = create_buffer(
            device,
            self.label,
            self.slot_size as u64 * new_capacity as u64,
        );
        self.capacity = new_capacity;
        true
    }

    fn take_slot(&mut self) -> u32 {
        debug_assert!(self.cursor < self.capacity, "frame arena slot overflow");
        let offset = self.cursor * self.slot_size;
        self.cursor += 1;
        offset
    }
}

fn create_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn zero_first_joint_slot(queue: &wgpu::Queue, buffer: &wgpu::Buffer, slot_size: u32) {
    queue.write_buffer(buffer, 0, &vec![0u8; slot_size as usize]);
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    transforms: &wgpu::Buffer,
    joints: &wgpu::Buffer,
    attribs: &wgpu::Buffer,
    joints_block_size: u32,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("PbrFrameBindGroup"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: transforms,
                    offset: 0,
                    size: NonZeroU64::new(mem::size_of::<NodeTransforms>() as u64),
                }),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: joints,
                    offset: 0,
                    size: NonZeroU64::new(joints_block_size as u64),
                }),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: attribs,
                    offset: 0,
                    size: NonZeroU64::new(mem::size_of::<PrimitiveShaderData>() as u64),
                }),
            },
        ],
    })
}
