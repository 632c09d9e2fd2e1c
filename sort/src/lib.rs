//! GPU key/value sort.
//!
//! Sorts a buffer of `u32` keys ascending and carries a parallel buffer of `u32`
//! values along with it. The sorter is built once for a maximum element count and
//! owns nothing but its pipelines and uniforms; the key/value scratch buffers it
//! operates on are handed out by [`GpuSorter::create_key_value_buffers`] so their
//! layout always matches the sort kernels.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

mod error;

pub use error::SortError;
use error::Result;

/// Threads per work-group of every kernel in this crate.
pub const WG: u32 = 256;

/// Largest work-group count a single dispatch dimension may use.
pub const MAX_GROUPS_PER_DIM: u32 = 65535;

const KEY_SIZE: u64 = std::mem::size_of::<u32>() as u64;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
struct Extent {
    count: u32,
    padded: u32,
    _pad: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
struct Stage {
    k: u32,
    j: u32,
    _pad: [u32; 2],
}

/// Work-group counts covering `threads` invocations of a [`WG`]-wide kernel.
///
/// Grids larger than [`MAX_GROUPS_PER_DIM`] groups are folded into the y dimension;
/// kernels rebuild the flat index as `gid.x + gid.y * groups.x * WG` and discard
/// the overshoot.
pub fn dispatch_size(threads: u32) -> [u32; 3] {
    let groups = threads.div_ceil(WG).max(1);
    let x = groups.min(MAX_GROUPS_PER_DIM);
    [x, groups.div_ceil(x), 1]
}

/// Bitonic merge stages for a power-of-two element count, in execution order.
///
/// The stage list of a smaller power of two is always a prefix of a larger one,
/// so one table built for the capacity serves every count.
fn bitonic_stages(padded: u32) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut k = 2;
    while k <= padded {
        let mut j = k / 2;
        while j >= 1 {
            stages.push(Stage { k, j, _pad: [0; 2] });
            j /= 2;
        }
        k <<= 1;
    }
    stages
}

fn stage_count(padded: u32) -> usize {
    let m = padded.trailing_zeros() as usize;
    m * (m + 1) / 2
}

/// Device-resident key and value buffers sized for a sorter's capacity.
pub struct KeyValueBuffers {
    keys: wgpu::Buffer,
    values: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: u32,
}

impl KeyValueBuffers {
    pub fn keys(&self) -> &wgpu::Buffer {
        &self.keys
    }

    pub fn values(&self) -> &wgpu::Buffer {
        &self.values
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

pub struct GpuSorter {
    pad_pipeline: wgpu::ComputePipeline,
    bitonic_pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    extent_buffer: wgpu::Buffer,
    stage_buffer: wgpu::Buffer,
    stage_stride: u64,
    capacity: u32,
    padded_capacity: u32,
}

impl GpuSorter {
    /// Build a sorter able to sort up to `capacity` key/value pairs.
    pub fn new(device: &wgpu::Device, capacity: u32) -> Result<Self> {
        let limits = device.limits();
        let limit = limits
            .max_storage_buffer_binding_size
            .min(limits.max_buffer_size.min(u32::MAX as u64) as u32) as u64;

        let padded_capacity = capacity.max(1).checked_next_power_of_two();
        let bytes = padded_capacity.map_or(1 << 34, |p| p as u64 * KEY_SIZE);
        let padded_capacity = match padded_capacity {
            Some(p) if bytes <= limit => p,
            _ => return Err(SortError::CapacityTooLarge { capacity, bytes, limit }),
        };

        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/sort.wgsl"));

        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sort BGL"),
            entries: &[
                storage_entry(0),
                storage_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<Extent>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<Stage>() as u64),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sort Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pad_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Sort Pad Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("pad_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let bitonic_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Sort Bitonic Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("bitonic_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let extent_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sort Extent"),
            size: std::mem::size_of::<Extent>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // One uniform slot per merge stage, addressed through a dynamic offset.
        let alignment = limits.min_uniform_buffer_offset_alignment as u64;
        let stage_stride = (std::mem::size_of::<Stage>() as u64).div_ceil(alignment) * alignment;
        let stages = bitonic_stages(padded_capacity);
        let mut stage_bytes = vec![0u8; (stages.len().max(1) as u64 * stage_stride) as usize];
        for (i, stage) in stages.iter().enumerate() {
            let offset = i * stage_stride as usize;
            stage_bytes[offset..offset + std::mem::size_of::<Stage>()]
                .copy_from_slice(bytemuck::bytes_of(stage));
        }
        let stage_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sort Stages"),
            contents: &stage_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        tracing::debug!(capacity, padded_capacity, stages = stages.len(), "Created GPU sorter");

        Ok(Self {
            pad_pipeline,
            bitonic_pipeline,
            bind_group_layout,
            extent_buffer,
            stage_buffer,
            stage_stride,
            capacity,
            padded_capacity,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Allocate key/value buffers this sorter can operate on.
    ///
    /// Both buffers hold the padded capacity. Callers write their `count` keys and
    /// values to the front; the padding is managed by [`GpuSorter::sort`].
    pub fn create_key_value_buffers(&self, device: &wgpu::Device) -> KeyValueBuffers {
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let size = self.padded_capacity as u64 * KEY_SIZE;

        let keys = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sort Keys"),
            size,
            usage,
            mapped_at_creation: false,
        });
        let values = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sort Values"),
            size,
            usage,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sort BG"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: keys.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: values.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.extent_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.stage_buffer,
                        offset: 0,
                        size: NonZeroU64::new(std::mem::size_of::<Stage>() as u64),
                    }),
                },
            ],
        });

        KeyValueBuffers { keys, values, bind_group, capacity: self.capacity }
    }

    /// Record a sort of the first `count` pairs of `buffers`, ascending by key.
    ///
    /// Afterwards `buffers.values()[rank]` holds the value that was paired with the
    /// key of that rank. Pairs with equal keys are ordered by value, and the value
    /// `u32::MAX` is reserved for padding. The element
    /// count travels through a queued uniform write, so a sorter performs at most
    /// one sort per queue submission.
    pub fn sort(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &KeyValueBuffers,
        count: u32,
    ) -> Result<()> {
        let capacity = self.capacity.min(buffers.capacity);
        if count > capacity {
            return Err(SortError::CapacityExceeded { count, capacity });
        }
        if count < 2 {
            return Ok(());
        }

        let _span = tracing::trace_span!("Bitonic sort", count).entered();

        let padded = count.next_power_of_two();
        let extent = Extent { count, padded, _pad: [0; 2] };
        queue.write_buffer(&self.extent_buffer, 0, bytemuck::bytes_of(&extent));

        let [x, y, z] = dispatch_size(padded);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Sort Pass"),
            timestamp_writes: None,
        });

        if padded > count {
            pass.set_pipeline(&self.pad_pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[0]);
            pass.dispatch_workgroups(x, y, z);
        }

        pass.set_pipeline(&self.bitonic_pipeline);
        for stage in 0..stage_count(padded) {
            let offset = (stage as u64 * self.stage_stride) as u32;
            pass.set_bind_group(0, &buffers.bind_group, &[offset]);
            pass.dispatch_workgroups(x, y, z);
        }

        Ok(())
    }
}
