//! Depth keys computed by a compute pass over the device-resident positions.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use sort::{KeyValueBuffers, WG, dispatch_size};
use wgpu::util::DeviceExt;

use crate::buffers::GpuBuffer;
use crate::context::GpuContext;
use crate::depth::ViewRay;
use crate::error::Result;
use crate::pipeline::DepthKeyProvider;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct PresortUniforms {
    eye: Vec4,
    forward: Vec4,
    count: u32,
    _pad: [u32; 3],
}

pub struct DeviceDepthKeys {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    uniforms: wgpu::Buffer,
    count: u32,
}

impl DeviceDepthKeys {
    /// `positions` holds one `vec4` per element with `w` ignored.
    pub fn new(ctx: &GpuContext, positions: &GpuBuffer, buffers: &KeyValueBuffers) -> Result<Self> {
        let device = &ctx.device;
        let count = positions.len() as u32;
        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/presort.wgsl"));

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Presort BGL"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Presort Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Presort Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Presort Uniforms"),
            contents: bytemuck::bytes_of(&PresortUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Presort BG"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: positions.handle().as_entire_binding(),
                },
                wgpu::BindGroupEntry { binding: 1, resource: buffers.keys().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: buffers.values().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: uniforms.as_entire_binding() },
            ],
        });

        tracing::debug!(count, wg = WG, "Created presort pipeline");

        Ok(Self { pipeline, bind_group, uniforms, count })
    }
}

impl DepthKeyProvider for DeviceDepthKeys {
    fn len(&self) -> u32 {
        self.count
    }

    fn write_keys(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        ray: &ViewRay,
        _buffers: &KeyValueBuffers,
    ) -> Result<()> {
        let uniforms = PresortUniforms {
            eye: ray.eye.extend(1.0),
            forward: ray.forward.extend(0.0),
            count: self.count,
            _pad: [0; 3],
        };
        ctx.queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));

        // Ending the pass orders the key writes before the sort reads them.
        let [x, y, z] = dispatch_size(self.count);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Presort Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);
        Ok(())
    }
}
