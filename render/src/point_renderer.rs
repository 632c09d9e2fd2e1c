use bytemuck::Zeroable;

use crate::attributes::{PointAttributes, identity_indices};
use crate::buffers::{BufferKind, GpuBuffer, Mutability, VertexArray};
use crate::cloud::PointSample;
use crate::config::RendererConfig;
use crate::context::GpuContext;
use crate::error::Result;
use crate::frame::{FrameParams, FrameStats, PointUniforms};
use crate::pipeline::SortPipeline;
use crate::presort::DeviceDepthKeys;
use crate::program::{DrawPipeline, Program, ProgramSource};
use crate::texture::SpriteTexture;

pub const POINT_PROGRAM: ProgramSource = ProgramSource {
    name: "point_sprite",
    source: include_str!("shaders/point.wgsl"),
    attributes: &[("position", 0), ("color", 1)],
};

/// Renders a coloured point cloud as textured sprites, back to front.
///
/// Depth keys are computed on the device by a presort compute pass that reads
/// the position attribute buffer directly, so no per-frame host work scales
/// with the cloud size.
pub struct PointRenderer {
    vao: VertexArray,
    sort: SortPipeline<DeviceDepthKeys>,
    uniforms: GpuBuffer,
    frame_group: wgpu::BindGroup,
    draw: DrawPipeline,
    point_size: f32,
    len: u32,
}

impl PointRenderer {
    /// # Panics
    /// If the cloud has more than `u32::MAX` points.
    pub async fn new(
        ctx: &GpuContext,
        points: &[PointSample],
        sprite: &SpriteTexture,
        config: &RendererConfig,
    ) -> Result<Self> {
        let attrs = PointAttributes::build(points);
        let indices = identity_indices(attrs.len());
        let len = indices.len() as u32;

        let program = Program::load(ctx, &POINT_PROGRAM).await?;
        let position_loc = program.attrib_loc("position")?;
        let color_loc = program.attrib_loc("color")?;

        let (elements, positions, colors, uniforms) = ctx
            .checked("allocating point buffers", |device| {
                let elements = GpuBuffer::from_slice(
                    device,
                    "Point Elements",
                    &indices,
                    BufferKind::Element,
                    Mutability::Dynamic,
                );
                let positions = GpuBuffer::from_slice(
                    device,
                    "Point Positions",
                    &attrs.positions,
                    BufferKind::Attribute,
                    Mutability::Static,
                );
                let colors = GpuBuffer::from_slice(
                    device,
                    "Point Colors",
                    &attrs.colors,
                    BufferKind::Attribute,
                    Mutability::Static,
                );
                let uniforms = GpuBuffer::from_slice(
                    device,
                    "Point Uniforms",
                    &[PointUniforms::zeroed()],
                    BufferKind::Uniform,
                    Mutability::Dynamic,
                );
                (elements, positions, colors, uniforms)
            })
            .await?;

        // The presort reads the same buffer the draw uses for positions.
        let sort = SortPipeline::new(ctx, len, |buffers| {
            DeviceDepthKeys::new(ctx, &positions, buffers)
        })?;

        let mut vao = VertexArray::new(elements);
        vao.set_attrib_buffer(position_loc, wgpu::VertexFormat::Float32x4, positions);
        vao.set_attrib_buffer(color_loc, wgpu::VertexFormat::Float32x4, colors);

        let frame_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Point Frame BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let frame_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Point Frame BG"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.handle().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(sprite.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sprite.sampler()),
                },
            ],
        });

        let draw = DrawPipeline::new(
            ctx,
            &program,
            &vao,
            config.topology,
            &frame_layout,
            config.color_format.into(),
        )
        .await?;

        tracing::info!(points = len, topology = ?config.topology, "Created point renderer");

        Ok(Self {
            vao,
            sort,
            uniforms,
            frame_group,
            draw,
            point_size: config.point_size,
            len,
        })
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The element buffer holding point indices in draw order.
    pub fn element_buffer(&self) -> &GpuBuffer {
        self.vao.element_buffer()
    }

    /// Scratch keys written by the presort pass; sorted after a frame is submitted.
    pub fn sort_keys(&self) -> &wgpu::Buffer {
        self.sort.buffers().keys()
    }

    /// Record the presort, the sort and the draw of one frame into `encoder`.
    ///
    /// The colour target is loaded, not cleared. Nothing is recorded for an
    /// empty cloud.
    pub fn render(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        frame: &FrameParams,
    ) -> Result<FrameStats> {
        if self.len == 0 {
            return Ok(FrameStats::default());
        }
        tracing::debug!(points = self.len, "Rendering point frame");

        self.uniforms.update(&ctx.queue, &[PointUniforms::new(frame, self.point_size)])?;
        self.sort.run(ctx, encoder, &frame.view_ray(), self.vao.element_buffer())?;

        let _span = tracing::trace_span!("draw", elements = self.len).entered();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let draw_calls = self.draw.draw(&mut pass, &self.frame_group, &self.vao, self.len);

        Ok(FrameStats { elements: self.len, draw_calls })
    }
}
