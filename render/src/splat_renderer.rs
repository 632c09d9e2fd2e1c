use bytemuck::Zeroable;
use glam::Vec3;

use crate::attributes::{SplatAttributes, identity_indices};
use crate::buffers::{BufferKind, GpuBuffer, Mutability, VertexArray};
use crate::cloud::Splat;
use crate::config::RendererConfig;
use crate::context::GpuContext;
use crate::depth::HostDepthKeys;
use crate::error::Result;
use crate::frame::{FrameParams, FrameStats, SplatUniforms};
use crate::pipeline::SortPipeline;
use crate::program::{DrawPipeline, Program, ProgramSource};

pub const SPLAT_PROGRAM: ProgramSource = ProgramSource {
    name: "gaussian_splat",
    source: include_str!("shaders/splat.wgsl"),
    attributes: &[
        ("position", 0),
        ("color", 1),
        ("cov3_col0", 2),
        ("cov3_col1", 3),
        ("cov3_col2", 4),
    ],
};

/// Renders a Gaussian splat cloud back to front.
///
/// Depth keys are computed on the host every frame from a CPU copy of the
/// positions and uploaded before the GPU sort.
pub struct GaussianSplatRenderer {
    vao: VertexArray,
    sort: SortPipeline<HostDepthKeys>,
    uniforms: GpuBuffer,
    frame_group: wgpu::BindGroup,
    draw: DrawPipeline,
    len: u32,
}

impl GaussianSplatRenderer {
    /// Build attribute buffers, the identity element buffer, the sorter and the
    /// draw pipeline for `splats`.
    ///
    /// # Panics
    /// If the cloud has more than `u32::MAX` splats.
    pub async fn new(ctx: &GpuContext, splats: &[Splat], config: &RendererConfig) -> Result<Self> {
        let attrs = SplatAttributes::build(splats);
        let indices = identity_indices(attrs.len());
        let len = indices.len() as u32;

        let program = Program::load(ctx, &SPLAT_PROGRAM).await?;
        let columns = [
            ("Splat Positions", program.attrib_loc("position")?, &attrs.positions),
            ("Splat Cov3 Col0", program.attrib_loc("cov3_col0")?, &attrs.cov3_col0),
            ("Splat Cov3 Col1", program.attrib_loc("cov3_col1")?, &attrs.cov3_col1),
            ("Splat Cov3 Col2", program.attrib_loc("cov3_col2")?, &attrs.cov3_col2),
        ];
        let color_loc = program.attrib_loc("color")?;

        let (vao, uniforms) = ctx
            .checked("allocating splat buffers", |device| {
                let elements = GpuBuffer::from_slice(
                    device,
                    "Splat Elements",
                    &indices,
                    BufferKind::Element,
                    Mutability::Dynamic,
                );
                let mut vao = VertexArray::new(elements);
                for (label, location, data) in columns {
                    let buffer = GpuBuffer::from_slice::<Vec3>(
                        device,
                        label,
                        data,
                        BufferKind::Attribute,
                        Mutability::Static,
                    );
                    vao.set_attrib_buffer(location, wgpu::VertexFormat::Float32x3, buffer);
                }
                let colors = GpuBuffer::from_slice(
                    device,
                    "Splat Colors",
                    &attrs.colors,
                    BufferKind::Attribute,
                    Mutability::Static,
                );
                vao.set_attrib_buffer(color_loc, wgpu::VertexFormat::Float32x4, colors);

                let uniforms = GpuBuffer::from_slice(
                    device,
                    "Splat Uniforms",
                    &[SplatUniforms::zeroed()],
                    BufferKind::Uniform,
                    Mutability::Dynamic,
                );
                (vao, uniforms)
            })
            .await?;

        let positions = attrs.positions;
        let sort = SortPipeline::new(ctx, len, |_| Ok(HostDepthKeys::new(positions)))?;

        let frame_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Splat Frame BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let frame_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Splat Frame BG"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.handle().as_entire_binding(),
            }],
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

        tracing::info!(
            splats = len,
            topology = ?config.topology,
            "Created Gaussian splat renderer"
        );

        Ok(Self { vao, sort, uniforms, frame_group, draw, len })
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The element buffer holding splat indices in draw order.
    pub fn element_buffer(&self) -> &GpuBuffer {
        self.vao.element_buffer()
    }

    /// Host-side depth keys of the last sorted frame.
    pub fn host_keys(&self) -> &[u32] {
        self.sort.provider().keys()
    }

    /// Record the sort and the draw of one frame into `encoder`.
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
        tracing::debug!(splats = self.len, "Rendering splat frame");

        self.uniforms.update(&ctx.queue, &[SplatUniforms::new(frame)])?;
        self.sort.run(ctx, encoder, &frame.view_ray(), self.vao.element_buffer())?;

        let _span = tracing::trace_span!("draw", elements = self.len).entered();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Splat Pass"),
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
