//! Shader programs and the draw pipelines built from them.

use crate::buffers::VertexArray;
use crate::config::DrawTopology;
use crate::context::GpuContext;
use crate::error::{RenderError, Result};

/// WGSL source plus the attribute names its vertex stage declares.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource {
    pub name: &'static str,
    pub source: &'static str,
    pub attributes: &'static [(&'static str, u32)],
}

pub struct Program {
    name: &'static str,
    module: wgpu::ShaderModule,
    attributes: &'static [(&'static str, u32)],
}

impl Program {
    /// Compile `source`, reporting compile errors instead of panicking on them.
    pub async fn load(ctx: &GpuContext, source: &ProgramSource) -> Result<Self> {
        let module = ctx
            .checked("compiling shader", |device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(source.name),
                    source: wgpu::ShaderSource::Wgsl(source.source.into()),
                })
            })
            .await
            .map_err(|err| match err {
                RenderError::Gpu { message, .. } => {
                    RenderError::ShaderCompile { name: source.name.to_owned(), message }
                }
                other => other,
            })?;

        tracing::debug!(name = source.name, "Compiled shader program");

        Ok(Self { name: source.name, module, attributes: source.attributes })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Shader location of the attribute called `name`.
    pub fn attrib_loc(&self, name: &str) -> Result<u32> {
        self.attributes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, loc)| *loc)
            .ok_or_else(|| RenderError::MissingAttribute {
                program: self.name.to_owned(),
                name: name.to_owned(),
            })
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// A render pipeline drawing the elements of a [`VertexArray`] in element order.
///
/// With [`DrawTopology::Points`] the element buffer is the index buffer of a
/// point-list draw. With [`DrawTopology::Sprites`] every element becomes an
/// instanced quad whose vertex stage reads `order[instance_index]`; bind group 1
/// then holds the element buffer at binding 0 and attribute `location` at
/// binding `1 + location`.
pub struct DrawPipeline {
    pipeline: wgpu::RenderPipeline,
    topology: DrawTopology,
    sprite_group: Option<wgpu::BindGroup>,
}

impl DrawPipeline {
    pub async fn new(
        ctx: &GpuContext,
        program: &Program,
        vao: &VertexArray,
        topology: DrawTopology,
        frame_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let device = &ctx.device;

        let sprite_parts = match topology {
            DrawTopology::Points => None,
            DrawTopology::Sprites => {
                let elements = vao.element_buffer();
                let mut layout_entries = vec![storage_entry(0)];
                let mut entries = vec![wgpu::BindGroupEntry {
                    binding: 0,
                    resource: elements.handle().as_entire_binding(),
                }];
                for (location, buffer) in vao.attrib_buffers() {
                    layout_entries.push(storage_entry(1 + location));
                    entries.push(wgpu::BindGroupEntry {
                        binding: 1 + location,
                        resource: buffer.handle().as_entire_binding(),
                    });
                }

                let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Sprite BGL"),
                    entries: &layout_entries,
                });
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Sprite BG"),
                    layout: &layout,
                    entries: &entries,
                });
                Some((layout, group))
            }
        };

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = match &sprite_parts {
            Some((layout, _)) => vec![frame_layout, layout],
            None => vec![frame_layout],
        };

        let (vs, fs, primitive_topology, buffers) = match topology {
            DrawTopology::Points => (
                "vs_points",
                "fs_points",
                wgpu::PrimitiveTopology::PointList,
                vao.vertex_buffer_layouts(),
            ),
            DrawTopology::Sprites => (
                "vs_sprite",
                "fs_sprite",
                wgpu::PrimitiveTopology::TriangleStrip,
                Vec::new(),
            ),
        };

        let pipeline = ctx
            .checked("creating draw pipeline", |device| {
                let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Draw Pipeline Layout"),
                    bind_group_layouts: &bind_group_layouts,
                    push_constant_ranges: &[],
                });

                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(program.name),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &program.module,
                        entry_point: Some(vs),
                        buffers: &buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &program.module,
                        entry_point: Some(fs),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: primitive_topology,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })
            .await?;

        Ok(Self {
            pipeline,
            topology,
            sprite_group: sprite_parts.map(|(_, group)| group),
        })
    }

    /// Record the draw of the first `count` elements. Returns the number of draw
    /// calls issued.
    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        frame_group: &wgpu::BindGroup,
        vao: &VertexArray,
        count: u32,
    ) -> u32 {
        if count == 0 {
            return 0;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame_group, &[]);

        match (&self.sprite_group, self.topology) {
            (Some(group), DrawTopology::Sprites) => {
                pass.set_bind_group(1, group, &[]);
                pass.draw(0..4, 0..count);
            }
            _ => vao.draw_elements(pass, count),
        }
        1
    }
}
