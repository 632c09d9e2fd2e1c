use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use render::buffers::GpuBuffer;
use render::depth::depth_key;
use render::{
    DrawTopology, FrameParams, FrameStats, GaussianSplatRenderer, GpuContext, PointRenderer,
    PointSample, RendererConfig, Splat, SpriteTexture,
};

const SIZE: u32 = 64;

fn context() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::headless()) {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            eprintln!("No GPU adapter available, skipping: {err}");
            None
        }
    }
}

fn target(ctx: &GpuContext) -> wgpu::TextureView {
    ctx.device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Target"),
            size: wgpu::Extent3d { width: SIZE, height: SIZE, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn frame(camera: Mat4) -> FrameParams {
    FrameParams {
        camera,
        viewport: Vec4::new(0.0, 0.0, SIZE as f32, SIZE as f32),
        near_far: Vec2::new(0.1, 100.0),
        fovy: 1.0,
    }
}

fn splat_at(position: Vec3) -> Splat {
    Splat::from_scale_rotation(position, 0.0, Vec3::ZERO, Vec3::splat(-3.0), Quat::IDENTITY)
}

fn point_at(position: Vec3) -> PointSample {
    PointSample { position: position.to_array(), color: [200, 100, 50] }
}

fn random_positions(n: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.random_range(-2.0..2.0),
                rng.random_range(-2.0..2.0),
                rng.random_range(-8.0..-1.0),
            )
        })
        .collect()
}

fn read_elements(ctx: &GpuContext, buffer: &GpuBuffer) -> Vec<u32> {
    pollster::block_on(ctx.read_buffer::<u32>(buffer.handle(), buffer.len()))
        .expect("Read-back failed")
}

fn render_splats(
    ctx: &GpuContext,
    renderer: &mut GaussianSplatRenderer,
    frame: &FrameParams,
) -> FrameStats {
    let view = target(ctx);
    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let stats = renderer.render(ctx, &mut encoder, &view, frame).expect("Render failed");
    ctx.queue.submit(Some(encoder.finish()));
    stats
}

fn render_points(
    ctx: &GpuContext,
    renderer: &mut PointRenderer,
    frame: &FrameParams,
) -> FrameStats {
    let view = target(ctx);
    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let stats = renderer.render(ctx, &mut encoder, &view, frame).expect("Render failed");
    ctx.queue.submit(Some(encoder.finish()));
    stats
}

fn splat_renderer(
    ctx: &GpuContext,
    positions: &[Vec3],
    config: &RendererConfig,
) -> GaussianSplatRenderer {
    let splats: Vec<Splat> = positions.iter().copied().map(splat_at).collect();
    pollster::block_on(GaussianSplatRenderer::new(ctx, &splats, config)).expect("Splat renderer")
}

fn point_renderer(ctx: &GpuContext, positions: &[Vec3], config: &RendererConfig) -> PointRenderer {
    let points: Vec<PointSample> = positions.iter().copied().map(point_at).collect();
    let sprite = SpriteTexture::soft_disk(ctx, 16).expect("Sprite");
    pollster::block_on(PointRenderer::new(ctx, &points, &sprite, config)).expect("Point renderer")
}

fn assert_permutation(mut order: Vec<u32>) {
    let n = order.len() as u32;
    order.sort_unstable();
    assert_eq!(order, (0..n).collect::<Vec<_>>());
}

#[test]
fn element_buffer_starts_as_identity() {
    let Some(ctx) = context() else { return };
    let config = RendererConfig::default();

    for n in [0, 1, 7, 300] {
        let positions = random_positions(n, n as u64);
        let splats = splat_renderer(&ctx, &positions, &config);
        let points = point_renderer(&ctx, &positions, &config);

        let identity: Vec<u32> = (0..n as u32).collect();
        assert_eq!(read_elements(&ctx, splats.element_buffer()), identity);
        assert_eq!(read_elements(&ctx, points.element_buffer()), identity);
    }
}

#[test]
fn element_buffer_is_permutation_after_render() {
    let Some(ctx) = context() else { return };
    let config = RendererConfig::default();
    let positions = random_positions(5_000, 7);

    let mut splats = splat_renderer(&ctx, &positions, &config);
    let mut points = point_renderer(&ctx, &positions, &config);
    let frame = frame(Mat4::IDENTITY);

    let expected = FrameStats { elements: 5_000, draw_calls: 1 };
    assert_eq!(render_splats(&ctx, &mut splats, &frame), expected);
    assert_eq!(render_points(&ctx, &mut points, &frame), expected);

    assert_permutation(read_elements(&ctx, splats.element_buffer()));
    assert_permutation(read_elements(&ctx, points.element_buffer()));
}

#[test]
fn draws_far_to_near() {
    let Some(ctx) = context() else { return };
    let config = RendererConfig::default();
    let positions = [-1.0, -5.0, -2.0].map(|z| Vec3::new(0.0, 0.0, z));
    let frame = frame(Mat4::IDENTITY);

    let mut splats = splat_renderer(&ctx, &positions, &config);
    render_splats(&ctx, &mut splats, &frame);
    assert_eq!(read_elements(&ctx, splats.element_buffer()), vec![1, 2, 0]);

    let mut points = point_renderer(&ctx, &positions, &config);
    render_points(&ctx, &mut points, &frame);
    assert_eq!(read_elements(&ctx, points.element_buffer()), vec![1, 2, 0]);
}

#[test]
fn empty_cloud_draws_nothing() {
    let Some(ctx) = context() else { return };
    let config = RendererConfig::default();
    let frame = frame(Mat4::IDENTITY);

    let mut splats = splat_renderer(&ctx, &[], &config);
    let mut points = point_renderer(&ctx, &[], &config);

    assert_eq!(render_splats(&ctx, &mut splats, &frame), FrameStats::default());
    assert_eq!(render_points(&ctx, &mut points, &frame), FrameStats::default());
    assert!(splats.is_empty() && points.is_empty());
}

#[test]
fn moving_camera_reorders() {
    let Some(ctx) = context() else { return };
    let config = RendererConfig::default();
    let positions = [-1.0, -5.0, -2.0].map(|z| Vec3::new(0.0, 0.0, z));

    // Behind the cloud, looking back along +Z.
    let turned = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0))
        * Mat4::from_rotation_y(std::f32::consts::PI);

    let mut splats = splat_renderer(&ctx, &positions, &config);
    render_splats(&ctx, &mut splats, &frame(Mat4::IDENTITY));
    let before = read_elements(&ctx, splats.element_buffer());
    render_splats(&ctx, &mut splats, &frame(turned));
    let after = read_elements(&ctx, splats.element_buffer());
    assert_eq!(before, vec![1, 2, 0]);
    assert_eq!(after, vec![0, 2, 1]);

    let mut points = point_renderer(&ctx, &positions, &config);
    render_points(&ctx, &mut points, &frame(Mat4::IDENTITY));
    let before = read_elements(&ctx, points.element_buffer());
    render_points(&ctx, &mut points, &frame(turned));
    let after = read_elements(&ctx, points.element_buffer());
    assert_eq!(before, vec![1, 2, 0]);
    assert_eq!(after, vec![0, 2, 1]);
}

#[test]
fn host_and_device_keys_agree() {
    let Some(ctx) = context() else { return };
    let config = RendererConfig::default();

    // Quarter-unit steps in front of and behind the eye: exact in f32 on both sides.
    let positions: Vec<Vec3> = (-16..48)
        .map(|k| Vec3::new(0.25, -0.5, -(k as f32) / 4.0))
        .collect();
    let frame = frame(Mat4::IDENTITY);

    let mut splats = splat_renderer(&ctx, &positions, &config);
    let mut points = point_renderer(&ctx, &positions, &config);
    render_splats(&ctx, &mut splats, &frame);
    render_points(&ctx, &mut points, &frame);

    let mut host = splats.host_keys().to_vec();
    let expected: Vec<u32> = positions.iter().map(|p| depth_key(-p.z)).collect();
    assert_eq!(host, expected);

    // The device keys come back sorted.
    host.sort_unstable();
    let device = pollster::block_on(ctx.read_buffer::<u32>(points.sort_keys(), positions.len()))
        .expect("Read-back");
    assert_eq!(device, host);
}

#[test]
fn point_topology_renders() {
    let Some(ctx) = context() else { return };
    let config = RendererConfig { topology: DrawTopology::Points, ..Default::default() };
    let positions = random_positions(1_000, 3);
    let frame = frame(Mat4::IDENTITY);

    let mut splats = splat_renderer(&ctx, &positions, &config);
    let mut points = point_renderer(&ctx, &positions, &config);

    assert_eq!(render_splats(&ctx, &mut splats, &frame).draw_calls, 1);
    assert_eq!(render_points(&ctx, &mut points, &frame).draw_calls, 1);
    assert_permutation(read_elements(&ctx, splats.element_buffer()));
    assert_permutation(read_elements(&ctx, points.element_buffer()));
}

#[test]
fn sprite_texture_has_full_mip_chain() {
    let Some(ctx) = context() else { return };

    let disk = SpriteTexture::soft_disk(&ctx, 16).expect("Sprite");
    assert_eq!(disk.size(), (16, 16));
    assert_eq!(disk.mip_level_count(), 5);

    let strip = SpriteTexture::from_rgba8(&ctx, 6, 1, &[255; 6 * 4]).expect("Sprite");
    assert_eq!(strip.mip_level_count(), 3);
}
