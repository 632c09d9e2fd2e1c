use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use glam::{EulerRot, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use render::sh::rgb_to_sh;
use render::{
    DrawTopology, FrameParams, GaussianSplatRenderer, GpuContext, PointRenderer, PointSample,
    RendererConfig, Splat, SpriteTexture,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Render synthetic splat and point clouds off-screen and report per-frame stats.
#[derive(Parser)]
struct Args {
    /// Number of Gaussian splats
    #[arg(long, default_value_t = 100_000)]
    splats: u32,

    /// Number of point samples
    #[arg(long, default_value_t = 100_000)]
    points: u32,

    /// Frames to render while orbiting the clouds
    #[arg(short, long, default_value_t = 60)]
    frames: u32,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// JSON renderer config, missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PNG used as the point sprite instead of the built-in soft disk
    #[arg(long)]
    sprite: Option<PathBuf>,

    /// Draw single-pixel points instead of sprites
    #[arg(long)]
    draw_points: bool,

    /// Override the configured point sprite size
    #[arg(long)]
    point_size: Option<f32>,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RendererConfig> {
    let Some(path) = path else {
        return Ok(RendererConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid renderer config {}", path.display()))
}

fn load_sprite(ctx: &GpuContext, path: Option<&Path>) -> anyhow::Result<SpriteTexture> {
    let Some(path) = path else {
        return Ok(SpriteTexture::soft_disk(ctx, 64)?);
    };
    let img = image::open(path)
        .with_context(|| format!("Failed to load sprite {}", path.display()))?
        .to_rgba8();
    Ok(SpriteTexture::from_rgba8(ctx, img.width(), img.height(), img.as_raw())?)
}

fn random_splats(rng: &mut impl Rng, n: u32) -> Vec<Splat> {
    (0..n)
        .map(|_| {
            let position = random_in_ball(rng, 2.0);
            let rgb = Vec3::new(rng.random(), rng.random(), rng.random());
            let log_scale = Vec3::new(
                rng.random_range(-4.5..-2.5),
                rng.random_range(-4.5..-2.5),
                rng.random_range(-4.5..-2.5),
            );
            let rotation = Quat::from_euler(
                EulerRot::XYZ,
                rng.random_range(0.0..std::f32::consts::TAU),
                rng.random_range(0.0..std::f32::consts::TAU),
                rng.random_range(0.0..std::f32::consts::TAU),
            );
            let opacity = rng.random_range(-2.0..4.0);
            Splat::from_scale_rotation(position, opacity, rgb_to_sh(rgb), log_scale, rotation)
        })
        .collect()
}

fn random_points(rng: &mut impl Rng, n: u32) -> Vec<PointSample> {
    (0..n)
        .map(|_| PointSample {
            position: random_in_ball(rng, 3.0).to_array(),
            color: rng.random(),
        })
        .collect()
}

fn random_in_ball(rng: &mut impl Rng, radius: f32) -> Vec3 {
    loop {
        let p = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        if p.length_squared() <= 1.0 {
            return p * radius;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if args.draw_points {
        config.topology = DrawTopology::Points;
    }
    if let Some(point_size) = args.point_size {
        config.point_size = point_size;
    }

    let ctx = GpuContext::headless().await?;
    let sprite = load_sprite(&ctx, args.sprite.as_deref())?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let splats = random_splats(&mut rng, args.splats);
    let points = random_points(&mut rng, args.points);

    let mut splat_renderer = GaussianSplatRenderer::new(&ctx, &splats, &config).await?;
    let mut point_renderer = PointRenderer::new(&ctx, &points, &sprite, &config).await?;

    let target = ctx
        .device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width: args.width,
                height: args.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.color_format.into(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default());

    info!(
        splats = args.splats,
        points = args.points,
        frames = args.frames,
        width = args.width,
        height = args.height,
        "Rendering"
    );

    let start = Instant::now();
    for frame_idx in 0..args.frames {
        let frame_start = Instant::now();

        let angle = frame_idx as f32 / args.frames.max(1) as f32 * std::f32::consts::TAU;
        let eye = Vec3::new(6.0 * angle.sin(), 1.5, 6.0 * angle.cos());
        let frame = FrameParams::look_at(eye, Vec3::ZERO, args.width, args.height, 0.8);

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let splat_stats = splat_renderer.render(&ctx, &mut encoder, &target, &frame)?;
        let point_stats = point_renderer.render(&ctx, &mut encoder, &target, &frame)?;
        ctx.queue.submit(Some(encoder.finish()));
        ctx.device.poll(wgpu::PollType::Wait)?;

        info!(
            frame = frame_idx,
            splat_draws = splat_stats.draw_calls,
            point_draws = point_stats.draw_calls,
            elements = splat_stats.elements + point_stats.elements,
            ms = frame_start.elapsed().as_secs_f64() * 1000.0,
            "Frame done"
        );
    }

    let total = start.elapsed();
    info!(
        total_ms = total.as_secs_f64() * 1000.0,
        avg_ms = total.as_secs_f64() * 1000.0 / args.frames.max(1) as f64,
        "Finished"
    );

    Ok(())
}
