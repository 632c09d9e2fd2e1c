use crate::context::GpuContext;
use crate::error::{RenderError, Result};

/// The RGBA8 texture point sprites are modulated with.
pub struct SpriteTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl SpriteTexture {
    /// Upload tightly packed RGBA8 pixels, rows top to bottom.
    pub fn from_rgba8(ctx: &GpuContext, width: u32, height: u32, pixels: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected || expected == 0 {
            return Err(RenderError::TextureSize { expected, actual: pixels.len() });
        }

        let levels = mip_chain(width, height, pixels.to_vec());
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sprite Texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, mip) in levels.iter().enumerate() {
            ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &mip.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * mip.width),
                    rows_per_image: Some(mip.height),
                },
                wgpu::Extent3d { width: mip.width, height: mip.height, depth_or_array_layers: 1 },
            );
        }
        tracing::debug!(width, height, mip_levels = levels.len(), "Uploaded sprite texture");

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self { texture, view, sampler })
    }

    /// A white disk whose alpha falls off smoothly towards the rim.
    pub fn soft_disk(ctx: &GpuContext, size: u32) -> Result<Self> {
        Self::from_rgba8(ctx, size, size, &soft_disk_pixels(size))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    pub fn mip_level_count(&self) -> u32 {
        self.texture.mip_level_count()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

struct MipLevel {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Full mip chain down to 1x1, each level a 2x2 box filter of the one above.
/// Odd edges reuse their last row or column.
fn mip_chain(width: u32, height: u32, pixels: Vec<u8>) -> Vec<MipLevel> {
    let mut levels = vec![MipLevel { width, height, pixels }];
    while let Some(src) = levels.last().filter(|l| l.width > 1 || l.height > 1) {
        let (w, h) = ((src.width / 2).max(1), (src.height / 2).max(1));
        let texel = |x: u32, y: u32, c: u32| {
            let (x, y) = (x.min(src.width - 1), y.min(src.height - 1));
            src.pixels[((y * src.width + x) * 4 + c) as usize] as u32
        };

        let mut pixels = Vec::with_capacity(w as usize * h as usize * 4);
        for y in 0..h {
            for x in 0..w {
                for c in 0..4 {
                    let sum = texel(2 * x, 2 * y, c)
                        + texel(2 * x + 1, 2 * y, c)
                        + texel(2 * x, 2 * y + 1, c)
                        + texel(2 * x + 1, 2 * y + 1, c);
                    pixels.push(((sum + 2) / 4) as u8);
                }
            }
        }
        levels.push(MipLevel { width: w, height: h, pixels });
    }
    levels
}

fn soft_disk_pixels(size: u32) -> Vec<u8> {
    let center = size as f32 * 0.5;
    let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 + 0.5 - center) / center;
            let dy = (y as f32 + 0.5 - center) / center;
            let r = (dx * dx + dy * dy).sqrt();
            // Smoothstep from the rim inwards.
            let t = ((1.0 - r) / 0.3).clamp(0.0, 1.0);
            let alpha = t * t * (3.0 - 2.0 * t);
            pixels.extend_from_slice(&[255, 255, 255, (alpha * 255.0).round() as u8]);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_disk_shape() {
        let size = 32;
        let px = soft_disk_pixels(size);
        assert_eq!(px.len(), 32 * 32 * 4);

        let alpha = |x: u32, y: u32| px[((y * size + x) * 4 + 3) as usize];
        assert_eq!(alpha(16, 16), 255);
        assert_eq!(alpha(0, 0), 0);
        assert!(alpha(16, 1) < alpha(16, 8));
    }

    #[test]
    fn test_mip_chain() {
        let levels = mip_chain(32, 32, soft_disk_pixels(32));
        let dims: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, [(32, 32), (16, 16), (8, 8), (4, 4), (2, 2), (1, 1)]);
        assert!(levels.iter().all(|l| l.pixels.len() == (l.width * l.height * 4) as usize));

        // Colour stays white, alpha averages towards the disk coverage.
        let last = &levels[5].pixels;
        assert_eq!(&last[..3], &[255, 255, 255]);
        assert!(last[3] > 0 && last[3] < 255);
    }

    #[test]
    fn test_mip_chain_odd_sizes() {
        let pixels: Vec<u8> = (0..5 * 3).flat_map(|i| [i as u8, 0, 0, 255]).collect();
        let levels = mip_chain(5, 3, pixels);
        let dims: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, [(5, 3), (2, 1), (1, 1)]);
        // Texels 0, 1, 5 and 6 of the top level.
        assert_eq!(levels[1].pixels[0], 3);
        assert_eq!(levels[1].pixels[3], 255);
    }
}
