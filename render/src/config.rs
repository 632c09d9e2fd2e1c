use serde::{Deserialize, Serialize};

/// How each element is turned into pixels by the draw stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawTopology {
    /// Indexed point-list draw: the element buffer is the index buffer and each
    /// element rasterises as a single point.
    Points,
    /// Each element expands to a screen-facing quad. The vertex stage reads the
    /// element buffer to find which element an instance draws.
    #[default]
    Sprites,
}

/// Colour target formats the draw pipelines can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
}

impl From<ColorFormat> for wgpu::TextureFormat {
    fn from(format: ColorFormat) -> Self {
        match format {
            ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            ColorFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            ColorFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Primitive expansion used by the draw stage.
    pub topology: DrawTopology,

    /// Point sprite edge length in clip-space units before the perspective
    /// divide, so sprites shrink with distance. Only used by the point renderer.
    pub point_size: f32,

    /// Format of the colour target the renderers draw into.
    pub color_format: ColorFormat,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            topology: DrawTopology::Sprites,
            point_size: 0.02,
            color_format: ColorFormat::Rgba8Unorm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RendererConfig = serde_json::from_str(r#"{ "topology": "points" }"#).unwrap();
        assert_eq!(config.topology, DrawTopology::Points);
        assert_eq!(config.point_size, 0.02);
        assert_eq!(config.color_format, ColorFormat::Rgba8Unorm);
    }

    #[test]
    fn test_color_format_maps_to_wgpu() {
        let format: wgpu::TextureFormat = ColorFormat::Bgra8UnormSrgb.into();
        assert_eq!(format, wgpu::TextureFormat::Bgra8UnormSrgb);
    }
}
