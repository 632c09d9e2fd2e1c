//! Back-to-front rendering of large splat and point clouds.
//!
//! Every frame each renderer derives a depth key per element from the current
//! viewpoint, sorts (key, index) pairs on the GPU, copies the sorted indices into
//! its element buffer and draws in that order, so alpha blending composes far to
//! near without a depth test.

pub mod attributes;
pub mod buffers;
pub mod cloud;
pub mod config;
pub mod context;
pub mod depth;
pub mod frame;
pub mod pipeline;
pub mod point_renderer;
pub mod presort;
pub mod program;
pub mod sh;
pub mod splat_renderer;
pub mod texture;

mod error;

pub use cloud::{PointSample, Splat};
pub use config::{ColorFormat, DrawTopology, RendererConfig};
pub use context::GpuContext;
pub use error::RenderError;
pub use frame::{FrameParams, FrameStats};
pub use point_renderer::PointRenderer;
pub use splat_renderer::GaussianSplatRenderer;
pub use texture::SpriteTexture;
