//! Host-side conversion of clouds into parallel per-element attribute arrays.

use glam::{Vec3, Vec4};

use crate::cloud::{PointSample, Splat};
use crate::sh::sh_dc_to_rgb;

/// Largest `f32` below one.
const MAX_ALPHA: f32 = 1.0 - f32::EPSILON / 2.0;

/// Logistic function, kept inside the open interval `(0, 1)`. In `f32` the plain
/// formula reaches 1.0 from a logit of about 17 and 0.0 below about -104.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    (1.0 / (1.0 + (-x).exp())).clamp(f32::MIN_POSITIVE, MAX_ALPHA)
}

/// The identity permutation `[0, n)`.
///
/// # Panics
/// If `n` does not fit the 32-bit index space.
pub fn identity_indices(n: usize) -> Vec<u32> {
    assert!(
        n <= u32::MAX as usize,
        "{n} elements exceed the 32-bit index space"
    );
    (0..n as u32).collect()
}

/// Vertex attributes of a Gaussian splat cloud, one entry per splat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplatAttributes {
    pub positions: Vec<Vec3>,
    /// Base colour from the DC term, alpha from the opacity logit.
    pub colors: Vec<Vec4>,
    pub cov3_col0: Vec<Vec3>,
    pub cov3_col1: Vec<Vec3>,
    pub cov3_col2: Vec<Vec3>,
}

impl SplatAttributes {
    pub fn build(splats: &[Splat]) -> Self {
        let n = splats.len();
        let mut out = Self {
            positions: Vec::with_capacity(n),
            colors: Vec::with_capacity(n),
            cov3_col0: Vec::with_capacity(n),
            cov3_col1: Vec::with_capacity(n),
            cov3_col2: Vec::with_capacity(n),
        };

        for splat in splats {
            out.positions.push(splat.position);
            out.colors.push(sh_dc_to_rgb(splat.f_dc).extend(sigmoid(splat.opacity)));
            out.cov3_col0.push(splat.covariance.x_axis);
            out.cov3_col1.push(splat.covariance.y_axis);
            out.cov3_col2.push(splat.covariance.z_axis);
        }

        out
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Vertex attributes of a point cloud: homogeneous positions and normalised colours.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointAttributes {
    pub positions: Vec<Vec4>,
    pub colors: Vec<Vec4>,
}

impl PointAttributes {
    pub fn build(points: &[PointSample]) -> Self {
        let (positions, colors) = points
            .iter()
            .map(|p| {
                let [r, g, b] = p.color.map(|c| c as f32 / 255.0);
                (Vec3::from(p.position).extend(1.0), Vec4::new(r, g, b, 1.0))
            })
            .unzip();

        Self { positions, colors }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
