//! View-dependent sort keys.
//!
//! A key is `u32::MAX - round(depth * 65536)` where `depth` is the signed distance
//! along the view direction, so ascending key order is far-to-near. The fixed
//! point scale gives 1/65536 world-unit resolution. Depth is clamped to
//! `[0, MAX_FIXED_DEPTH / 65536]` before encoding: anything behind the eye maps to
//! `u32::MAX` and sorts last, anything past ~65536 units saturates at key 255.
//! Rounding is ties-to-even so the host encoding is bit-identical to the WGSL
//! `round` used by the presort kernel.

use glam::{Mat3, Mat4, Vec3};
use sort::KeyValueBuffers;

use crate::attributes::identity_indices;
use crate::context::GpuContext;
use crate::error::Result;
use crate::pipeline::DepthKeyProvider;

/// Fixed point scale applied to depth before it becomes a key.
pub const DEPTH_KEY_SCALE: f32 = 65536.0;

/// Largest f32 below 2^32; the clamp bound of the fixed point depth.
pub const MAX_FIXED_DEPTH: f32 = 4_294_967_040.0;

/// Eye position and unit forward direction in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRay {
    pub eye: Vec3,
    pub forward: Vec3,
}

impl ViewRay {
    /// Extract the ray from a camera-to-world transform looking down its local -Z.
    pub fn from_camera(camera: &Mat4) -> Self {
        Self {
            eye: camera.w_axis.truncate(),
            forward: Mat3::from_mat4(*camera) * Vec3::NEG_Z,
        }
    }

    /// Signed distance of `position` along the view direction.
    #[inline]
    pub fn depth(&self, position: Vec3) -> f32 {
        (position - self.eye).dot(self.forward)
    }
}

#[inline]
pub fn depth_key(depth: f32) -> u32 {
    let fixed = (depth.max(0.0) * DEPTH_KEY_SCALE)
        .round_ties_even()
        .min(MAX_FIXED_DEPTH);
    u32::MAX - fixed as u32
}

/// Depth keys computed on the host, one pass over a CPU copy of the positions.
///
/// This loop is the largest per-frame CPU cost of the splat path.
pub struct HostDepthKeys {
    positions: Vec<Vec3>,
    keys: Vec<u32>,
    indices: Vec<u32>,
}

impl HostDepthKeys {
    pub fn new(positions: Vec<Vec3>) -> Self {
        let n = positions.len();
        Self {
            positions,
            keys: vec![0; n],
            indices: identity_indices(n),
        }
    }

    /// Recompute keys and reset the index list to the identity.
    pub fn compute(&mut self, ray: &ViewRay) {
        for (i, (key, position)) in self.keys.iter_mut().zip(&self.positions).enumerate() {
            *key = depth_key(ray.depth(*position));
            self.indices[i] = i as u32;
        }
    }

    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl DepthKeyProvider for HostDepthKeys {
    fn len(&self) -> u32 {
        self.positions.len() as u32
    }

    fn write_keys(
        &mut self,
        ctx: &GpuContext,
        _encoder: &mut wgpu::CommandEncoder,
        ray: &ViewRay,
        buffers: &KeyValueBuffers,
    ) -> Result<()> {
        self.compute(ray);

        // Queued writes land before the encoder's commands run.
        ctx.queue.write_buffer(buffers.keys(), 0, bytemuck::cast_slice(&self.keys));
        ctx.queue.write_buffer(buffers.values(), 0, bytemuck::cast_slice(&self.indices));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argsort(keys: &[u32]) -> Vec<u32> {
        let mut inds: Vec<u32> = (0..keys.len() as u32).collect();
        inds.sort_by_key(|&i| (keys[i as usize], i));
        inds
    }

    #[test]
    fn test_ray_from_identity_camera() {
        let ray = ViewRay::from_camera(&Mat4::IDENTITY);
        assert_eq!(ray.eye, Vec3::ZERO);
        assert_eq!(ray.forward, Vec3::NEG_Z);
        assert_eq!(ray.depth(Vec3::new(3.0, 4.0, -5.0)), 5.0);
    }

    #[test]
    fn test_ray_from_translated_rotated_camera() {
        let camera = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let ray = ViewRay::from_camera(&camera);
        assert_eq!(ray.eye, Vec3::new(1.0, 2.0, 3.0));
        assert!(ray.forward.abs_diff_eq(Vec3::NEG_X, 1e-6));
    }

    #[test]
    fn test_keys_decrease_with_depth() {
        let depths = [0.0, 1e-4, 0.5, 1.0, 2.0, 100.0, 30000.0, 65000.0];
        for pair in depths.windows(2) {
            assert!(depth_key(pair[0]) > depth_key(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn test_key_resolution() {
        assert_eq!(depth_key(0.0), u32::MAX);
        assert_eq!(depth_key(1.0), u32::MAX - 65536);
        assert_eq!(depth_key(1.0 / 65536.0), u32::MAX - 1);
    }

    #[test]
    fn test_negative_and_nan_depth_sort_last() {
        assert_eq!(depth_key(-1.0), u32::MAX);
        assert_eq!(depth_key(-1e30), u32::MAX);
        assert_eq!(depth_key(f32::NAN), u32::MAX);
    }

    #[test]
    fn test_huge_depth_saturates() {
        assert_eq!(depth_key(1e9), 255);
        assert_eq!(depth_key(f32::INFINITY), 255);
    }

    #[test]
    fn test_far_to_near_order() {
        let positions = vec![
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -2.0),
        ];
        let mut host = HostDepthKeys::new(positions);
        host.compute(&ViewRay::from_camera(&Mat4::IDENTITY));
        assert_eq!(host.indices(), &[0, 1, 2]);
        assert_eq!(argsort(host.keys()), vec![1, 2, 0]);
    }

    #[test]
    fn test_moving_camera_reorders() {
        let positions = vec![
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -2.0),
        ];
        let mut host = HostDepthKeys::new(positions);

        host.compute(&ViewRay::from_camera(&Mat4::IDENTITY));
        let before = argsort(host.keys());

        // Walk past the cloud and look back along +Z.
        let camera = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0))
            * Mat4::from_rotation_y(std::f32::consts::PI);
        host.compute(&ViewRay::from_camera(&camera));
        let after = argsort(host.keys());

        assert_eq!(before, vec![1, 2, 0]);
        assert_eq!(after, vec![0, 2, 1]);
    }
}
