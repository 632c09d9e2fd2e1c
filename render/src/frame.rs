//! Per-frame camera parameters and the uniform blocks derived from them.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::depth::ViewRay;

/// Camera state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    /// Camera-to-world transform. The camera looks down its local -Z.
    pub camera: Mat4,
    /// `(x, y, width, height)` in pixels.
    pub viewport: Vec4,
    pub near_far: Vec2,
    /// Vertical field of view in radians.
    pub fovy: f32,
}

impl FrameParams {
    pub fn look_at(eye: Vec3, target: Vec3, width: u32, height: u32, fovy: f32) -> Self {
        Self {
            camera: Mat4::look_at_rh(eye, target, Vec3::Y).inverse(),
            viewport: Vec4::new(0.0, 0.0, width as f32, height as f32),
            near_far: Vec2::new(0.1, 1000.0),
            fovy,
        }
    }

    pub fn view(&self) -> Mat4 {
        self.camera.inverse()
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.z / self.viewport.w
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect(), self.near_far.x, self.near_far.y)
    }

    /// `(height / tan(fovy / 2), near, far, 0)`.
    pub fn proj_params(&self) -> Vec4 {
        Vec4::new(
            self.viewport.w / (self.fovy * 0.5).tan(),
            self.near_far.x,
            self.near_far.y,
            0.0,
        )
    }

    pub fn view_ray(&self) -> ViewRay {
        ViewRay::from_camera(&self.camera)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SplatUniforms {
    pub view: Mat4,
    pub proj: Mat4,
    pub proj_params: Vec4,
    pub viewport: Vec4,
}

impl SplatUniforms {
    pub fn new(frame: &FrameParams) -> Self {
        Self {
            view: frame.view(),
            proj: frame.projection(),
            proj_params: frame.proj_params(),
            viewport: frame.viewport,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointUniforms {
    pub model_view: Mat4,
    pub proj: Mat4,
    pub point_size: f32,
    pub inv_aspect: f32,
    pub _pad: [f32; 2],
}

impl PointUniforms {
    pub fn new(frame: &FrameParams, point_size: f32) -> Self {
        Self {
            model_view: frame.view(),
            proj: frame.projection(),
            point_size,
            inv_aspect: 1.0 / frame.aspect(),
            _pad: [0.0; 2],
        }
    }
}

/// What a single `render` call recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub elements: u32,
    pub draw_calls: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layouts() {
        assert_eq!(std::mem::size_of::<SplatUniforms>(), 160);
        assert_eq!(std::mem::size_of::<PointUniforms>(), 144);
    }

    #[test]
    fn test_look_at_ray() {
        let frame = FrameParams::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 640, 480, 1.0);
        let ray = frame.view_ray();
        assert!(ray.eye.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
        assert!(ray.forward.abs_diff_eq(Vec3::NEG_Z, 1e-5));
        assert!((ray.depth(Vec3::ZERO) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_proj_params() {
        let fovy = std::f32::consts::FRAC_PI_2;
        let frame = FrameParams::look_at(Vec3::Z, Vec3::ZERO, 800, 600, fovy);
        let p = frame.proj_params();
        assert!((p.x - 600.0).abs() < 1e-3);
        assert_eq!(p.y, 0.1);
        assert_eq!(p.z, 1000.0);
        assert!((PointUniforms::new(&frame, 0.02).inv_aspect - 0.75).abs() < 1e-6);
    }
}
