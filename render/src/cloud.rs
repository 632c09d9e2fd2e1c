use glam::{Mat3, Quat, Vec3};

/// An anisotropic Gaussian as delivered by the asset layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub position: Vec3,
    /// Opacity logit, mapped through a sigmoid to get alpha.
    pub opacity: f32,
    /// DC spherical-harmonics coefficients per colour channel.
    pub f_dc: Vec3,
    /// World-space covariance. Trusted to be symmetric positive semi-definite.
    pub covariance: Mat3,
}

impl Splat {
    /// Build a splat whose covariance is `R S Sᵀ Rᵀ`, with `S = diag(exp(log_scale))`.
    pub fn from_scale_rotation(
        position: Vec3,
        opacity: f32,
        f_dc: Vec3,
        log_scale: Vec3,
        rotation: Quat,
    ) -> Self {
        let m = Mat3::from_quat(rotation.normalize()) * Mat3::from_diagonal(log_scale.exp());
        Self {
            position,
            opacity,
            f_dc,
            covariance: m * m.transpose(),
        }
    }
}

/// A coloured point sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSample {
    pub position: [f32; 3],
    pub color: [u8; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_covariance() {
        let splat = Splat::from_scale_rotation(
            Vec3::ZERO,
            0.0,
            Vec3::ZERO,
            glam::vec3(0.0, 1.0, 2.0_f32.ln()),
            Quat::IDENTITY,
        );
        let expected = Mat3::from_diagonal(glam::vec3(1.0, std::f32::consts::E.powi(2), 4.0));
        assert!(splat.covariance.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn test_rotated_covariance_is_symmetric() {
        let rotation = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.1, 2.0);
        let splat = Splat::from_scale_rotation(
            Vec3::ONE,
            1.0,
            Vec3::ZERO,
            glam::vec3(-1.0, 0.5, 0.2),
            rotation,
        );
        let cov = splat.covariance;
        assert!(cov.abs_diff_eq(cov.transpose(), 1e-5));
        assert!(cov.determinant() > 0.0);
    }

    #[test]
    fn test_point_sample_compares_by_value() {
        let a = PointSample { position: [0.5, -1.0, 2.0], color: [10, 20, 30] };
        let mut b = a;
        assert_eq!(a, b);
        b.position[2] = f32::NAN;
        assert_ne!(a, b);
    }
}
