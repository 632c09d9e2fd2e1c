use glam::Vec3;

/// Normalisation constant of the zeroth-order spherical harmonic.
pub const SH_C0: f32 = 0.282_094_79;

/// Base colour encoded by the DC spherical-harmonics coefficients.
pub fn sh_dc_to_rgb(dc: Vec3) -> Vec3 {
    Vec3::splat(0.5) + SH_C0 * dc
}

pub fn channel_to_sh(rgb: f32) -> f32 {
    (rgb - 0.5) / SH_C0
}

pub fn rgb_to_sh(rgb: Vec3) -> Vec3 {
    glam::vec3(
        channel_to_sh(rgb.x),
        channel_to_sh(rgb.y),
        channel_to_sh(rgb.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dc_is_mid_grey() {
        assert_eq!(sh_dc_to_rgb(Vec3::ZERO), Vec3::splat(0.5));
    }

    #[test]
    fn test_rgb_sh_inverse() {
        let rgb = glam::vec3(0.1, 0.5, 0.9);
        assert!(sh_dc_to_rgb(rgb_to_sh(rgb)).abs_diff_eq(rgb, 1e-6));
    }
}
