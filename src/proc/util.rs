// Small numeric helpers shared by the DSP and controller layers.

use std::f32::consts::PI;

pub const TWO_PI: f32 = 2.0 * PI;

/// Wrap an angle into the [0, 2*pi) range.
/// For example, 3*pi -> pi and -pi/2 -> 3*pi/2.
pub fn wrap_angle(mut angle: f32) -> f32 {
    while angle < 0.0 {
        angle += TWO_PI;
    }
    while angle >= TWO_PI {
        angle -= TWO_PI;
    }
    angle
}

/// Root-mean-square value of a slice. Returns 0 for an empty slice.
pub fn rms(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = data.iter().map(|&x| x * x).sum();
    (sum_squares / data.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_angle_identity_in_range() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert_eq!(wrap_angle(1.0), 1.0);
    }

    #[test]
    fn test_wrap_angle_negative() {
        let wrapped = wrap_angle(-PI / 2.0);
        assert!((wrapped - 3.0 * PI / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrap_angle_above_range() {
        let wrapped = wrap_angle(3.0 * PI);
        assert!((wrapped - PI).abs() < 1e-5);
    }

    #[test]
    fn test_wrap_angle_two_pi_maps_to_zero() {
        assert!(wrap_angle(TWO_PI) < 1e-6);
    }

    #[test]
    fn test_rms_constant_signal() {
        let data = vec![0.5_f32; 64];
        assert!((rms(&data) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rms_empty() {
        assert_eq!(rms(&[]), 0.0);
    }
}
