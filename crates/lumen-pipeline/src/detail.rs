//! Detail: clarity, texture, dehaze and sharpening.
//!
//! Clarity and texture are unsharp-style local contrast boosts on the
//! value plane at a coarse and a fine radius. Dehaze scales value and
//! saturation together. Sharpening runs last, on the RGB buffer after the
//! final HSV-to-RGB conversion.

use rayon::prelude::*;

use crate::blur;
use crate::color::{CHANNEL_MAX, HsvPlanes, clamp_plane};
use crate::params::{Parameter, ParameterSet};
use crate::types::{Plane, Rgb32FImage};

/// Low-pass sigma for clarity.
pub const CLARITY_SIGMA: f32 = 10.0;
/// Low-pass sigma for texture.
pub const TEXTURE_SIGMA: f32 = 2.0;
/// Texture runs at half the strength of clarity.
pub const TEXTURE_STRENGTH: f32 = 0.5;

/// Unsharp mask radius used for sharpening.
pub const SHARPEN_SIGMA: f32 = 2.0;
/// Differences below this many levels are left unsharpened.
pub const SHARPEN_THRESHOLD: f32 = 3.0;
/// Upper end of the sharpness parameter.
pub const MAX_SHARPNESS: f32 = 150.0;

/// Clarity, texture and dehaze on the HSV planes.
///
/// Returns whether anything was applied.
pub fn apply_hsv(hsv: &mut HsvPlanes, params: &ParameterSet) -> bool {
    let clarity = params.fraction(Parameter::Clarity);
    let texture = params.fraction(Parameter::Texture);
    let dehaze = params.fraction(Parameter::Dehaze);
    let mut applied = false;

    if clarity != 0.0 {
        local_contrast(&mut hsv.value, CLARITY_SIGMA, clarity);
        applied = true;
    }

    if texture != 0.0 {
        local_contrast(&mut hsv.value, TEXTURE_SIGMA, texture * TEXTURE_STRENGTH);
        applied = true;
    }

    if dehaze != 0.0 {
        apply_dehaze(hsv, dehaze);
        applied = true;
    }

    applied
}

/// `V *= 1 + 0.3 * dehaze`, `S *= 1 + 0.2 * dehaze`, both clamped.
pub fn apply_dehaze(hsv: &mut HsvPlanes, dehaze: f32) {
    let value_gain = dehaze.mul_add(0.3, 1.0);
    let sat_gain = dehaze.mul_add(0.2, 1.0);
    let value: &mut [f32] = &mut hsv.value;
    value.par_iter_mut().for_each(|v| *v *= value_gain);
    let sat: &mut [f32] = &mut hsv.saturation;
    sat.par_iter_mut().for_each(|s| *s *= sat_gain);
    clamp_plane(&mut hsv.value, CHANNEL_MAX);
    clamp_plane(&mut hsv.saturation, CHANNEL_MAX);
}

/// `v += (v - blur(v)) * amount`, clamped.
pub fn local_contrast(value: &mut Plane, sigma: f32, amount: f32) {
    let low = blur::gaussian_blur(value, sigma);
    let low: &[f32] = &low;
    let samples: &mut [f32] = value;
    samples
        .par_iter_mut()
        .zip(low.par_iter())
        .for_each(|(v, &l)| {
            *v = (*v - l).mul_add(amount, *v).clamp(0.0, CHANNEL_MAX);
        });
}

/// Unsharp-mask the RGB buffer.
///
/// Strength is `sharpness / 100`, with the parameter clamped to
/// `[0, 150]`. A sample is only sharpened when it differs from its
/// blurred neighborhood by at least [`SHARPEN_THRESHOLD`] levels, which
/// keeps flat areas and noise untouched. Returns whether anything was
/// applied.
pub fn sharpen(rgb: &mut Rgb32FImage, params: &ParameterSet) -> bool {
    let amount = params.get(Parameter::Sharpness).clamp(0.0, MAX_SHARPNESS) / 100.0;
    if amount == 0.0 {
        return false;
    }
    unsharp(rgb, amount);
    true
}

/// Thresholded unsharp mask with strength `amount`.
pub fn unsharp(rgb: &mut Rgb32FImage, amount: f32) {
    let low = blur::gaussian_blur_rgb(rgb, SHARPEN_SIGMA);
    let low: &[f32] = &low;
    let samples: &mut [f32] = rgb;
    samples
        .par_iter_mut()
        .zip(low.par_iter())
        .for_each(|(x, &l)| {
            let diff = *x - l;
            if diff.abs() >= SHARPEN_THRESHOLD {
                *x = diff.mul_add(amount, *x).clamp(0.0, CHANNEL_MAX);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_value() -> HsvPlanes {
        HsvPlanes {
            hue: Plane::new(24, 8),
            saturation: Plane::from_pixel(24, 8, image::Luma([100.0])),
            value: Plane::from_fn(24, 8, |x, _| image::Luma([if x < 12 { 80.0 } else { 160.0 }])),
        }
    }

    #[test]
    fn zero_detail_is_a_no_op() {
        let mut hsv = edge_value();
        let before = hsv.clone();
        assert!(!apply_hsv(&mut hsv, &ParameterSet::new()));
        assert_eq!(hsv, before);
    }

    #[test]
    fn clarity_steepens_edges() {
        let mut hsv = edge_value();
        assert!(apply_hsv(&mut hsv, &ParameterSet::new().with(Parameter::Clarity, 100.0)));
        let dark = hsv.value.get_pixel(11, 4).0[0];
        let bright = hsv.value.get_pixel(12, 4).0[0];
        assert!(dark < 80.0, "dark side should darken, got {dark}");
        assert!(bright > 160.0, "bright side should brighten, got {bright}");
    }

    #[test]
    fn negative_texture_softens_edges() {
        let mut hsv = edge_value();
        apply_hsv(&mut hsv, &ParameterSet::new().with(Parameter::Texture, -100.0));
        let dark = hsv.value.get_pixel(11, 4).0[0];
        let bright = hsv.value.get_pixel(12, 4).0[0];
        assert!(dark > 80.0, "got {dark}");
        assert!(bright < 160.0, "got {bright}");
    }

    #[test]
    fn local_contrast_leaves_flat_areas_alone() {
        let mut hsv = HsvPlanes {
            hue: Plane::new(10, 10),
            saturation: Plane::new(10, 10),
            value: Plane::from_pixel(10, 10, image::Luma([90.0])),
        };
        apply_hsv(
            &mut hsv,
            &ParameterSet::new()
                .with(Parameter::Clarity, 100.0)
                .with(Parameter::Texture, 100.0),
        );
        for &v in hsv.value.as_raw() {
            assert!((v - 90.0).abs() < 0.01, "got {v}");
        }
    }

    #[test]
    fn dehaze_scales_value_and_saturation() {
        let mut hsv = edge_value();
        apply_hsv(&mut hsv, &ParameterSet::new().with(Parameter::Dehaze, 50.0));
        assert!((hsv.value.get_pixel(0, 0).0[0] - 92.0).abs() < 1e-3);
        assert!((hsv.saturation.get_pixel(0, 0).0[0] - 110.0).abs() < 1e-3);
    }

    #[test]
    fn extreme_detail_stays_in_range() {
        let mut hsv = edge_value();
        hsv.value = Plane::from_fn(24, 8, |x, _| image::Luma([if x % 2 == 0 { 0.0 } else { 255.0 }]));
        apply_hsv(
            &mut hsv,
            &ParameterSet::new()
                .with(Parameter::Clarity, 100.0)
                .with(Parameter::Texture, 100.0)
                .with(Parameter::Dehaze, 100.0),
        );
        for &v in hsv.value.as_raw() {
            assert!((0.0..=CHANNEL_MAX).contains(&v), "value {v}");
        }
    }

    #[test]
    fn zero_sharpness_is_skipped() {
        #[allow(clippy::cast_precision_loss)]
        let mut rgb = Rgb32FImage::from_fn(8, 8, |x, _| image::Rgb([(x * 30) as f32; 3]));
        let before = rgb.clone();
        assert!(!sharpen(&mut rgb, &ParameterSet::new().with(Parameter::Sharpness, 0.0)));
        assert_eq!(rgb, before);
    }

    #[test]
    fn default_sharpness_applies() {
        let mut rgb = Rgb32FImage::from_fn(16, 4, |x, _| {
            image::Rgb([if x < 8 { 60.0 } else { 190.0 }; 3])
        });
        assert!(sharpen(&mut rgb, &ParameterSet::new()));
        assert!(rgb.get_pixel(7, 2).0[0] < 60.0);
        assert!(rgb.get_pixel(8, 2).0[0] > 190.0);
    }

    #[test]
    fn sharpening_ignores_small_differences() {
        // A two-level ripple never reaches the threshold.
        let mut rgb = Rgb32FImage::from_fn(16, 4, |x, _| {
            image::Rgb([if x % 2 == 0 { 100.0 } else { 102.0 }; 3])
        });
        let before = rgb.clone();
        sharpen(&mut rgb, &ParameterSet::new().with(Parameter::Sharpness, 150.0));
        assert_eq!(rgb, before);
    }

    #[test]
    fn sharpening_stays_in_range() {
        let mut rgb = Rgb32FImage::from_fn(16, 16, |x, y| {
            image::Rgb([if (x + y) % 2 == 0 { 0.0 } else { 255.0 }; 3])
        });
        sharpen(&mut rgb, &ParameterSet::new().with(Parameter::Sharpness, 1000.0));
        for &s in rgb.as_raw() {
            assert!((0.0..=CHANNEL_MAX).contains(&s), "sample {s}");
        }
    }
}
