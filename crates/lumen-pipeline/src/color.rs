//! RGB <-> HSV conversion on float rasters.
//!
//! Uses the 8-bit HSV layout popularised by OpenCV: hue on a 0-180
//! half-circle scale (2 degrees per unit), saturation and value on 0-255.
//! Samples stay `f32` throughout so a convert-and-back round trip only
//! carries floating-point error, not 8-bit quantization.

use rayon::prelude::*;

use crate::types::{Plane, Rgb32FImage};

/// Upper end of the hue scale. Hue 180 and hue 0 are the same color.
pub const HUE_MAX: f32 = 180.0;

/// Upper end of the saturation and value scales.
pub const CHANNEL_MAX: f32 = 255.0;

/// Convert one RGB sample (each 0-255) to `[h, s, v]`.
#[must_use]
pub fn rgb_to_hsv([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { CHANNEL_MAX * delta / max } else { 0.0 };

    if delta <= 0.0 {
        return [0.0, s, max];
    }

    #[allow(clippy::float_cmp)]
    let degrees = if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        60.0f32.mul_add((b - r) / delta, 120.0)
    } else {
        60.0f32.mul_add((r - g) / delta, 240.0)
    };
    let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };

    [degrees / 2.0, s, max]
}

/// Convert one `[h, s, v]` sample back to RGB (each 0-255).
///
/// Hue is taken modulo 180; saturation and value are clamped first.
#[must_use]
pub fn hsv_to_rgb([h, s, v]: [f32; 3]) -> [f32; 3] {
    let s = (s / CHANNEL_MAX).clamp(0.0, 1.0);
    let v = v.clamp(0.0, CHANNEL_MAX);
    if s <= 0.0 {
        return [v, v, v];
    }

    let sector_pos = (h * 2.0).rem_euclid(360.0) / 60.0;
    let sector = sector_pos.floor();
    let f = sector_pos - sector;
    let p = v * (1.0 - s);
    let q = v * s.mul_add(-f, 1.0);
    let t = v * s.mul_add(f - 1.0, 1.0);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sector = sector as u32;
    match sector {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Hue, saturation and value split into separate planes.
///
/// This is the transient HSV representation shared by every HSV-space
/// stage of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct HsvPlanes {
    /// Hue, 0-180.
    pub hue: Plane,
    /// Saturation, 0-255.
    pub saturation: Plane,
    /// Value, 0-255.
    pub value: Plane,
}

impl HsvPlanes {
    /// Split an RGB working buffer into HSV planes.
    #[must_use]
    pub fn from_rgb(rgb: &Rgb32FImage) -> Self {
        let (width, height) = rgb.dimensions();
        let mut hue = Plane::new(width, height);
        let mut saturation = Plane::new(width, height);
        let mut value = Plane::new(width, height);

        let h_out: &mut [f32] = &mut hue;
        let s_out: &mut [f32] = &mut saturation;
        let v_out: &mut [f32] = &mut value;
        h_out
            .par_iter_mut()
            .zip(s_out.par_iter_mut())
            .zip(v_out.par_iter_mut())
            .zip(rgb.par_chunks_exact(3))
            .for_each(|(((h, s), v), px)| {
                let [hh, ss, vv] = rgb_to_hsv([px[0], px[1], px[2]]);
                *h = hh;
                *s = ss;
                *v = vv;
            });

        Self {
            hue,
            saturation,
            value,
        }
    }

    /// Merge the planes back into an RGB working buffer.
    #[must_use]
    pub fn to_rgb(&self) -> Rgb32FImage {
        let (width, height) = self.hue.dimensions();
        let mut rgb = Rgb32FImage::new(width, height);

        let h_in: &[f32] = &self.hue;
        let s_in: &[f32] = &self.saturation;
        let v_in: &[f32] = &self.value;
        rgb.par_chunks_exact_mut(3)
            .zip(h_in.par_iter())
            .zip(s_in.par_iter())
            .zip(v_in.par_iter())
            .for_each(|(((px, &h), &s), &v)| {
                px.copy_from_slice(&hsv_to_rgb([h, s, v]));
            });

        rgb
    }

    /// Width and height of the planes.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.hue.dimensions()
    }
}

/// Clamp every sample of `plane` into `[0, max]`.
pub fn clamp_plane(plane: &mut Plane, max: f32) {
    let samples: &mut [f32] = plane;
    samples.par_iter_mut().for_each(|x| *x = x.clamp(0.0, max));
}
