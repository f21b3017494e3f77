//! Global color: exposure, white balance, contrast, saturation, vibrance.
//!
//! [`apply_rgb`] runs exposure, temperature and tint on the RGB working
//! buffer before the first HSV conversion. [`apply_hsv`] runs contrast,
//! saturation and vibrance on the shared HSV planes. Each step is skipped
//! when its parameter is zero and clamps the channels it writes.

use rayon::prelude::*;

use crate::color::{CHANNEL_MAX, HsvPlanes, clamp_plane};
use crate::params::{Parameter, ParameterSet};
use crate::types::{Plane, Rgb32FImage};

/// Exposure is clamped to this many stops either way.
pub const MAX_EXPOSURE_STOPS: f32 = 10.0;

/// Per-channel `[r, g, b]` gains applied by white balance, or `None`
/// when temperature and tint are both zero.
///
/// Warm temperature lifts red and green and cuts blue, cool does the
/// reverse with slightly different weights. Positive tint lifts green;
/// negative tint scales red and blue by `1 - tint * 0.12`.
#[must_use]
pub fn white_balance_gains(temperature: f32, tint: f32) -> Option<[f32; 3]> {
    if temperature == 0.0 && tint == 0.0 {
        return None;
    }

    let t = temperature;
    let mut gains = if t > 0.0 {
        [t.mul_add(0.2, 1.0), t.mul_add(0.1, 1.0), t.mul_add(-0.15, 1.0)]
    } else {
        [t.mul_add(0.15, 1.0), t.mul_add(0.08, 1.0), t.mul_add(-0.2, 1.0)]
    };

    if tint > 0.0 {
        gains[1] *= tint.mul_add(0.15, 1.0);
    } else if tint < 0.0 {
        let rb = tint.mul_add(-0.12, 1.0);
        gains[0] *= rb;
        gains[2] *= rb;
    }

    // Strong cool/warm shifts can push a gain negative; a channel never
    // goes below black.
    Some(gains.map(|g| g.max(0.0)))
}

/// Exposure, temperature and tint on the RGB buffer.
///
/// Returns whether anything was applied.
pub fn apply_rgb(rgb: &mut Rgb32FImage, params: &ParameterSet) -> bool {
    let stops = params
        .get(Parameter::Exposure)
        .clamp(-MAX_EXPOSURE_STOPS, MAX_EXPOSURE_STOPS);
    let exposure = (stops != 0.0).then(|| stops.exp2());
    let balance = white_balance_gains(
        params.fraction(Parameter::Temperature),
        params.fraction(Parameter::Tint),
    );

    if exposure.is_none() && balance.is_none() {
        return false;
    }

    expose(rgb, exposure.unwrap_or(1.0), balance.unwrap_or([1.0; 3]));
    true
}

/// Multiply every sample by `factor`, clip, then apply per-channel `gains`.
pub fn expose(rgb: &mut Rgb32FImage, factor: f32, gains: [f32; 3]) {
    rgb.par_chunks_exact_mut(3).for_each(|px| {
        for (sample, gain) in px.iter_mut().zip(gains) {
            // Exposure clips before white balance reads the channel.
            let exposed = (*sample * factor).clamp(0.0, CHANNEL_MAX);
            *sample = (exposed * gain).clamp(0.0, CHANNEL_MAX);
        }
    });
}

/// Contrast, saturation and vibrance on the HSV planes.
///
/// Returns whether anything was applied.
pub fn apply_hsv(hsv: &mut HsvPlanes, params: &ParameterSet) -> bool {
    let contrast = params.fraction(Parameter::Contrast);
    let saturation = params.fraction(Parameter::Saturation);
    let vibrance = params.fraction(Parameter::Vibrance);
    let mut applied = false;

    if contrast != 0.0 {
        apply_contrast(&mut hsv.value, contrast);
        applied = true;
    }

    if saturation != 0.0 {
        apply_saturation(&mut hsv.saturation, saturation);
        applied = true;
    }

    if vibrance != 0.0 {
        apply_vibrance(&mut hsv.saturation, vibrance);
        applied = true;
    }

    applied
}

/// Affine remap of value around mid-gray with slope `1 + contrast`.
pub fn apply_contrast(value: &mut Plane, contrast: f32) {
    let slope = (1.0 + contrast).max(0.0);
    let samples: &mut [f32] = value;
    samples.par_iter_mut().for_each(|v| {
        let centered = (*v / CHANNEL_MAX - 0.5).mul_add(slope, 0.5);
        *v = (centered * CHANNEL_MAX).clamp(0.0, CHANNEL_MAX);
    });
}

/// `S *= 1 + saturation`, clamped.
pub fn apply_saturation(saturation: &mut Plane, amount: f32) {
    let factor = 1.0 + amount;
    let samples: &mut [f32] = saturation;
    samples.par_iter_mut().for_each(|s| *s *= factor);
    clamp_plane(saturation, CHANNEL_MAX);
}

/// Saturation boost that shrinks as a pixel approaches full saturation.
pub fn apply_vibrance(saturation: &mut Plane, vibrance: f32) {
    let boost = vibrance * 100.0;
    let samples: &mut [f32] = saturation;
    samples.par_iter_mut().for_each(|s| {
        *s = boost
            .mul_add(1.0 - *s / CHANNEL_MAX, *s)
            .clamp(0.0, CHANNEL_MAX);
    });
}
