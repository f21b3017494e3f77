//! Primary calibration.
//!
//! Rotates and scales the hue and saturation of coarse red, green and
//! blue hue windows. Windows are hard-edged and wider than the selective
//! color bands; they approximate how a sensor's primaries render rather
//! than perceptual color names.
//!
//! All three windows are selected from the hue plane as it was when the
//! stage started, so a red hue rotation cannot pull pixels into the
//! green window within the same run.

use std::ops::RangeInclusive;

use rayon::prelude::*;

use crate::color::{CHANNEL_MAX, HUE_MAX, HsvPlanes};
use crate::params::{CalibrationChannel, Parameter, ParameterSet, Primary};

/// Hue units rotated per unit of `cal_<primary>_hue`.
pub const HUE_STRENGTH: f32 = 0.5;

const GREEN_WINDOW: RangeInclusive<f32> = 36.0..=85.0;
const BLUE_WINDOW: RangeInclusive<f32> = 111.0..=140.0;

/// Whether `hue` lies in the calibration window of `primary`.
#[must_use]
pub fn in_window(primary: Primary, hue: f32) -> bool {
    match primary {
        Primary::Red => !(10.0..=170.0).contains(&hue),
        Primary::Green => GREEN_WINDOW.contains(&hue),
        Primary::Blue => BLUE_WINDOW.contains(&hue),
    }
}

/// Apply the calibration for every primary with a non-zero parameter.
///
/// Returns whether anything was applied.
pub fn apply(hsv: &mut HsvPlanes, params: &ParameterSet) -> bool {
    let active: Vec<(Primary, f32, f32)> = Primary::ALL
        .into_iter()
        .map(|primary| {
            (
                primary,
                params.get(Parameter::Calibration(primary, CalibrationChannel::Hue)),
                params.get(Parameter::Calibration(primary, CalibrationChannel::Saturation)),
            )
        })
        .filter(|&(_, hue, sat)| hue != 0.0 || sat != 0.0)
        .collect();

    if active.is_empty() {
        return false;
    }
    calibrate(hsv, &active);
    true
}

/// Rotate and scale hue and saturation for each `(primary, hue_shift,
/// sat_shift)` inside its window.
pub fn calibrate(hsv: &mut HsvPlanes, active: &[(Primary, f32, f32)]) {
    let original_hue = hsv.hue.clone();
    let selector: &[f32] = &original_hue;

    let h_out: &mut [f32] = &mut hsv.hue;
    let s_out: &mut [f32] = &mut hsv.saturation;
    h_out
        .par_iter_mut()
        .zip(s_out.par_iter_mut())
        .zip(selector.par_iter())
        .for_each(|((h, s), &h0)| {
            for &(primary, hue_shift, sat_shift) in active {
                if in_window(primary, h0) {
                    *h = hue_shift.mul_add(HUE_STRENGTH, *h).clamp(0.0, HUE_MAX);
                    *s = (*s * (1.0 + sat_shift / 100.0)).clamp(0.0, CHANNEL_MAX);
                }
            }
        });
}
