//! Tone ranges: shadows, highlights, whites and blacks.
//!
//! Each range is a linear ramp on the value channel that is fully on at
//! the dark or bright end and fades to zero at its threshold. The ramp
//! scales a brightness shift of up to 30 levels per unit of the
//! parameter fraction. Value is clamped to `[0, 255]` after every range so
//! the next range reads a valid channel.

use rayon::prelude::*;

use crate::color::{CHANNEL_MAX, HsvPlanes};
use crate::params::{Parameter, ParameterSet};
use crate::types::Plane;

/// Levels added per unit of parameter fraction at full mask weight.
pub const TONE_STRENGTH: f32 = 30.0;

/// One luminance range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneRange {
    Shadows,
    Highlights,
    Whites,
    Blacks,
}

impl ToneRange {
    /// Processing order.
    pub const ALL: [Self; 4] = [Self::Shadows, Self::Highlights, Self::Whites, Self::Blacks];

    /// The parameter that drives this range.
    #[must_use]
    pub const fn parameter(self) -> Parameter {
        match self {
            Self::Shadows => Parameter::Shadows,
            Self::Highlights => Parameter::Highlights,
            Self::Whites => Parameter::Whites,
            Self::Blacks => Parameter::Blacks,
        }
    }

    /// Mask weight in `[0, 1]` for a value sample.
    #[must_use]
    pub fn weight(self, value: f32) -> f32 {
        let w = match self {
            Self::Shadows => (64.0 - value) / 64.0,
            Self::Highlights => (value - 192.0) / 64.0,
            Self::Whites => (value - 224.0) / 32.0,
            Self::Blacks => (32.0 - value) / 32.0,
        };
        w.clamp(0.0, 1.0)
    }
}

/// Apply every non-zero tone range to `hsv.value`.
///
/// Returns whether anything was applied.
pub fn apply(hsv: &mut HsvPlanes, params: &ParameterSet) -> bool {
    let mut applied = false;
    for range in ToneRange::ALL {
        let amount = params.fraction(range.parameter());
        if amount == 0.0 {
            continue;
        }
        shift_range(&mut hsv.value, range, amount);
        applied = true;
    }
    applied
}

/// Shift `value` by `amount * TONE_STRENGTH` weighted by the mask of
/// `range`, then clamp.
pub fn shift_range(value: &mut Plane, range: ToneRange, amount: f32) {
    let samples: &mut [f32] = value;
    samples.par_iter_mut().for_each(|v| {
        let shifted = (amount * TONE_STRENGTH).mul_add(range.weight(*v), *v);
        *v = shifted.clamp(0.0, CHANNEL_MAX);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn planes(values: &[f32]) -> HsvPlanes {
        #[allow(clippy::cast_possible_truncation)]
        let width = values.len() as u32;
        HsvPlanes {
            hue: Plane::new(width, 1),
            saturation: Plane::new(width, 1),
            value: Plane::from_raw(width, 1, values.to_vec()).unwrap(),
        }
    }

    #[test]
    fn weights_ramp_from_the_extremes() {
        assert!((ToneRange::Shadows.weight(0.0) - 1.0).abs() < f32::EPSILON);
        assert!((ToneRange::Shadows.weight(32.0) - 0.5).abs() < f32::EPSILON);
        assert!(ToneRange::Shadows.weight(64.0).abs() < f32::EPSILON);
        assert!(ToneRange::Highlights.weight(128.0).abs() < f32::EPSILON);
        assert!((ToneRange::Highlights.weight(255.0) - 63.0 / 64.0).abs() < f32::EPSILON);
        assert!((ToneRange::Highlights.weight(256.0) - 1.0).abs() < f32::EPSILON);
        assert!((ToneRange::Whites.weight(255.0) - 31.0 / 32.0).abs() < f32::EPSILON);
        assert!((ToneRange::Whites.weight(240.0) - 0.5).abs() < f32::EPSILON);
        assert!((ToneRange::Blacks.weight(16.0) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_parameters_leave_value_alone() {
        let mut hsv = planes(&[0.0, 100.0, 255.0]);
        let before = hsv.clone();
        assert!(!apply(&mut hsv, &ParameterSet::new()));
        assert_eq!(hsv, before);
    }

    #[test]
    fn shadows_lift_dark_pixels_only() {
        let mut hsv = planes(&[0.0, 32.0, 128.0]);
        let params = ParameterSet::new().with(Parameter::Shadows, 100.0);
        assert!(apply(&mut hsv, &params));
        let v = hsv.value.as_raw();
        assert!((v[0] - 30.0).abs() < 1e-4, "got {}", v[0]);
        assert!((v[1] - 47.0).abs() < 1e-4, "got {}", v[1]);
        assert!((v[2] - 128.0).abs() < 1e-4, "midtones must not move, got {}", v[2]);
    }

    #[test]
    fn negative_highlights_darken_bright_pixels() {
        let mut hsv = planes(&[255.0, 100.0]);
        let params = ParameterSet::new().with(Parameter::Highlights, -100.0);
        apply(&mut hsv, &params);
        let v = hsv.value.as_raw();
        assert!(v[0] < 255.0 && v[0] > 200.0, "got {}", v[0]);
        assert!((v[1] - 100.0).abs() < 1e-4);
    }

    #[test]
    fn extreme_values_stay_in_range() {
        let mut hsv = planes(&[0.0, 10.0, 60.0, 200.0, 250.0, 255.0]);
        let params = ParameterSet::new()
            .with(Parameter::Shadows, -100.0)
            .with(Parameter::Blacks, -100.0)
            .with(Parameter::Highlights, 100.0)
            .with(Parameter::Whites, 100.0);
        apply(&mut hsv, &params);
        for &v in hsv.value.as_raw() {
            assert!((0.0..=CHANNEL_MAX).contains(&v), "value {v} out of range");
        }
    }
}
