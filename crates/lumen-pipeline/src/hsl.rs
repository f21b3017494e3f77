//! Selective color: per-band hue, saturation and luminance shifts.
//!
//! Every band's soft mask is computed from the hue plane as it stands
//! when that band runs, so a hue shift in one band can move pixels into
//! a later band. Shifts are damped (see the `*_DAMPING` constants) so the
//! full -100..100 parameter range stays visually moderate.

use rayon::prelude::*;

use crate::color::{CHANNEL_MAX, HUE_MAX, HsvPlanes};
use crate::mask;
use crate::params::{ColorBand, HslChannel, Parameter, ParameterSet};

/// Hue units moved per unit of `hue_<band>` at full mask weight.
pub const HUE_DAMPING: f32 = 0.1;
/// Saturation gain per unit of `sat_<band>` fraction at full weight.
pub const SATURATION_DAMPING: f32 = 0.3;
/// Value levels moved per unit of `lum_<band>` at full weight.
pub const LUMINANCE_DAMPING: f32 = 0.3;

/// The three shifts requested for one band, in parameter units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandShift {
    pub hue: f32,
    pub saturation: f32,
    pub luminance: f32,
}

impl BandShift {
    /// Read the shifts for `band` from `params`.
    #[must_use]
    pub fn from_params(params: &ParameterSet, band: ColorBand) -> Self {
        Self {
            hue: params.get(Parameter::Hsl(band, HslChannel::Hue)),
            saturation: params.get(Parameter::Hsl(band, HslChannel::Saturation)),
            luminance: params.get(Parameter::Hsl(band, HslChannel::Luminance)),
        }
    }

    /// Whether all three shifts are zero.
    #[must_use]
    pub fn is_identity(self) -> bool {
        self.hue == 0.0 && self.saturation == 0.0 && self.luminance == 0.0
    }
}

/// Apply every band with a non-zero shift. Returns whether any band ran.
pub fn apply(hsv: &mut HsvPlanes, params: &ParameterSet) -> bool {
    let mut applied = false;
    for band in ColorBand::ALL {
        let shift = BandShift::from_params(params, band);
        if shift.is_identity() {
            continue;
        }
        tracing::trace!(band = band.name(), ?shift, "hsl band");
        apply_band(hsv, band, shift);
        applied = true;
    }
    applied
}

/// Apply `shift` to the pixels selected by the soft mask of `band`.
pub fn apply_band(hsv: &mut HsvPlanes, band: ColorBand, shift: BandShift) {
    let weights = mask::mask_for(&hsv.hue, band);
    let weights: &[f32] = &weights;

    let hue_step = shift.hue * HUE_DAMPING;
    let sat_step = shift.saturation / 100.0 * SATURATION_DAMPING;
    let lum_step = shift.luminance * LUMINANCE_DAMPING;

    let h_out: &mut [f32] = &mut hsv.hue;
    let s_out: &mut [f32] = &mut hsv.saturation;
    let v_out: &mut [f32] = &mut hsv.value;
    h_out
        .par_iter_mut()
        .zip(s_out.par_iter_mut())
        .zip(v_out.par_iter_mut())
        .zip(weights.par_iter())
        .for_each(|(((h, s), v), &w)| {
            *h = hue_step.mul_add(w, *h).clamp(0.0, HUE_MAX);
            *s = (*s * sat_step.mul_add(w, 1.0)).clamp(0.0, CHANNEL_MAX);
            *v = lum_step.mul_add(w, *v).clamp(0.0, CHANNEL_MAX);
        });
}
