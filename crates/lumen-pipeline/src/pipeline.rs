//! The adjustment pipeline: fixed-order stages over a private working copy.
//!
//! [`run`] promotes the base raster to a float working buffer, then
//! executes every [`Stage`] in [`Stage::ORDER`] exactly once:
//!
//! ```text
//! RGB  exposure / white balance
//! HSV  tone -> color -> hsl -> calibration -> detail
//! RGB  sharpen
//! ```
//!
//! The buffer is converted to HSV when the first active HSV stage needs
//! it and back to RGB when sharpening or the final output needs it, so a
//! run performs at most one conversion in each direction. Stages whose
//! parameters are all zero return early and never trigger a conversion.
//!
//! A run is fail-closed: if any stage leaves a non-finite sample behind,
//! the whole run returns [`PipelineError::Processing`] and no partially
//! adjusted raster escapes. The cached base image is only ever read.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{CHANNEL_MAX, HsvPlanes};
use crate::diagnostics::{Clock, NullClock, PipelineDiagnostics, StageDiagnostics};
use crate::params::{CalibrationChannel, ColorBand, HslChannel, Parameter, ParameterSet, Primary};
use crate::types::{DecodedImage, PipelineError, Rgb32FImage, RgbImage};
use crate::{calibration, detail, global, hsl, tone};

// ───────────────────────── Stages ──────────────────────────

/// Color space a stage operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Rgb,
    Hsv,
}

/// One pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Exposure, temperature and tint.
    Exposure,
    /// Shadows, highlights, whites and blacks.
    Tone,
    /// Contrast, saturation and vibrance.
    Color,
    /// Per-band hue, saturation and luminance.
    Hsl,
    /// Primary hue and saturation calibration.
    Calibration,
    /// Clarity, texture and dehaze.
    Detail,
    /// Unsharp mask.
    Sharpen,
}

impl Stage {
    /// Execution order.
    pub const ORDER: [Self; 7] = [
        Self::Exposure,
        Self::Tone,
        Self::Color,
        Self::Hsl,
        Self::Calibration,
        Self::Detail,
        Self::Sharpen,
    ];

    /// The color space the stage reads and writes.
    #[must_use]
    pub const fn space(self) -> Space {
        match self {
            Self::Exposure | Self::Sharpen => Space::Rgb,
            Self::Tone | Self::Color | Self::Hsl | Self::Calibration | Self::Detail => Space::Hsv,
        }
    }

    /// The parameters that drive this stage.
    fn parameters(self) -> Vec<Parameter> {
        match self {
            Self::Exposure => vec![Parameter::Exposure, Parameter::Temperature, Parameter::Tint],
            Self::Tone => vec![
                Parameter::Shadows,
                Parameter::Highlights,
                Parameter::Whites,
                Parameter::Blacks,
            ],
            Self::Color => vec![Parameter::Contrast, Parameter::Saturation, Parameter::Vibrance],
            Self::Hsl => ColorBand::ALL
                .into_iter()
                .flat_map(|band| {
                    [HslChannel::Hue, HslChannel::Saturation, HslChannel::Luminance]
                        .map(|channel| Parameter::Hsl(band, channel))
                })
                .collect(),
            Self::Calibration => Primary::ALL
                .into_iter()
                .flat_map(|primary| {
                    [CalibrationChannel::Hue, CalibrationChannel::Saturation]
                        .map(|channel| Parameter::Calibration(primary, channel))
                })
                .collect(),
            Self::Detail => vec![Parameter::Clarity, Parameter::Texture, Parameter::Dehaze],
            Self::Sharpen => vec![Parameter::Sharpness],
        }
    }

    /// Whether any of the stage's parameters is non-zero.
    #[must_use]
    pub fn is_active(self, params: &ParameterSet) -> bool {
        if self == Self::Sharpen {
            return params.get(Parameter::Sharpness) > 0.0;
        }
        self.parameters().into_iter().any(|p| params.get(p) != 0.0)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Exposure => "exposure/white balance",
            Self::Tone => "tone",
            Self::Color => "color",
            Self::Hsl => "hsl",
            Self::Calibration => "calibration",
            Self::Detail => "detail",
            Self::Sharpen => "sharpen",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ───────────────────────── Context ──────────────────────────

/// Per-run working state: the float RGB buffer and, while HSV stages
/// run, its split HSV planes. Never shared between runs.
#[derive(Debug)]
pub struct PipelineContext {
    rgb: Rgb32FImage,
    hsv: Option<HsvPlanes>,
    conversions: u32,
}

impl PipelineContext {
    /// Promote `base` to a private working copy.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Processing`] for an empty raster.
    pub fn new(base: &DecodedImage) -> Result<Self, PipelineError> {
        let dimensions = base.dimensions();
        if dimensions.pixel_count() == 0 {
            return Err(PipelineError::Processing {
                stage: Stage::Exposure,
                reason: format!(
                    "base image has no pixels ({}x{})",
                    dimensions.width, dimensions.height
                ),
            });
        }
        Ok(Self {
            rgb: base.to_working(),
            hsv: None,
            conversions: 0,
        })
    }

    /// Make `space` current, converting if the buffer is in the other one.
    fn enter(&mut self, space: Space) {
        match (space, self.hsv.take()) {
            (Space::Hsv, Some(hsv)) => self.hsv = Some(hsv),
            (Space::Hsv, None) => {
                self.hsv = Some(HsvPlanes::from_rgb(&self.rgb));
                self.conversions += 1;
            }
            (Space::Rgb, Some(hsv)) => {
                self.rgb = hsv.to_rgb();
                self.conversions += 1;
            }
            (Space::Rgb, None) => {}
        }
    }

    /// Run one stage in its color space. Returns whether it did work.
    fn apply(&mut self, stage: Stage, params: &ParameterSet) -> bool {
        self.enter(stage.space());
        match (stage, self.hsv.as_mut()) {
            (Stage::Exposure, _) => global::apply_rgb(&mut self.rgb, params),
            (Stage::Sharpen, _) => detail::sharpen(&mut self.rgb, params),
            (Stage::Tone, Some(hsv)) => tone::apply(hsv, params),
            (Stage::Color, Some(hsv)) => global::apply_hsv(hsv, params),
            (Stage::Hsl, Some(hsv)) => hsl::apply(hsv, params),
            (Stage::Calibration, Some(hsv)) => calibration::apply(hsv, params),
            (Stage::Detail, Some(hsv)) => detail::apply_hsv(hsv, params),
            (_, None) => false,
        }
    }

    /// Fail the run if `stage` left a non-finite sample behind.
    fn check_finite(&self, stage: Stage) -> Result<(), PipelineError> {
        let finite = match &self.hsv {
            Some(hsv) => [&hsv.hue, &hsv.saturation, &hsv.value]
                .into_iter()
                .all(|plane| all_finite(plane)),
            None => all_finite(&self.rgb),
        };
        if finite {
            Ok(())
        } else {
            Err(PipelineError::Processing {
                stage,
                reason: "produced non-finite samples".to_string(),
            })
        }
    }

    /// Return to RGB and quantize to 8 bits.
    fn finish(mut self) -> (RgbImage, u32) {
        self.enter(Space::Rgb);
        let mut out = RgbImage::new(self.rgb.width(), self.rgb.height());
        let src: &[f32] = &self.rgb;
        let dst: &mut [u8] = &mut out;
        dst.par_iter_mut().zip(src.par_iter()).for_each(|(d, &s)| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let quantized = s.round().clamp(0.0, CHANNEL_MAX) as u8;
            *d = quantized;
        });
        (out, self.conversions)
    }
}

fn all_finite(samples: &[f32]) -> bool {
    samples.par_iter().all(|x| x.is_finite())
}

// ───────────────────────── Entry points ──────────────────────────

/// Adjust `base` with `params` and return a new 8-bit raster.
///
/// # Errors
///
/// Returns [`PipelineError::Processing`] if the base image is empty or a
/// stage fails.
pub fn run(base: &DecodedImage, params: &ParameterSet) -> Result<RgbImage, PipelineError> {
    run_with_diagnostics(base, params, &NullClock).map(|(image, _)| image)
}

/// [`run`], additionally timing every stage with `clock`.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with_diagnostics<C: Clock>(
    base: &DecodedImage,
    params: &ParameterSet,
    clock: &C,
) -> Result<(RgbImage, PipelineDiagnostics), PipelineError> {
    let run_start = clock.now();
    let dimensions = base.dimensions();
    let mut ctx = PipelineContext::new(base)?;
    let mut stages = Vec::with_capacity(Stage::ORDER.len());

    for stage in Stage::ORDER {
        let start = clock.now();
        let applied = stage.is_active(params) && ctx.apply(stage, params);
        if applied {
            ctx.check_finite(stage)?;
        }
        let duration = clock.elapsed(&start);
        tracing::debug!(%stage, applied, ?duration, "stage finished");
        stages.push(StageDiagnostics {
            stage,
            duration,
            skipped: !applied,
        });
    }

    let (image, color_conversions) = ctx.finish();
    let diagnostics = PipelineDiagnostics {
        dimensions,
        stages,
        color_conversions,
        total_duration: clock.elapsed(&run_start),
    };
    Ok((image, diagnostics))
}
