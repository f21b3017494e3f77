//! lumen-pipeline: Lightroom-style parametric adjustments (sans-IO core).
//!
//! Applies a sparse set of named edit parameters to a decoded photograph
//! and returns an 8-bit RGB preview:
//!
//! exposure/white balance -> tone -> color -> HSL -> calibration ->
//! detail -> sharpen.
//!
//! Decoding is an injected capability ([`SourceDecoder`]); the stages only
//! ever see in-memory rasters. [`Editor`] bundles a decoder with the
//! [`BaseImageCache`] so repeated edits of one source decode it once.
//!
//! ```rust
//! # use lumen_pipeline::{DecodedImage, Parameter, ParameterSet, PipelineError};
//! # fn demo() -> Result<(), PipelineError> {
//! let base = DecodedImage::new(image::RgbImage::from_pixel(4, 4, image::Rgb([90, 90, 90])));
//! let params = ParameterSet::new()
//!     .with(Parameter::Exposure, 0.5)
//!     .with(Parameter::Vibrance, 20.0);
//! let preview = lumen_pipeline::adjust(&base, &params)?;
//! assert_eq!(preview.dimensions(), (4, 4));
//! # Ok(())
//! # }
//! ```

pub mod blur;
pub mod cache;
pub mod calibration;
pub mod color;
pub mod decode;
pub mod detail;
pub mod diagnostics;
pub mod downscale;
pub mod editor;
pub mod global;
pub mod hsl;
pub mod mask;
pub mod params;
pub mod pipeline;
pub mod preset;
pub mod tone;
pub mod types;

pub use cache::BaseImageCache;
pub use decode::{DecodedSource, FileDecoder, SourceDecoder, SourceError};
pub use diagnostics::{Clock, NullClock, PipelineDiagnostics, StageDiagnostics};
pub use downscale::DownscaleFilter;
pub use editor::Editor;
pub use params::{ColorBand, Parameter, ParameterSet, Primary};
pub use pipeline::Stage;
pub use types::{DecodeError, DecodedImage, Dimensions, EditorConfig, PipelineError, RgbImage};

/// Run the full adjustment pipeline on an already decoded base image.
///
/// The base image is only read; the result is a new raster of the same
/// size.
///
/// # Errors
///
/// Returns [`PipelineError::Processing`] if the base image is empty or a
/// stage fails.
pub fn adjust(base: &DecodedImage, params: &ParameterSet) -> Result<RgbImage, PipelineError> {
    pipeline::run(base, params)
}
