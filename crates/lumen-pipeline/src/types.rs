//! Shared types for the lumen adjustment pipeline.

use serde::{Deserialize, Serialize};

use crate::downscale::DownscaleFilter;
use crate::pipeline::Stage;

/// Re-export `RgbImage` so downstream crates can hand rasters to
/// encoders without depending on `image` directly.
pub use image::RgbImage;

/// Re-export of the 32-bit float RGB buffer used as the working copy.
pub use image::Rgb32FImage;

/// A single-channel `f32` raster.
///
/// Hue, saturation, value and mask planes all use this type. Samples
/// are stored in the same units as the 8-bit data they were derived
/// from (0-255, or 0-180 for hue), never normalized to 0-1.
pub type Plane = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// Boxed error used for causes coming from injected capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// The longer of the two axes.
    #[must_use]
    pub const fn long_edge(self) -> u32 {
        if self.width > self.height {
            self.width
        } else {
            self.height
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A decoded, orientation-corrected, size-bounded source raster.
///
/// Stored behind an `Arc` in the [`BaseImageCache`](crate::cache::BaseImageCache)
/// and never mutated once built; every pipeline run promotes a private
/// working copy via [`to_working`](Self::to_working).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    raster: RgbImage,
}

impl DecodedImage {
    /// Wrap an 8-bit RGB raster.
    #[must_use]
    pub const fn new(raster: RgbImage) -> Self {
        Self { raster }
    }

    /// The underlying 8-bit RGB raster.
    #[must_use]
    pub const fn as_rgb(&self) -> &RgbImage {
        &self.raster
    }

    /// Consume the wrapper and return the raster.
    #[must_use]
    pub fn into_rgb(self) -> RgbImage {
        self.raster
    }

    /// Raster dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.raster.width(),
            height: self.raster.height(),
        }
    }

    /// Promote to a float working buffer, keeping the 0-255 scale.
    ///
    /// `image`'s own `Rgb32F` conversion rescales to 0-1, which the
    /// stage formulas do not expect, so the promotion is done by hand.
    #[must_use]
    pub fn to_working(&self) -> Rgb32FImage {
        let mut working = Rgb32FImage::new(self.raster.width(), self.raster.height());
        for (dst, &src) in working.iter_mut().zip(self.raster.iter()) {
            *dst = f32::from(src);
        }
        working
    }
}

/// Configuration for an [`Editor`](crate::editor::Editor) and the base
/// image cache it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Long-edge bound applied to every source on first decode.
    pub max_dimension: u32,

    /// Resampling filter used for the first-decode downscale.
    pub downscale_filter: DownscaleFilter,

    /// Maximum number of decoded sources kept resident. Zero disables
    /// caching: every request decodes its source again.
    pub cache_capacity: usize,
}

impl EditorConfig {
    /// Default long-edge bound for preview rendering.
    pub const DEFAULT_MAX_DIMENSION: u32 = 1920;
    /// Default resampling filter for the first-decode downscale.
    pub const DEFAULT_DOWNSCALE_FILTER: DownscaleFilter = DownscaleFilter::Lanczos3;
    /// Default number of cached sources.
    pub const DEFAULT_CACHE_CAPACITY: usize = 16;

    /// Check the invariants that construction does not enforce.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `max_dimension` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_dimension == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            downscale_filter: Self::DEFAULT_DOWNSCALE_FILTER,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// A source could not be decoded into an RGB raster.
///
/// Nothing is cached when this is returned.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode `{source_id}`: {cause}")]
pub struct DecodeError {
    /// Identity of the source that failed.
    pub source_id: String,
    /// The decoder's own error.
    #[source]
    pub cause: BoxError,
}

/// Errors that can occur while producing an adjusted raster.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The source exists but could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The referenced source does not exist.
    #[error("source not found: {0}")]
    NotFound(String),

    /// A stage failed. The run is aborted and no partial output escapes.
    #[error("{stage} stage failed: {reason}")]
    Processing {
        /// The stage that failed.
        stage: Stage,
        /// What went wrong.
        reason: String,
    },

    /// Editor configuration is invalid.
    #[error("invalid editor configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_edge_picks_larger_axis() {
        let landscape = Dimensions {
            width: 300,
            height: 200,
        };
        let portrait = Dimensions {
            width: 200,
            height: 300,
        };
        assert_eq!(landscape.long_edge(), 300);
        assert_eq!(portrait.long_edge(), 300);
        assert_eq!(landscape.pixel_count(), 60_000);
    }

    #[test]
    fn working_copy_keeps_eight_bit_scale() {
        let raster = RgbImage::from_pixel(2, 2, image::Rgb([0, 128, 255]));
        let working = DecodedImage::new(raster).to_working();
        for pixel in working.pixels() {
            assert!((pixel.0[0] - 0.0).abs() < f32::EPSILON);
            assert!((pixel.0[1] - 128.0).abs() < f32::EPSILON);
            assert!((pixel.0[2] - 255.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn working_copy_is_independent_of_source() {
        let decoded = DecodedImage::new(RgbImage::from_pixel(1, 1, image::Rgb([10, 20, 30])));
        let mut working = decoded.to_working();
        working.put_pixel(0, 0, image::Rgb([0.0, 0.0, 0.0]));
        assert_eq!(decoded.as_rgb().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn editor_config_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.max_dimension, 1920);
        assert_eq!(config.downscale_filter, DownscaleFilter::Lanczos3);
        assert_eq!(config.cache_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_max_dimension_is_invalid() {
        let config = EditorConfig {
            max_dimension: 0,
            ..EditorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn decode_error_message_names_source() {
        let err = DecodeError {
            source_id: "IMG_0001.CR2".to_string(),
            cause: "unsupported format".into(),
        };
        let message = err.to_string();
        assert!(message.contains("IMG_0001.CR2"), "got {message}");
        assert!(message.contains("unsupported format"), "got {message}");
    }
}
