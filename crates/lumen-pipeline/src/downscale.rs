//! Preview downscaling.
//!
//! A fresh decode is bounded on its long edge before it enters the base
//! image cache, so later adjustments work on preview-sized rasters
//! instead of full sensor output. The image is taken by value: a source
//! that already fits is handed back without copying.

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Resampling kernel for the preview bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownscaleFilter {
    /// Keep the decoded resolution, however large.
    Disabled,
    Nearest,
    /// Bilinear.
    Triangle,
    /// Bicubic.
    CatmullRom,
    Gaussian,
    /// Best detail retention on photographs.
    #[default]
    Lanczos3,
}

impl DownscaleFilter {
    pub const ALL: [Self; 6] = [
        Self::Disabled,
        Self::Nearest,
        Self::Triangle,
        Self::CatmullRom,
        Self::Gaussian,
        Self::Lanczos3,
    ];

    const fn kernel(self) -> Option<FilterType> {
        Some(match self {
            Self::Disabled => return None,
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        })
    }

    /// Canonical name plus the common aliases accepted when parsing.
    const fn names(self) -> &'static [&'static str] {
        match self {
            Self::Disabled => &["disabled", "none", "off"],
            Self::Nearest => &["nearest"],
            Self::Triangle => &["triangle", "bilinear"],
            Self::CatmullRom => &["catmull-rom", "catmullrom", "bicubic"],
            Self::Gaussian => &["gaussian"],
            Self::Lanczos3 => &["lanczos3", "lanczos"],
        }
    }
}

impl fmt::Display for DownscaleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.names()[0])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown downscale filter `{0}`")]
pub struct UnknownFilter(pub String);

impl FromStr for DownscaleFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|filter| filter.names().iter().any(|n| n.eq_ignore_ascii_case(wanted)))
            .ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

/// Target size for a `width x height` raster whose long edge may not
/// exceed `max_dimension`, or `None` when it already fits.
///
/// The short edge is rounded and never drops below one pixel.
#[must_use]
pub fn bounded_size(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let long = width.max(height);
    if long <= max_dimension || max_dimension == 0 {
        return None;
    }
    let scale = f64::from(max_dimension) / f64::from(long);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let shrink = |edge: u32| ((f64::from(edge) * scale).round() as u32).clamp(1, max_dimension);
    Some(if width >= height {
        (max_dimension, shrink(height))
    } else {
        (shrink(width), max_dimension)
    })
}

/// Bound the long edge of `image` to `max_dimension`.
///
/// Returns the image and whether it was resampled.
#[must_use]
pub fn downscale(
    image: DynamicImage,
    max_dimension: u32,
    filter: DownscaleFilter,
) -> (DynamicImage, bool) {
    let target = filter
        .kernel()
        .zip(bounded_size(image.width(), image.height(), max_dimension));
    match target {
        Some((kernel, (width, height))) => (image.resize_exact(width, height, kernel), true),
        None => (image, false),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb([90, 120, 150])))
    }

    fn size(image: &DynamicImage) -> (u32, u32) {
        (image.width(), image.height())
    }

    #[test]
    fn fitting_sources_pass_through() {
        for (w, h) in [(640, 480), (1920, 1080), (1080, 1920)] {
            let (out, resized) = downscale(solid(w, h), 1920, DownscaleFilter::Lanczos3);
            assert!(!resized, "{w}x{h}");
            assert_eq!(size(&out), (w, h));
        }
    }

    #[test]
    fn long_edge_is_bounded_in_both_orientations() {
        let (out, resized) = downscale(solid(4000, 3000), 400, DownscaleFilter::Triangle);
        assert!(resized);
        assert_eq!(size(&out), (400, 300));

        let (out, _) = downscale(solid(1000, 2000), 500, DownscaleFilter::Lanczos3);
        assert_eq!(size(&out), (250, 500));
    }

    #[test]
    fn disabled_keeps_full_resolution() {
        let (out, resized) = downscale(solid(3000, 2000), 100, DownscaleFilter::Disabled);
        assert!(!resized);
        assert_eq!(size(&out), (3000, 2000));
    }

    #[test]
    fn panoramas_keep_at_least_one_row() {
        assert_eq!(bounded_size(10_000, 3, 100), Some((100, 1)));
        assert_eq!(bounded_size(3, 10_000, 100), Some((1, 100)));
        assert_eq!(bounded_size(99, 100, 100), None);
    }

    #[test]
    fn aliases_parse() {
        assert_eq!("Lanczos".parse::<DownscaleFilter>().unwrap(), DownscaleFilter::Lanczos3);
        assert_eq!("bicubic".parse::<DownscaleFilter>().unwrap(), DownscaleFilter::CatmullRom);
        assert_eq!(" off ".parse::<DownscaleFilter>().unwrap(), DownscaleFilter::Disabled);
        assert!("mitchell".parse::<DownscaleFilter>().is_err());
    }

    #[test]
    fn display_parses_back() {
        for filter in DownscaleFilter::ALL {
            assert_eq!(filter.to_string().parse::<DownscaleFilter>().unwrap(), filter);
        }
    }
}
