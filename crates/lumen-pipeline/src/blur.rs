//! Gaussian blur for float planes and float RGB buffers.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`], which works on any
//! pixel type and keeps `f32` samples unclamped. Used for soft band masks,
//! the clarity/texture low-pass, and the sharpening unsharp mask.

use crate::types::{Plane, Rgb32FImage};

/// Sigma OpenCV derives for a square kernel of side `size` when the
/// caller passes `sigma = 0`.
///
/// Lets kernel sizes quoted in pixels (21x21, 15x15) be expressed as the
/// sigma `imageproc` expects.
#[must_use]
pub fn sigma_for_kernel(size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let size = size as f32;
    0.3f32.mul_add((size - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Blur a single float plane.
///
/// Non-positive sigma values, and empty planes, return the plane
/// unchanged, since `imageproc`'s underlying function panics on
/// `sigma <= 0.0`.
#[must_use = "returns the blurred plane"]
pub fn gaussian_blur(plane: &Plane, sigma: f32) -> Plane {
    if sigma <= 0.0 || plane.width() == 0 || plane.height() == 0 {
        return plane.clone();
    }

    imageproc::filter::gaussian_blur_f32(plane, sigma)
}

/// Blur each channel of a float RGB buffer independently.
///
/// Non-positive sigma values, and empty images, return the image unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgb(image: &Rgb32FImage, sigma: f32) -> Rgb32FImage {
    if sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}
