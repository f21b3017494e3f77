//! Source decoding capability.
//!
//! The pipeline never reads files or runs RAW converters itself. A
//! [`SourceDecoder`] turns a source identity into a [`DecodedSource`]:
//! an RGB-convertible raster plus the orientation it was recorded with.
//! [`BaseImageCache`](crate::cache::BaseImageCache) applies the
//! orientation and downscale, then stores the result.
//!
//! [`FileDecoder`] is the bundled implementation, backed by the `image`
//! crate. RAW formats need a decoder supplied by the caller: any
//! `Fn(&str) -> Result<DecodedSource, SourceError>` closure works.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};

use crate::types::BoxError;

/// Why a decoder could not produce a raster.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No source exists under that identity.
    #[error("no such source: {0}")]
    NotFound(String),

    /// The source exists but holds no bytes.
    #[error("source is empty")]
    Empty,

    /// The bytes could not be decoded.
    #[error(transparent)]
    Unreadable(BoxError),
}

impl From<image::ImageError> for SourceError {
    fn from(err: image::ImageError) -> Self {
        Self::Unreadable(Box::new(err))
    }
}

/// A raster as it came out of the decoder, before orientation and size
/// normalization.
#[derive(Debug, Clone)]
pub struct DecodedSource {
    /// Decoded pixels, any color type.
    pub image: DynamicImage,
    /// Orientation recorded in the source metadata.
    pub orientation: Orientation,
}

impl DecodedSource {
    /// A raster that needs no reorientation.
    #[must_use]
    pub const fn upright(image: DynamicImage) -> Self {
        Self {
            image,
            orientation: Orientation::NoTransforms,
        }
    }

    /// Rotate/flip upright and drop to 8-bit RGB.
    #[must_use]
    pub fn normalize(self) -> RgbImage {
        let Self {
            mut image,
            orientation,
        } = self;
        image.apply_orientation(orientation);
        image.to_rgb8()
    }
}

/// Turns a source identity into pixels.
///
/// Implementations must be pure with respect to the identity: decoding
/// the same id twice yields equivalent rasters.
pub trait SourceDecoder: Send + Sync {
    /// Decode the source named `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] when the id names nothing, and
    /// another variant when the source exists but cannot be decoded.
    fn decode(&self, source_id: &str) -> Result<DecodedSource, SourceError>;
}

impl<F> SourceDecoder for F
where
    F: Fn(&str) -> Result<DecodedSource, SourceError> + Send + Sync,
{
    fn decode(&self, source_id: &str) -> Result<DecodedSource, SourceError> {
        self(source_id)
    }
}

/// Decode in-memory image bytes (PNG, JPEG, BMP, WebP, TIFF), reading the
/// EXIF orientation when the format carries one.
///
/// # Errors
///
/// Returns [`SourceError::Empty`] for empty input and
/// [`SourceError::Unreadable`] when the format is unrecognized or the
/// data is corrupt.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedSource, SourceError> {
    if bytes.is_empty() {
        return Err(SourceError::Empty);
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| SourceError::Unreadable(Box::new(e)))?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let image = DynamicImage::from_decoder(decoder)?;

    Ok(DecodedSource { image, orientation })
}

/// Reads sources from the local filesystem.
///
/// Without a root, ids are plain paths. With [`FileDecoder::rooted`], ids
/// are resolved below the root and any id that tries to leave it (absolute
/// paths, `..`) is reported as not found.
#[derive(Debug, Clone, Default)]
pub struct FileDecoder {
    root: Option<PathBuf>,
}

impl FileDecoder {
    /// Treat ids as paths relative to the working directory (or absolute).
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Resolve ids below `root`.
    #[must_use]
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source_id: &str) -> Option<PathBuf> {
        let id = Path::new(source_id);
        match &self.root {
            None => Some(id.to_path_buf()),
            Some(root) => id
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
                .then(|| root.join(id)),
        }
    }
}

impl SourceDecoder for FileDecoder {
    fn decode(&self, source_id: &str) -> Result<DecodedSource, SourceError> {
        let path = self
            .resolve(source_id)
            .ok_or_else(|| SourceError::NotFound(source_id.to_string()))?;
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(source_id.to_string())
            } else {
                SourceError::Unreadable(Box::new(e))
            }
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read source");
        decode_bytes(&bytes)
    }
}
