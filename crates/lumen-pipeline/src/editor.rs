//! The editing service: source decoding, base image caching and
//! adjustment behind one owned object.
//!
//! An [`Editor`] is shared by reference (or `Arc`) across request
//! handlers. Adjustments for different sources run fully in parallel;
//! the only shared state is the [`BaseImageCache`].

use std::sync::Arc;

use crate::cache::BaseImageCache;
use crate::decode::SourceDecoder;
use crate::diagnostics::{Clock, PipelineDiagnostics};
use crate::params::ParameterSet;
use crate::pipeline;
use crate::types::{DecodedImage, EditorConfig, PipelineError, RgbImage};

/// Owns the decoder, the cache and the configuration they were built with.
#[derive(Debug)]
pub struct Editor<D> {
    config: EditorConfig,
    decoder: D,
    cache: BaseImageCache,
}

impl<D: SourceDecoder> Editor<D> {
    /// Build an editor with an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
    pub fn new(config: EditorConfig, decoder: D) -> Result<Self, PipelineError> {
        config.validate()?;
        tracing::debug!(?config, "editor created");
        Ok(Self {
            cache: BaseImageCache::from_config(&config),
            config,
            decoder,
        })
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The base image cache.
    #[must_use]
    pub const fn cache(&self) -> &BaseImageCache {
        &self.cache
    }

    /// The decoded, downscaled base image for `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] or [`PipelineError::Decode`].
    pub fn base_image(&self, source_id: &str) -> Result<Arc<DecodedImage>, PipelineError> {
        self.cache.get_or_decode(source_id, &self.decoder)
    }

    /// Render `source_id` with `params` applied.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] or [`PipelineError::Decode`]
    /// when the source cannot be loaded, and [`PipelineError::Processing`]
    /// when a stage fails.
    pub fn adjust(&self, source_id: &str, params: &ParameterSet) -> Result<RgbImage, PipelineError> {
        let base = self.base_image(source_id)?;
        pipeline::run(&base, params)
    }

    /// [`adjust`](Self::adjust), also returning per-stage diagnostics.
    ///
    /// # Errors
    ///
    /// Same as [`adjust`](Self::adjust).
    pub fn adjust_with_diagnostics<C: Clock>(
        &self,
        source_id: &str,
        params: &ParameterSet,
        clock: &C,
    ) -> Result<(RgbImage, PipelineDiagnostics), PipelineError> {
        let base = self.base_image(source_id)?;
        pipeline::run_with_diagnostics(&base, params, clock)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::DynamicImage;

    use super::*;
    use crate::decode::{DecodedSource, SourceError};
    use crate::diagnostics::NullClock;
    use crate::params::Parameter;

    fn solid(_: &str) -> Result<DecodedSource, SourceError> {
        Ok(DecodedSource::upright(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            30,
            20,
            image::Rgb([100, 100, 100]),
        ))))
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EditorConfig {
            max_dimension: 0,
            ..EditorConfig::default()
        };
        assert!(matches!(
            Editor::new(config, solid),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn adjust_applies_parameters() {
        let editor = Editor::new(EditorConfig::default(), solid).unwrap();
        let params = ParameterSet::neutral().with(Parameter::Exposure, 1.0);
        let out = editor.adjust("any", &params).unwrap();
        assert_eq!(out.dimensions(), (30, 20));
        assert_eq!(out.get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn repeated_adjustments_decode_once() {
        let calls = AtomicUsize::new(0);
        let decoder = |id: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            solid(id)
        };
        let editor = Editor::new(EditorConfig::default(), decoder).unwrap();
        for exposure in [0.0, 0.5, 1.0] {
            let params = ParameterSet::new().with(Parameter::Exposure, exposure);
            editor.adjust("photo.jpg", &params).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(editor.cache().contains("photo.jpg"));
    }

    #[test]
    fn adjusting_leaves_cached_base_untouched() {
        let editor = Editor::new(EditorConfig::default(), solid).unwrap();
        let params = ParameterSet::new().with(Parameter::Exposure, 3.0);
        editor.adjust("a", &params).unwrap();
        let base = editor.base_image("a").unwrap();
        assert_eq!(base.as_rgb().get_pixel(0, 0).0, [100, 100, 100]);
    }

    #[test]
    fn missing_source_surfaces_not_found() {
        let decoder = |id: &str| -> Result<DecodedSource, SourceError> {
            Err(SourceError::NotFound(id.to_string()))
        };
        let editor = Editor::new(EditorConfig::default(), decoder).unwrap();
        assert!(matches!(
            editor.adjust("gone.dng", &ParameterSet::new()),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn diagnostics_report_downscaled_size() {
        let config = EditorConfig {
            max_dimension: 15,
            ..EditorConfig::default()
        };
        let editor = Editor::new(config, solid).unwrap();
        let (_, diag) = editor
            .adjust_with_diagnostics("a", &ParameterSet::new(), &NullClock)
            .unwrap();
        assert_eq!(diag.dimensions.width, 15);
        assert_eq!(diag.dimensions.height, 10);
    }
}
