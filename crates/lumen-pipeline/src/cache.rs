//! Base image cache.
//!
//! Holds decoded, orientation-corrected, size-bounded rasters keyed by
//! source identity, so repeated adjustments of one photo decode it once.
//!
//! Entries are handed out as `Arc<DecodedImage>` and never mutated.
//! Concurrent first requests for the same key are single-flighted: one
//! caller decodes while the others wait on that key's decode lock and
//! then share the result. Requests for different keys never wait on
//! each other's decodes.
//!
//! The cache is bounded. Once more than `capacity` decoded entries are
//! resident, the least recently used ones are dropped. A capacity of zero
//! turns caching off.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use image::DynamicImage;
use parking_lot::Mutex;

use crate::decode::{SourceDecoder, SourceError};
use crate::downscale::{self, DownscaleFilter};
use crate::types::{DecodeError, DecodedImage, EditorConfig, PipelineError};

/// One key's storage. Shared so waiters can block on `decode_lock`
/// without holding the map lock.
#[derive(Debug, Default)]
struct Slot {
    image: OnceLock<Arc<DecodedImage>>,
    decode_lock: Mutex<()>,
}

#[derive(Debug)]
struct Entry {
    slot: Arc<Slot>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    tick: u64,
}

/// Bounded, thread-safe store of decoded base images.
#[derive(Debug)]
pub struct BaseImageCache {
    capacity: usize,
    max_dimension: u32,
    filter: DownscaleFilter,
    state: Mutex<CacheState>,
}

impl BaseImageCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(capacity: usize, max_dimension: u32, filter: DownscaleFilter) -> Self {
        Self {
            capacity,
            max_dimension,
            filter,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Create an empty cache sized and filtered per `config`.
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(
            config.cache_capacity,
            config.max_dimension,
            config.downscale_filter,
        )
    }

    /// Maximum number of resident decoded entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident decoded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|e| e.slot.image.get().is_some())
            .count()
    }

    /// Returns `true` if no decoded entry is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a decoded entry for `source_id` is resident.
    #[must_use]
    pub fn contains(&self, source_id: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(source_id)
            .is_some_and(|e| e.slot.image.get().is_some())
    }

    /// Drop the entry for `source_id`, if any. Callers holding the image
    /// keep their `Arc`.
    pub fn invalidate(&self, source_id: &str) -> bool {
        self.state.lock().entries.remove(source_id).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Return the cached image for `source_id`, decoding it with
    /// `decoder` on first use.
    ///
    /// A fresh decode is orientation-corrected and downscaled to the
    /// configured long edge before it is stored. Failed decodes store
    /// nothing, so a later call tries again.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] when the decoder knows no such
    /// source and [`PipelineError::Decode`] when it cannot decode it.
    pub fn get_or_decode<D>(
        &self,
        source_id: &str,
        decoder: &D,
    ) -> Result<Arc<DecodedImage>, PipelineError>
    where
        D: SourceDecoder + ?Sized,
    {
        if self.capacity == 0 {
            return self.decode(source_id, decoder).map(Arc::new);
        }

        loop {
            let slot = self.touch(source_id);
            if let Some(image) = slot.image.get() {
                tracing::debug!(source_id, "base image cache hit");
                return Ok(Arc::clone(image));
            }

            let guard = slot.decode_lock.lock();
            if let Some(image) = slot.image.get() {
                tracing::debug!(source_id, "base image decoded by concurrent request");
                return Ok(Arc::clone(image));
            }
            if !self.is_current(source_id, &slot) {
                // A failed decode or an invalidation removed this slot while
                // we waited; retry against whatever the map holds now.
                drop(guard);
                continue;
            }

            tracing::debug!(source_id, "base image cache miss");
            return match self.decode(source_id, decoder) {
                Ok(image) => {
                    let image = Arc::clone(slot.image.get_or_init(|| Arc::new(image)));
                    drop(guard);
                    self.evict(source_id);
                    Ok(image)
                }
                Err(err) => {
                    // Waiters queued on this slot must see it gone once
                    // they hold the lock.
                    self.forget_empty(source_id, &slot);
                    drop(guard);
                    Err(err)
                }
            };
        }
    }

    /// Whether the map still holds `slot` for `source_id`.
    fn is_current(&self, source_id: &str, slot: &Arc<Slot>) -> bool {
        self.state
            .lock()
            .entries
            .get(source_id)
            .is_some_and(|e| Arc::ptr_eq(&e.slot, slot))
    }

    /// Look up or create the slot for `source_id` and mark it used.
    fn touch(&self, source_id: &str) -> Arc<Slot> {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;
        let entry = state
            .entries
            .entry(source_id.to_string())
            .or_insert_with(|| Entry {
                slot: Arc::default(),
                last_used: 0,
            });
        entry.last_used = tick;
        Arc::clone(&entry.slot)
    }

    /// Remove the slot a failed decode left behind, unless a concurrent
    /// request has since replaced or filled it.
    fn forget_empty(&self, source_id: &str, slot: &Arc<Slot>) {
        let mut state = self.state.lock();
        let stale = state
            .entries
            .get(source_id)
            .is_some_and(|e| Arc::ptr_eq(&e.slot, slot) && e.slot.image.get().is_none());
        if stale {
            state.entries.remove(source_id);
        }
    }

    /// Drop least recently used decoded entries until at most `capacity`
    /// remain. The entry for `keep` and in-flight decodes are never dropped.
    fn evict(&self, keep: &str) {
        let mut state = self.state.lock();
        while state.entries.len() > self.capacity {
            let victim = state
                .entries
                .iter()
                .filter(|(key, e)| key.as_str() != keep && e.slot.image.get().is_some())
                .min_by_key(|(_, e)| e.last_used)
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else {
                break;
            };
            tracing::debug!(source_id = %victim, "evicting base image");
            state.entries.remove(&victim);
        }
    }

    fn decode<D>(&self, source_id: &str, decoder: &D) -> Result<DecodedImage, PipelineError>
    where
        D: SourceDecoder + ?Sized,
    {
        let source = decoder.decode(source_id).map_err(|err| match err {
            SourceError::NotFound(_) => PipelineError::NotFound(source_id.to_string()),
            other => PipelineError::Decode(DecodeError {
                source_id: source_id.to_string(),
                cause: Box::new(other),
            }),
        })?;

        let upright = DynamicImage::ImageRgb8(source.normalize());
        let (source_width, source_height) = (upright.width(), upright.height());
        let (bounded, resized) = downscale::downscale(upright, self.max_dimension, self.filter);
        tracing::info!(
            source_id,
            source_width,
            source_height,
            width = bounded.width(),
            height = bounded.height(),
            resized,
            "decoded base image"
        );
        Ok(DecodedImage::new(bounded.into_rgb8()))
    }
}
