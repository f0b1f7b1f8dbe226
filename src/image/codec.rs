//! Codec capability.
//!
//! The engine never implements on-disk image formats; it consumes a
//! [`Codec`]: metadata plus per-tile decode/encode. Codec failures
//! surface as [`SourceUnavailable`](crate::StrataError::SourceUnavailable)
//! and are never cached.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::IVec2;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{Result, StrataError};
use crate::image::window::PixelWindow;
use crate::image::{TILE_PIXELS, check_tile_origin};

/// Per-file image metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub data_window: PixelWindow,
    pub display_window: PixelWindow,
    pub channel_names: Vec<String>,
}

/// Decode/encode capability for one image storage format.
pub trait Codec: Send + Sync {
    fn image_metadata(&self, file: &str) -> Result<ImageMetadata>;

    /// Samples of one tile, tileSize² long, zero-padded outside the data
    /// window.
    fn decode_tile(&self, file: &str, channel: &str, tile_origin: IVec2) -> Result<Arc<[f32]>>;

    /// Creates or truncates `file` with the given metadata.
    fn write_metadata(&self, file: &str, metadata: &ImageMetadata) -> Result<()>;

    fn encode_tile(
        &self,
        file: &str,
        channel: &str,
        tile_origin: IVec2,
        samples: &[f32],
    ) -> Result<()>;
}

#[derive(Default)]
struct StoredImage {
    metadata: Option<ImageMetadata>,
    tiles: FxHashMap<(String, (i32, i32)), Arc<[f32]>>,
}

/// In-process tile store implementing [`Codec`].
///
/// Serves as the default codec for tests and in-memory round trips.
/// Missing tiles inside the data window decode as zero (sparse storage);
/// decode calls are counted so callers can assert that out-of-window
/// tiles never reach the codec.
#[derive(Default)]
pub struct MemoryCodec {
    store: Mutex<FxHashMap<String, StoredImage>>,
    decodes: AtomicU64,
}

impl MemoryCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `decode_tile` calls served so far.
    #[must_use]
    pub fn decode_count(&self) -> u64 {
        self.decodes.load(Ordering::Relaxed)
    }

    /// Raw stored tile, if any. For test assertions.
    #[must_use]
    pub fn stored_tile(&self, file: &str, channel: &str, origin: IVec2) -> Option<Arc<[f32]>> {
        self.store
            .lock()
            .get(file)?
            .tiles
            .get(&(channel.to_owned(), (origin.x, origin.y)))
            .cloned()
    }
}

impl Codec for MemoryCodec {
    fn image_metadata(&self, file: &str) -> Result<ImageMetadata> {
        self.store
            .lock()
            .get(file)
            .and_then(|image| image.metadata.clone())
            .ok_or_else(|| StrataError::SourceUnavailable(format!("no such image '{file}'")))
    }

    fn decode_tile(&self, file: &str, channel: &str, tile_origin: IVec2) -> Result<Arc<[f32]>> {
        check_tile_origin(tile_origin)?;
        self.decodes.fetch_add(1, Ordering::Relaxed);
        let store = self.store.lock();
        let image = store
            .get(file)
            .ok_or_else(|| StrataError::SourceUnavailable(format!("no such image '{file}'")))?;
        let metadata = image
            .metadata
            .as_ref()
            .ok_or_else(|| StrataError::SourceUnavailable(format!("'{file}' has no metadata")))?;
        if !metadata
            .channel_names
            .iter()
            .any(|c| c == channel)
        {
            return Err(StrataError::SourceUnavailable(format!(
                "'{file}' has no channel '{channel}'"
            )));
        }
        Ok(image
            .tiles
            .get(&(channel.to_owned(), (tile_origin.x, tile_origin.y)))
            .cloned()
            .unwrap_or_else(crate::image::black_tile))
    }

    fn write_metadata(&self, file: &str, metadata: &ImageMetadata) -> Result<()> {
        let mut store = self.store.lock();
        let image = store.entry(file.to_owned()).or_default();
        image.metadata = Some(metadata.clone());
        image.tiles.clear();
        Ok(())
    }

    fn encode_tile(
        &self,
        file: &str,
        channel: &str,
        tile_origin: IVec2,
        samples: &[f32],
    ) -> Result<()> {
        check_tile_origin(tile_origin)?;
        if samples.len() != TILE_PIXELS {
            return Err(StrataError::SourceUnavailable(format!(
                "tile must hold {TILE_PIXELS} samples, got {}",
                samples.len()
            )));
        }
        let mut store = self.store.lock();
        let image = store
            .get_mut(file)
            .ok_or_else(|| StrataError::SourceUnavailable(format!("no such image '{file}'")))?;
        image
            .tiles
            .insert((channel.to_owned(), (tile_origin.x, tile_origin.y)), Arc::from(samples));
        Ok(())
    }
}
