//! Tiled image data model.
//!
//! An image is a contract over a node's `out` compound plug: a data
//! window, a display window, a channel-name set, and per-(channel, tile)
//! sample arrays evaluated under a tile-origin context. Pixel data is
//! partitioned into fixed-size square tiles; a tile fully outside the
//! data window reads as all-zero without being materialized.

pub mod codec;
pub mod constant;
pub mod crop;
pub mod reader;
pub mod view;
pub mod window;

pub use codec::{Codec, ImageMetadata, MemoryCodec};
pub use constant::Constant;
pub use crop::Crop;
pub use reader::ImageReader;
pub use view::ImageView;
pub use window::PixelWindow;

use std::sync::Arc;

use glam::IVec2;

use crate::errors::{Result, StrataError};
use crate::graph::plug::PlugSpec;
use crate::graph::value::ValueKind;

/// Fixed tile edge length, a power of two.
pub const TILE_SIZE: i32 = 64;

/// Samples per tile.
pub const TILE_PIXELS: usize = (TILE_SIZE * TILE_SIZE) as usize;

/// Dotted names of the four image output plugs.
pub const OUT_DATA_WINDOW: &str = "out.dataWindow";
pub const OUT_DISPLAY_WINDOW: &str = "out.displayWindow";
pub const OUT_CHANNEL_NAMES: &str = "out.channelNames";
pub const OUT_CHANNEL_DATA: &str = "out.channelData";

/// The children of an image compound plug.
#[must_use]
pub fn image_children() -> Vec<PlugSpec> {
    vec![
        PlugSpec::leaf_out("dataWindow", ValueKind::Window),
        PlugSpec::leaf_out("displayWindow", ValueKind::Window),
        PlugSpec::leaf_out("channelNames", ValueKind::StringList),
        PlugSpec::leaf_out("channelData", ValueKind::Samples),
    ]
}

/// An image-producing node's `out` compound.
#[must_use]
pub fn image_out() -> PlugSpec {
    PlugSpec::compound_out("out", image_children())
}

/// An image-consuming compound input plug.
#[must_use]
pub fn image_in(name: &'static str) -> PlugSpec {
    PlugSpec::compound_in(name, image_children())
}

/// Errors unless `origin` is an exact multiple of the tile size.
pub fn check_tile_origin(origin: IVec2) -> Result<()> {
    if origin.x % TILE_SIZE == 0 && origin.y % TILE_SIZE == 0 {
        Ok(())
    } else {
        Err(StrataError::InvalidTileOrigin {
            x: origin.x,
            y: origin.y,
            tile_size: TILE_SIZE,
        })
    }
}

/// The window covered by the tile at `origin`.
#[must_use]
pub fn tile_window(origin: IVec2) -> PixelWindow {
    PixelWindow::from_size(origin, TILE_SIZE, TILE_SIZE)
}

/// Origins of every tile intersecting `window`, row-major.
#[must_use]
pub fn tile_origins(window: &PixelWindow) -> Vec<IVec2> {
    if window.is_empty() {
        return Vec::new();
    }
    let min_x = window.min.x.div_euclid(TILE_SIZE) * TILE_SIZE;
    let min_y = window.min.y.div_euclid(TILE_SIZE) * TILE_SIZE;
    let mut origins = Vec::new();
    let mut y = min_y;
    while y < window.max.y {
        let mut x = min_x;
        while x < window.max.x {
            origins.push(IVec2::new(x, y));
            x += TILE_SIZE;
        }
        y += TILE_SIZE;
    }
    origins
}

/// An all-zero tile.
#[must_use]
pub fn black_tile() -> Arc<[f32]> {
    Arc::from(vec![0.0f32; TILE_PIXELS])
}

/// Retains only the samples inside `window`, zeroing the rest of the tile
/// at `origin`. Returns the input unchanged when the tile is fully inside.
#[must_use]
pub fn mask_tile(samples: &Arc<[f32]>, origin: IVec2, window: &PixelWindow) -> Arc<[f32]> {
    let tile = tile_window(origin);
    if window.intersect(&tile) == tile {
        return samples.clone();
    }
    let mut masked = vec![0.0f32; TILE_PIXELS];
    let visible = window.intersect(&tile);
    if !visible.is_empty() {
        for y in visible.min.y..visible.max.y {
            let row = ((y - origin.y) * TILE_SIZE) as usize;
            for x in visible.min.x..visible.max.x {
                let i = row + (x - origin.x) as usize;
                masked[i] = samples[i];
            }
        }
    }
    Arc::from(masked)
}

/// Reads the tile-origin and channel-name context variables.
pub(crate) fn tile_context(
    ctx: &crate::graph::context::Context,
) -> Result<(Arc<str>, IVec2)> {
    use crate::graph::context::vars;
    let channel = ctx
        .get(vars::CHANNEL_NAME)
        .ok_or_else(|| StrataError::SourceUnavailable("no image:channelName in context".into()))?
        .expect_string(vars::CHANNEL_NAME)?;
    let origin = ctx
        .get(vars::TILE_ORIGIN)
        .ok_or_else(|| StrataError::SourceUnavailable("no image:tileOrigin in context".into()))?
        .expect_coord(vars::TILE_ORIGIN)?;
    check_tile_origin(origin)?;
    Ok((channel, origin))
}
