//! Per-tile image queries and whole-image persistence.

use std::sync::Arc;

use glam::IVec2;

use crate::errors::Result;
use crate::graph::context::{Context, vars};
use crate::graph::graph::Graph;
use crate::graph::value::Value;
use crate::graph::{NodeKey, PlugKey};
use crate::image::codec::{Codec, ImageMetadata};
use crate::image::window::PixelWindow;
use crate::image::{check_tile_origin, tile_origins};

/// Read access to the image produced by one node.
pub struct ImageView<'a> {
    graph: &'a Graph,
    base: Context,
    data_window: PlugKey,
    display_window: PlugKey,
    channel_names: PlugKey,
    channel_data: PlugKey,
}

impl<'a> ImageView<'a> {
    pub fn new(graph: &'a Graph, node: NodeKey) -> Result<Self> {
        Self::with_context(graph, node, Context::new())
    }

    pub fn with_context(graph: &'a Graph, node: NodeKey, base: Context) -> Result<Self> {
        Ok(Self {
            graph,
            base,
            data_window: graph.plug(node, crate::image::OUT_DATA_WINDOW)?,
            display_window: graph.plug(node, crate::image::OUT_DISPLAY_WINDOW)?,
            channel_names: graph.plug(node, crate::image::OUT_CHANNEL_NAMES)?,
            channel_data: graph.plug(node, crate::image::OUT_CHANNEL_DATA)?,
        })
    }

    pub fn data_window(&self) -> Result<PixelWindow> {
        self.graph
            .get_value(self.data_window, &self.base)?
            .expect_window("dataWindow")
    }

    pub fn display_window(&self) -> Result<PixelWindow> {
        self.graph
            .get_value(self.display_window, &self.base)?
            .expect_window("displayWindow")
    }

    pub fn channel_names(&self) -> Result<Vec<String>> {
        Ok(self
            .graph
            .get_value(self.channel_names, &self.base)?
            .expect_string_list("channelNames")?
            .to_vec())
    }

    /// Samples of one tile, tileSize² long.
    ///
    /// `tile_origin` must be an exact multiple of the tile size; the check
    /// runs before any graph query, so a violating call leaves the cache
    /// and dirty state untouched.
    pub fn channel_data(&self, channel: &str, tile_origin: IVec2) -> Result<Arc<[f32]>> {
        check_tile_origin(tile_origin)?;
        let ctx = self
            .base
            .with(vars::CHANNEL_NAME, Value::string(channel))
            .with(vars::TILE_ORIGIN, Value::Coord(tile_origin));
        self.graph
            .get_value(self.channel_data, &ctx)?
            .expect_samples("channelData")
    }

    /// Writes every data-window tile of every channel through the codec.
    ///
    /// Reading the written file back via an [`ImageReader`] reproduces the
    /// sample values bit for bit.
    ///
    /// [`ImageReader`]: crate::image::reader::ImageReader
    pub fn write_image(&self, codec: &dyn Codec, file: &str) -> Result<()> {
        let metadata = ImageMetadata {
            data_window: self.data_window()?,
            display_window: self.display_window()?,
            channel_names: self.channel_names()?,
        };
        codec.write_metadata(file, &metadata)?;
        for channel in &metadata.channel_names {
            for origin in tile_origins(&metadata.data_window) {
                let samples = self.channel_data(channel, origin)?;
                codec.encode_tile(file, channel, origin, &samples)?;
            }
        }
        Ok(())
    }
}
