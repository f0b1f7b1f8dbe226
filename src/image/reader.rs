//! ImageReader: exposes a persisted image through the tiled image model.
//!
//! Metadata outputs come straight from the codec; channel data decodes on
//! demand, one tile per query. Tiles fully outside the data window read
//! as all-zero without invoking the codec, so work stays proportional to
//! touched tiles rather than image area.

use std::sync::Arc;

use crate::errors::{Result, StrataError};
use crate::graph::context::{Context, vars};
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::image::codec::Codec;
use crate::image::{
    OUT_CHANNEL_DATA, OUT_CHANNEL_NAMES, OUT_DATA_WINDOW, OUT_DISPLAY_WINDOW, black_tile,
    image_out, tile_context, tile_window,
};

/// Reads one image file through a [`Codec`].
pub struct ImageReader {
    codec: Arc<dyn Codec>,
}

impl ImageReader {
    #[must_use]
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }
}

impl Computable for ImageReader {
    fn type_name(&self) -> &'static str {
        "ImageReader"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![PlugSpec::leaf_in("fileName", Value::string("")), image_out()]
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input {
            "fileName" => vec![
                OUT_DATA_WINDOW,
                OUT_DISPLAY_WINDOW,
                OUT_CHANNEL_NAMES,
                OUT_CHANNEL_DATA,
            ],
            _ => vec![],
        }
    }

    fn context_scope(&self, output: &str) -> ContextScope {
        if output == OUT_CHANNEL_DATA {
            ContextScope::Only(&[vars::CHANNEL_NAME, vars::TILE_ORIGIN])
        } else {
            // Metadata ignores the per-tile and per-channel variables.
            ContextScope::Only(&[])
        }
    }

    fn compute(&self, output: &str, ctx: &Context, up: &Upstream<'_>) -> Result<Value> {
        let file = up.pull("fileName", ctx)?.expect_string("fileName")?;
        match output {
            OUT_DATA_WINDOW => Ok(Value::Window(self.codec.image_metadata(&file)?.data_window)),
            OUT_DISPLAY_WINDOW => Ok(Value::Window(
                self.codec.image_metadata(&file)?.display_window,
            )),
            OUT_CHANNEL_NAMES => Ok(Value::string_list(
                self.codec.image_metadata(&file)?.channel_names,
            )),
            OUT_CHANNEL_DATA => {
                let (channel, origin) = tile_context(ctx)?;
                let metadata = self.codec.image_metadata(&file)?;
                if !tile_window(origin).intersects(&metadata.data_window) {
                    return Ok(Value::Samples(black_tile()));
                }
                Ok(Value::Samples(self.codec.decode_tile(
                    &file,
                    &channel,
                    origin,
                )?))
            }
            other => Err(StrataError::PlugNotFound(other.to_owned())),
        }
    }
}
