//! Crop: intersects the data window with a crop window.
//!
//! The display window passes through. Tiles that fall entirely outside
//! the cropped data window read as all-zero without pulling upstream
//! channel data; partially covered tiles are masked to zero outside the
//! cropped window.

use crate::errors::{Result, StrataError};
use crate::graph::context::{Context, vars};
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::image::window::PixelWindow;
use crate::image::{
    OUT_CHANNEL_DATA, OUT_CHANNEL_NAMES, OUT_DATA_WINDOW, OUT_DISPLAY_WINDOW, black_tile,
    image_in, image_out, mask_tile, tile_context, tile_window,
};

/// Restricts an image to a window.
pub struct Crop;

impl Crop {
    fn cropped_window(&self, ctx: &Context, up: &Upstream<'_>) -> Result<PixelWindow> {
        let upstream = up
            .pull("in.dataWindow", ctx)?
            .expect_window("in.dataWindow")?;
        let window = up.pull("window", ctx)?.expect_window("window")?;
        Ok(upstream.intersect(&window))
    }
}

impl Computable for Crop {
    fn type_name(&self) -> &'static str {
        "Crop"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![
            image_in("in"),
            PlugSpec::leaf_in("window", Value::Window(PixelWindow::EMPTY)),
            image_out(),
        ]
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input {
            "window" => vec![OUT_DATA_WINDOW, OUT_CHANNEL_DATA],
            "in.dataWindow" => vec![OUT_DATA_WINDOW, OUT_CHANNEL_DATA],
            "in.displayWindow" => vec![OUT_DISPLAY_WINDOW],
            "in.channelNames" => vec![OUT_CHANNEL_NAMES],
            "in.channelData" => vec![OUT_CHANNEL_DATA],
            _ => vec![],
        }
    }

    fn context_scope(&self, output: &str) -> ContextScope {
        if output == OUT_CHANNEL_DATA {
            ContextScope::Only(&[vars::CHANNEL_NAME, vars::TILE_ORIGIN])
        } else {
            ContextScope::Only(&[])
        }
    }

    fn compute(&self, output: &str, ctx: &Context, up: &Upstream<'_>) -> Result<Value> {
        match output {
            OUT_DATA_WINDOW => Ok(Value::Window(self.cropped_window(ctx, up)?)),
            OUT_DISPLAY_WINDOW => up.pull("in.displayWindow", ctx),
            OUT_CHANNEL_NAMES => up.pull("in.channelNames", ctx),
            OUT_CHANNEL_DATA => {
                let (_, origin) = tile_context(ctx)?;
                let cropped = self.cropped_window(ctx, up)?;
                if !tile_window(origin).intersects(&cropped) {
                    // Fully outside: never touch upstream channel data.
                    return Ok(Value::Samples(black_tile()));
                }
                let samples = up
                    .pull("in.channelData", ctx)?
                    .expect_samples("in.channelData")?;
                Ok(Value::Samples(mask_tile(&samples, origin, &cropped)))
            }
            other => Err(StrataError::PlugNotFound(other.to_owned())),
        }
    }
}
