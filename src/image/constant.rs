//! Constant: generates a solid-value synthetic image.

use crate::errors::{Result, StrataError};
use crate::graph::context::{Context, vars};
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::image::window::PixelWindow;
use crate::image::{
    OUT_CHANNEL_DATA, OUT_CHANNEL_NAMES, OUT_DATA_WINDOW, OUT_DISPLAY_WINDOW, TILE_PIXELS,
    TILE_SIZE, black_tile, image_out, mask_tile, tile_context, tile_window,
};

/// Fills a window with one sample value on every declared channel.
pub struct Constant;

impl Computable for Constant {
    fn type_name(&self) -> &'static str {
        "Constant"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![
            PlugSpec::leaf_in(
                "window",
                Value::Window(PixelWindow::from_size(glam::IVec2::ZERO, TILE_SIZE, TILE_SIZE)),
            ),
            PlugSpec::leaf_in("channels", Value::string_list(["R", "G", "B"])),
            PlugSpec::leaf_in("value", Value::Float(0.0)),
            image_out(),
        ]
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input {
            "window" => vec![OUT_DATA_WINDOW, OUT_DISPLAY_WINDOW, OUT_CHANNEL_DATA],
            "channels" => vec![OUT_CHANNEL_NAMES, OUT_CHANNEL_DATA],
            "value" => vec![OUT_CHANNEL_DATA],
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
            OUT_DATA_WINDOW | OUT_DISPLAY_WINDOW => up.pull("window", ctx),
            OUT_CHANNEL_NAMES => up.pull("channels", ctx),
            OUT_CHANNEL_DATA => {
                let (channel, origin) = tile_context(ctx)?;
                let channels = up.pull("channels", ctx)?.expect_string_list("channels")?;
                let window = up.pull("window", ctx)?.expect_window("window")?;
                if !channels.iter().any(|c| c.as_str() == &*channel)
                    || !tile_window(origin).intersects(&window)
                {
                    return Ok(Value::Samples(black_tile()));
                }
                let value = up.pull("value", ctx)?.expect_float("value")?;
                let filled: std::sync::Arc<[f32]> = vec![value; TILE_PIXELS].into();
                Ok(Value::Samples(mask_tile(&filled, origin, &window)))
            }
            other => Err(StrataError::PlugNotFound(other.to_owned())),
        }
    }
}
