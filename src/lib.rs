//! Strata — a lazy, cache-driven evaluation engine for hierarchical 3D
//! scenes and tiled raster images.
//!
//! Clients build a directed dependency graph of computation nodes and
//! query specific outputs (an image tile, a scene location's attributes,
//! the scene-wide globals). The engine computes exactly the minimal set of
//! upstream values needed, memoizing results keyed by content hash so
//! repeated or partially-overlapping queries are cheap. An interactive
//! render driver keeps an external renderer in sync by applying only the
//! edits implied by graph changes.

pub mod errors;
pub mod graph;
pub mod image;
pub mod persist;
pub mod render;
pub mod scene;
pub mod settings;

pub use errors::{Result, StrataError};
pub use graph::{
    Canceller, Computable, Context, ContextScope, DirtyEvent, Graph, NodeKey, PlugDirection,
    PlugKey, PlugSpec, Upstream, Value, ValueCache, ValueKind, vars,
};
pub use image::{
    Codec, Constant, Crop, ImageMetadata, ImageReader, ImageView, MemoryCodec, PixelWindow,
    TILE_PIXELS, TILE_SIZE,
};
pub use persist::{NodeRegistry, load_graph, save_graph};
pub use render::{RenderBackend, RenderDriver, RenderEdit, RenderState};
pub use scene::{
    Bound3, Group, Merge, ObjectSource, Outputs, RenderGlobals, RenderOutput, SceneObject,
    ScenePath, SceneView,
};
pub use settings::CacheSettings;
