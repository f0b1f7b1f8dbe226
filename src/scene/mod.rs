//! Hierarchical scene data model.
//!
//! A scene is not stored anywhere — it is a contract over a node's `out`
//! compound plug, evaluated per scene-path context:
//! - object / transform / bound / childNames, per location
//! - globals, scene-wide
//!
//! Traversal into children is the caller's responsibility; the engine
//! never auto-recurses.

pub mod bound;
pub mod globals;
pub mod group;
pub mod merge;
pub mod object;
pub mod outputs;
pub mod path;
pub mod source;
pub mod view;

pub use bound::Bound3;
pub use globals::{RenderGlobals, RenderOutput};
pub use group::Group;
pub use merge::Merge;
pub use object::SceneObject;
pub use outputs::{Outputs, add_output};
pub use path::ScenePath;
pub use source::ObjectSource;
pub use view::SceneView;

use crate::errors::Result;
use crate::graph::context::Context;
use crate::graph::node::Upstream;
use crate::graph::plug::PlugSpec;
use crate::graph::value::ValueKind;

/// Dotted names of the five scene output plugs.
pub const OUT_OBJECT: &str = "out.object";
pub const OUT_TRANSFORM: &str = "out.transform";
pub const OUT_BOUND: &str = "out.bound";
pub const OUT_CHILD_NAMES: &str = "out.childNames";
pub const OUT_GLOBALS: &str = "out.globals";

/// Names usable for multi-input scene nodes. Bounds the input count.
pub(crate) static INPUT_NAMES: [&str; 8] =
    ["in0", "in1", "in2", "in3", "in4", "in5", "in6", "in7"];

/// The children of a scene compound plug.
///
/// Directions follow the enclosing compound: computed outputs on an `out`
/// plug, defaulted (empty-scene) locals on an unconnected input.
#[must_use]
pub fn scene_children() -> Vec<PlugSpec> {
    vec![
        PlugSpec::leaf_out("object", ValueKind::Object),
        PlugSpec::leaf_out("transform", ValueKind::Matrix),
        PlugSpec::leaf_out("bound", ValueKind::Bound),
        PlugSpec::leaf_out("childNames", ValueKind::StringList),
        PlugSpec::leaf_out("globals", ValueKind::Globals),
    ]
}

/// A scene-producing node's `out` compound.
#[must_use]
pub fn scene_out() -> PlugSpec {
    PlugSpec::compound_out("out", scene_children())
}

/// A scene-consuming compound input plug.
#[must_use]
pub fn scene_in(name: &'static str) -> PlugSpec {
    PlugSpec::compound_in(name, scene_children())
}

/// True if the scene on the named input lists `path` in its effective
/// hierarchy, i.e. every ancestor's childNames lists the next segment.
///
/// Each step is one cached childNames query, so repeated walks are cheap.
pub(crate) fn input_lists_path(
    up: &Upstream<'_>,
    input: &str,
    ctx: &Context,
    path: &ScenePath,
) -> Result<bool> {
    let mut prefix = ScenePath::root();
    for segment in path.segments() {
        let child_names = up
            .pull(&format!("{input}.childNames"), &ctx.with_path(&prefix))?
            .expect_string_list("childNames")?;
        if !child_names.iter().any(|n| n == segment) {
            return Ok(false);
        }
        prefix = prefix.child(segment);
    }
    Ok(true)
}
