//! Outputs: appends render-output declarations to the scene globals.
//!
//! The hierarchy passes through untouched. Declarations accumulate
//! additively along the chain: outputs already present in the input's
//! globals are kept, and a declaration of an existing name replaces it in
//! place.

use std::sync::Arc;

use crate::errors::{Result, StrataError};
use crate::graph::context::{Context, vars};
use crate::graph::graph::Graph;
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::graph::NodeKey;
use crate::scene::globals::RenderOutput;
use crate::scene::{
    OUT_BOUND, OUT_CHILD_NAMES, OUT_GLOBALS, OUT_OBJECT, OUT_TRANSFORM, scene_in,
};

/// Declares render outputs on top of an input scene.
///
/// The declarations live on the `outputs` plug, so they dirty and persist
/// like any other local value; use [`add_output`] to append one.
pub struct Outputs;

impl Computable for Outputs {
    fn type_name(&self) -> &'static str {
        "Outputs"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![
            scene_in("in"),
            PlugSpec::leaf_in("outputs", Value::default_of(crate::graph::ValueKind::Globals)),
            crate::scene::scene_out(),
        ]
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input {
            "in.object" => vec![OUT_OBJECT],
            "in.transform" => vec![OUT_TRANSFORM],
            "in.bound" => vec![OUT_BOUND],
            "in.childNames" => vec![OUT_CHILD_NAMES],
            "in.globals" | "outputs" => vec![OUT_GLOBALS],
            _ => vec![],
        }
    }

    fn context_scope(&self, output: &str) -> ContextScope {
        if output == OUT_GLOBALS {
            ContextScope::Only(&[])
        } else {
            ContextScope::Only(&[vars::SCENE_PATH])
        }
    }

    fn compute(&self, output: &str, ctx: &Context, up: &Upstream<'_>) -> Result<Value> {
        match output {
            OUT_OBJECT => up.pull("in.object", ctx),
            OUT_TRANSFORM => up.pull("in.transform", ctx),
            OUT_BOUND => up.pull("in.bound", ctx),
            OUT_CHILD_NAMES => up.pull("in.childNames", ctx),
            OUT_GLOBALS => {
                let upstream = up.pull("in.globals", ctx)?.expect_globals("globals")?;
                let own = up.pull("outputs", ctx)?.expect_globals("outputs")?;
                Ok(Value::Globals(Arc::new(upstream.merged_with(&own))))
            }
            other => Err(StrataError::PlugNotFound(other.to_owned())),
        }
    }
}

/// Appends a render-output declaration to an [`Outputs`] node, replacing
/// any existing declaration of the same name.
pub fn add_output(graph: &mut Graph, node: NodeKey, output: RenderOutput) -> Result<()> {
    let plug = graph.plug(node, "outputs")?;
    let mut globals = (*graph
        .get_value(plug, &Context::new())?
        .expect_globals("outputs")?)
    .clone();
    globals.push_replace(output);
    graph.set_value(plug, Value::Globals(Arc::new(globals)))
}
