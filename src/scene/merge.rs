//! Merge: structural combination of scenes.
//!
//! childNames at a location is the de-duplicated union of the inputs'
//! childNames, preserving first-seen order. Bounds union. Object and
//! transform come from the first input (by declaration order) that has
//! the location. Globals accumulate additively across inputs. A location
//! present in no input is `PathNotFound`.

use std::sync::Arc;

use crate::errors::{Result, StrataError};
use crate::graph::context::{Context, vars};
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::scene::bound::Bound3;
use crate::scene::globals::RenderGlobals;
use crate::scene::{
    INPUT_NAMES, OUT_BOUND, OUT_CHILD_NAMES, OUT_GLOBALS, OUT_OBJECT, OUT_TRANSFORM,
    input_lists_path, scene_in,
};

/// Merges up to eight input scenes into one hierarchy.
pub struct Merge {
    inputs: usize,
}

impl Merge {
    /// A merge over the given number of scene inputs (`in0`..).
    ///
    /// # Panics
    /// If `inputs` exceeds the supported maximum of 8.
    #[must_use]
    pub fn new(inputs: usize) -> Self {
        assert!(inputs <= INPUT_NAMES.len(), "at most 8 merge inputs");
        Self { inputs }
    }

    pub(crate) fn from_state(state: &serde_json::Value) -> Result<Self> {
        let inputs = state["inputs"]
            .as_u64()
            .ok_or_else(|| StrataError::Serialization("merge state needs 'inputs'".to_owned()))?;
        Ok(Self::new(inputs as usize))
    }

    fn input_names(&self) -> &'static [&'static str] {
        &INPUT_NAMES[..self.inputs]
    }

    /// Inputs that list the context's path, in declaration order.
    fn contributing_inputs(
        &self,
        up: &Upstream<'_>,
        ctx: &Context,
    ) -> Result<Vec<&'static str>> {
        let path = ctx.scene_path()?;
        let mut contributing = Vec::new();
        for input in self.input_names() {
            if input_lists_path(up, input, ctx, &path)? {
                contributing.push(*input);
            }
        }
        if contributing.is_empty() {
            return Err(StrataError::PathNotFound(path.to_string()));
        }
        Ok(contributing)
    }
}

impl Computable for Merge {
    fn type_name(&self) -> &'static str {
        "Merge"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        let mut specs: Vec<PlugSpec> = self.input_names().iter().map(|&n| scene_in(n)).collect();
        specs.push(crate::scene::scene_out());
        specs
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input.rsplit('.').next() {
            Some("object") => vec![OUT_OBJECT],
            Some("transform") => vec![OUT_TRANSFORM],
            Some("bound") => vec![OUT_BOUND],
            // Structure determines which inputs contribute to every output.
            Some("childNames") => vec![OUT_CHILD_NAMES, OUT_OBJECT, OUT_TRANSFORM, OUT_BOUND],
            Some("globals") => vec![OUT_GLOBALS],
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
        if output == OUT_GLOBALS {
            let mut globals = RenderGlobals::new();
            for input in self.input_names() {
                let input_globals = up
                    .pull(&format!("{input}.globals"), ctx)?
                    .expect_globals("globals")?;
                globals = globals.merged_with(&input_globals);
            }
            return Ok(Value::Globals(Arc::new(globals)));
        }

        let contributing = self.contributing_inputs(up, ctx)?;
        match output {
            OUT_CHILD_NAMES => {
                let mut names: Vec<String> = Vec::new();
                for input in &contributing {
                    let child_names = up
                        .pull(&format!("{input}.childNames"), ctx)?
                        .expect_string_list("childNames")?;
                    for name in child_names.iter() {
                        if !names.iter().any(|n| n == name) {
                            names.push(name.clone());
                        }
                    }
                }
                Ok(Value::string_list(names))
            }
            OUT_OBJECT => {
                for input in &contributing {
                    let object = up
                        .pull(&format!("{input}.object"), ctx)?
                        .expect_object("object")?;
                    if object.is_some() {
                        return Ok(Value::Object(object));
                    }
                }
                Ok(Value::Object(None))
            }
            OUT_TRANSFORM => {
                let first = contributing[0];
                let transform = up
                    .pull(&format!("{first}.transform"), ctx)?
                    .expect_matrix("transform")?;
                Ok(Value::Matrix(transform))
            }
            OUT_BOUND => {
                let mut bound = Bound3::EMPTY;
                for input in &contributing {
                    let input_bound = up
                        .pull(&format!("{input}.bound"), ctx)?
                        .expect_bound("bound")?;
                    bound = bound.union(&input_bound);
                }
                Ok(Value::Bound(bound))
            }
            other => Err(StrataError::PlugNotFound(other.to_owned())),
        }
    }

    fn state(&self) -> serde_json::Value {
        serde_json::json!({ "inputs": self.inputs })
    }
}
