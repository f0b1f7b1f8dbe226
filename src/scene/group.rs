//! Group: re-roots its inputs under one named location.
//!
//! `/` lists a single child (the `name` plug); that child's children are
//! the union of the inputs' root children, and everything below is
//! delegated to the owning input with the group segment stripped from the
//! scene path — the canonical context-remapping node.

use std::sync::Arc;

use glam::Mat4;

use crate::errors::{Result, StrataError};
use crate::graph::context::{Context, vars};
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::scene::bound::Bound3;
use crate::scene::globals::RenderGlobals;
use crate::scene::path::ScenePath;
use crate::scene::{
    INPUT_NAMES, OUT_BOUND, OUT_CHILD_NAMES, OUT_GLOBALS, OUT_OBJECT, OUT_TRANSFORM, scene_in,
};

/// Groups up to eight input scenes under `/<name>`.
pub struct Group {
    inputs: usize,
}

impl Group {
    /// A group with the given number of scene inputs (`in0`..).
    ///
    /// # Panics
    /// If `inputs` exceeds the supported maximum of 8.
    #[must_use]
    pub fn new(inputs: usize) -> Self {
        assert!(inputs <= INPUT_NAMES.len(), "at most 8 group inputs");
        Self { inputs }
    }

    pub(crate) fn from_state(state: &serde_json::Value) -> Result<Self> {
        let inputs = state["inputs"]
            .as_u64()
            .ok_or_else(|| StrataError::Serialization("group state needs 'inputs'".to_owned()))?;
        Ok(Self::new(inputs as usize))
    }

    fn input_names(&self) -> &'static [&'static str] {
        &INPUT_NAMES[..self.inputs]
    }

    /// The first input whose root lists `child`, by declaration order.
    fn owner_of(
        &self,
        up: &Upstream<'_>,
        ctx: &Context,
        child: &str,
    ) -> Result<Option<&'static str>> {
        let root_ctx = ctx.with_path(&ScenePath::root());
        for &input in self.input_names() {
            let names = up
                .pull(&format!("{input}.childNames"), &root_ctx)?
                .expect_string_list("childNames")?;
            if names.iter().any(|n| n == child) {
                return Ok(Some(input));
            }
        }
        Ok(None)
    }

    fn merged_root_child_names(&self, up: &Upstream<'_>, ctx: &Context) -> Result<Vec<String>> {
        let root_ctx = ctx.with_path(&ScenePath::root());
        let mut names: Vec<String> = Vec::new();
        for input in self.input_names() {
            let child_names = up
                .pull(&format!("{input}.childNames"), &root_ctx)?
                .expect_string_list("childNames")?;
            for name in child_names.iter() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    fn merged_root_bound(&self, up: &Upstream<'_>, ctx: &Context) -> Result<Bound3> {
        let root_ctx = ctx.with_path(&ScenePath::root());
        let mut bound = Bound3::EMPTY;
        for input in self.input_names() {
            let input_bound = up
                .pull(&format!("{input}.bound"), &root_ctx)?
                .expect_bound("bound")?;
            bound = bound.union(&input_bound);
        }
        Ok(bound)
    }
}

impl Computable for Group {
    fn type_name(&self) -> &'static str {
        "Group"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        let mut specs = vec![
            PlugSpec::leaf_in("name", Value::string("group")),
            PlugSpec::leaf_in("transform", Value::Matrix(Mat4::IDENTITY)),
        ];
        for &input in self.input_names() {
            specs.push(scene_in(input));
        }
        specs.push(crate::scene::scene_out());
        specs
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input {
            "name" => vec![OUT_CHILD_NAMES, OUT_OBJECT, OUT_TRANSFORM, OUT_BOUND],
            "transform" => vec![OUT_TRANSFORM, OUT_BOUND],
            _ => match input.rsplit('.').next() {
                Some("object") => vec![OUT_OBJECT],
                Some("transform") => vec![OUT_TRANSFORM, OUT_BOUND],
                Some("bound") => vec![OUT_BOUND],
                // Structure changes re-route delegation for every output.
                Some("childNames") => {
                    vec![OUT_CHILD_NAMES, OUT_OBJECT, OUT_TRANSFORM, OUT_BOUND]
                }
                Some("globals") => vec![OUT_GLOBALS],
                _ => vec![],
            },
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

        let path = ctx.scene_path()?;
        let name = up.pull("name", ctx)?.expect_string("name")?;

        if path.is_root() {
            return match output {
                OUT_CHILD_NAMES => Ok(Value::string_list([name.to_string()])),
                OUT_OBJECT => Ok(Value::Object(None)),
                OUT_TRANSFORM => Ok(Value::Matrix(Mat4::IDENTITY)),
                OUT_BOUND => {
                    let transform = up.pull("transform", ctx)?.expect_matrix("transform")?;
                    Ok(Value::Bound(
                        self.merged_root_bound(up, ctx)?.transform(&transform),
                    ))
                }
                other => Err(StrataError::PlugNotFound(other.to_owned())),
            };
        }

        if path.segments()[0] != *name {
            return Err(StrataError::PathNotFound(path.to_string()));
        }

        if path.depth() == 1 {
            return match output {
                OUT_CHILD_NAMES => Ok(Value::string_list(self.merged_root_child_names(up, ctx)?)),
                OUT_OBJECT => Ok(Value::Object(None)),
                OUT_TRANSFORM => up.pull("transform", ctx),
                OUT_BOUND => Ok(Value::Bound(self.merged_root_bound(up, ctx)?)),
                other => Err(StrataError::PlugNotFound(other.to_owned())),
            };
        }

        // Below the group location: delegate to the input owning the next
        // segment, with the group segment stripped from the path.
        let inner = path.strip_prefix(1);
        let Some(owner) = self.owner_of(up, ctx, &inner.segments()[0])? else {
            return Err(StrataError::PathNotFound(path.to_string()));
        };
        let leaf = output.rsplit('.').next().unwrap_or(output);
        up.pull(&format!("{owner}.{leaf}"), &ctx.with_path(&inner))
    }

    fn state(&self) -> serde_json::Value {
        serde_json::json!({ "inputs": self.inputs })
    }
}
