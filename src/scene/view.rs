//! Per-location scene queries.
//!
//! [`SceneView`] wraps one node's scene output and issues the standard
//! queries under a path-valued context. Accessors validate that the path
//! exists in the effective hierarchy (every ancestor's childNames lists
//! the next segment) and fail with `PathNotFound` otherwise.

use std::sync::Arc;

use glam::Mat4;

use crate::errors::{Result, StrataError};
use crate::graph::context::Context;
use crate::graph::graph::Graph;
use crate::graph::{NodeKey, PlugKey};
use crate::scene::bound::Bound3;
use crate::scene::globals::RenderGlobals;
use crate::scene::object::SceneObject;
use crate::scene::path::ScenePath;

/// Read access to the scene produced by one node.
pub struct SceneView<'a> {
    graph: &'a Graph,
    base: Context,
    object: PlugKey,
    transform: PlugKey,
    bound: PlugKey,
    child_names: PlugKey,
    globals: PlugKey,
}

impl<'a> SceneView<'a> {
    pub fn new(graph: &'a Graph, node: NodeKey) -> Result<Self> {
        Self::with_context(graph, node, Context::new())
    }

    /// A view evaluating under the given base context (frame, canceller).
    pub fn with_context(graph: &'a Graph, node: NodeKey, base: Context) -> Result<Self> {
        Ok(Self {
            graph,
            base,
            object: graph.plug(node, crate::scene::OUT_OBJECT)?,
            transform: graph.plug(node, crate::scene::OUT_TRANSFORM)?,
            bound: graph.plug(node, crate::scene::OUT_BOUND)?,
            child_names: graph.plug(node, crate::scene::OUT_CHILD_NAMES)?,
            globals: graph.plug(node, crate::scene::OUT_GLOBALS)?,
        })
    }

    fn path_ctx(&self, path: &ScenePath) -> Context {
        self.base.with_path(path)
    }

    /// childNames without the existence walk, for internal traversal.
    fn raw_child_names(&self, path: &ScenePath) -> Result<Arc<[String]>> {
        self.graph
            .get_value(self.child_names, &self.path_ctx(path))?
            .expect_string_list("childNames")
    }

    /// True if every ancestor lists the next segment of `path`.
    pub fn exists(&self, path: &ScenePath) -> Result<bool> {
        let mut prefix = ScenePath::root();
        for segment in path.segments() {
            match self.raw_child_names(&prefix) {
                Ok(names) => {
                    if !names.iter().any(|n| n == segment) {
                        return Ok(false);
                    }
                }
                Err(StrataError::PathNotFound(_)) => return Ok(false),
                Err(err) => return Err(err),
            }
            prefix = prefix.child(segment);
        }
        Ok(true)
    }

    fn ensure_exists(&self, path: &ScenePath) -> Result<()> {
        if self.exists(path)? {
            Ok(())
        } else {
            Err(StrataError::PathNotFound(path.to_string()))
        }
    }

    /// The object at `path`, or `None` for a pure hierarchy location.
    pub fn object(&self, path: &ScenePath) -> Result<Option<Arc<SceneObject>>> {
        self.ensure_exists(path)?;
        self.graph
            .get_value(self.object, &self.path_ctx(path))?
            .expect_object("object")
    }

    /// The local-to-parent transform at `path`.
    pub fn transform(&self, path: &ScenePath) -> Result<Mat4> {
        self.ensure_exists(path)?;
        self.graph
            .get_value(self.transform, &self.path_ctx(path))?
            .expect_matrix("transform")
    }

    /// The local-space bound at `path`. Encloses the location's object and
    /// every child's bound transformed by that child's transform.
    pub fn bound(&self, path: &ScenePath) -> Result<Bound3> {
        self.ensure_exists(path)?;
        self.graph
            .get_value(self.bound, &self.path_ctx(path))?
            .expect_bound("bound")
    }

    /// Child names at `path`, in declaration order.
    pub fn child_names(&self, path: &ScenePath) -> Result<Vec<String>> {
        self.ensure_exists(path)?;
        Ok(self.raw_child_names(path)?.to_vec())
    }

    /// Scene-wide globals (path-independent).
    pub fn globals(&self) -> Result<Arc<RenderGlobals>> {
        self.graph
            .get_value(self.globals, &self.base)?
            .expect_globals("globals")
    }

    /// Product of local transforms from the root down to `path`.
    pub fn world_transform(&self, path: &ScenePath) -> Result<Mat4> {
        self.ensure_exists(path)?;
        let mut world = Mat4::IDENTITY;
        let mut prefix = ScenePath::root();
        for segment in path.segments() {
            prefix = prefix.child(segment);
            let local = self
                .graph
                .get_value(self.transform, &self.path_ctx(&prefix))?
                .expect_matrix("transform")?;
            world *= local;
        }
        Ok(world)
    }
}
