//! Object sources: nodes that place a single object into the scene.
//!
//! An object source produces a two-level hierarchy: the root location
//! lists one child named by the `name` plug, and that child carries the
//! object, the `transform` plug's matrix, and a bound computed from the
//! source's parameters. The root bound encloses the child's bound
//! transformed into root space.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::errors::{Result, StrataError};
use crate::graph::context::{Context, vars};
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::scene::bound::Bound3;
use crate::scene::globals::RenderGlobals;
use crate::scene::object::SceneObject;
use crate::scene::{OUT_BOUND, OUT_CHILD_NAMES, OUT_GLOBALS, OUT_OBJECT, OUT_TRANSFORM};

/// Primitive variants an [`ObjectSource`] can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Plane,
    Sphere,
    PointLight,
}

impl SourceKind {
    fn default_name(self) -> &'static str {
        match self {
            SourceKind::Plane => "plane",
            SourceKind::Sphere => "sphere",
            SourceKind::PointLight => "light",
        }
    }

    fn serial_name(self) -> &'static str {
        match self {
            SourceKind::Plane => "plane",
            SourceKind::Sphere => "sphere",
            SourceKind::PointLight => "pointLight",
        }
    }
}

/// Places one primitive (plane, sphere or point light) at `/<name>`.
pub struct ObjectSource {
    kind: SourceKind,
}

impl ObjectSource {
    #[must_use]
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn plane() -> Self {
        Self::new(SourceKind::Plane)
    }

    #[must_use]
    pub fn sphere() -> Self {
        Self::new(SourceKind::Sphere)
    }

    #[must_use]
    pub fn point_light() -> Self {
        Self::new(SourceKind::PointLight)
    }

    pub(crate) fn from_state(state: &serde_json::Value) -> Result<Self> {
        match state["kind"].as_str() {
            Some("plane") => Ok(Self::plane()),
            Some("sphere") => Ok(Self::sphere()),
            Some("pointLight") => Ok(Self::point_light()),
            _ => Err(StrataError::Serialization(
                "objectSource state needs a 'kind'".to_owned(),
            )),
        }
    }

    fn build_object(&self, ctx: &Context, up: &Upstream<'_>) -> Result<SceneObject> {
        match self.kind {
            SourceKind::Plane => {
                let width = up.pull("width", ctx)?.expect_float("width")?;
                let height = up.pull("height", ctx)?.expect_float("height")?;
                let bound = Bound3::new(
                    Vec3::new(-width * 0.5, -height * 0.5, 0.0),
                    Vec3::new(width * 0.5, height * 0.5, 0.0),
                );
                Ok(SceneObject::new("mesh:plane", bound)
                    .with_param("width", Value::Float(width))
                    .with_param("height", Value::Float(height)))
            }
            SourceKind::Sphere => {
                let radius = up.pull("radius", ctx)?.expect_float("radius")?;
                let bound = Bound3::new(Vec3::splat(-radius), Vec3::splat(radius));
                Ok(SceneObject::new("mesh:sphere", bound)
                    .with_param("radius", Value::Float(radius)))
            }
            SourceKind::PointLight => {
                let intensity = up.pull("intensity", ctx)?.expect_float("intensity")?;
                let light_type = up.pull("type", ctx)?.expect_string("type")?;
                // A point light occupies a single point at its origin.
                let bound = Bound3::new(Vec3::ZERO, Vec3::ZERO);
                Ok(
                    SceneObject::new(&format!("light:{light_type}"), bound)
                        .with_param("intensity", Value::Float(intensity)),
                )
            }
        }
    }
}

impl Computable for ObjectSource {
    fn type_name(&self) -> &'static str {
        "ObjectSource"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        let mut specs = vec![
            PlugSpec::leaf_in("name", Value::string(self.kind.default_name())),
            PlugSpec::leaf_in("transform", Value::Matrix(Mat4::IDENTITY)),
        ];
        match self.kind {
            SourceKind::Plane => {
                specs.push(PlugSpec::leaf_in("width", Value::Float(1.0)));
                specs.push(PlugSpec::leaf_in("height", Value::Float(1.0)));
            }
            SourceKind::Sphere => {
                specs.push(PlugSpec::leaf_in("radius", Value::Float(1.0)));
            }
            SourceKind::PointLight => {
                specs.push(PlugSpec::leaf_in("intensity", Value::Float(1.0)));
                specs.push(PlugSpec::leaf_in("type", Value::string("point")));
            }
        }
        specs.push(crate::scene::scene_out());
        specs
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input {
            // The name moves the object's location, so every per-path
            // output changes.
            "name" => vec![OUT_CHILD_NAMES, OUT_OBJECT, OUT_TRANSFORM, OUT_BOUND],
            "transform" => vec![OUT_TRANSFORM, OUT_BOUND],
            "width" | "height" | "radius" | "intensity" | "type" => {
                vec![OUT_OBJECT, OUT_BOUND]
            }
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
            return Ok(Value::Globals(Arc::new(RenderGlobals::new())));
        }

        let path = ctx.scene_path()?;
        let name = up.pull("name", ctx)?.expect_string("name")?;
        let at_object = path.depth() == 1 && path.name() == Some(&*name);

        match output {
            OUT_CHILD_NAMES => {
                if path.is_root() {
                    Ok(Value::string_list([name.to_string()]))
                } else {
                    Ok(Value::StringList(Arc::from([])))
                }
            }
            OUT_OBJECT => {
                if at_object {
                    Ok(Value::Object(Some(Arc::new(self.build_object(ctx, up)?))))
                } else {
                    Ok(Value::Object(None))
                }
            }
            OUT_TRANSFORM => {
                if at_object {
                    up.pull("transform", ctx)
                } else {
                    Ok(Value::Matrix(Mat4::IDENTITY))
                }
            }
            OUT_BOUND => {
                if path.is_root() {
                    let object_bound = self.build_object(ctx, up)?.bound;
                    let transform = up.pull("transform", ctx)?.expect_matrix("transform")?;
                    Ok(Value::Bound(object_bound.transform(&transform)))
                } else if at_object {
                    Ok(Value::Bound(self.build_object(ctx, up)?.bound))
                } else {
                    Ok(Value::Bound(Bound3::EMPTY))
                }
            }
            other => Err(StrataError::PlugNotFound(other.to_owned())),
        }
    }

    fn state(&self) -> serde_json::Value {
        serde_json::json!({ "kind": self.kind.serial_name() })
    }
}
