//! Typed plug values.
//!
//! Every plug carries values of exactly one [`ValueKind`]; connections are
//! only permitted between plugs of the same kind. Dispatch over kinds is a
//! closed tagged union rather than trait objects, so values stay cheap to
//! clone (heavy payloads sit behind `Arc`) and content hashing stays
//! allocation-free.

use std::sync::Arc;

use glam::{IVec2, Mat4};
use serde_json::json;
use xxhash_rust::xxh3::Xxh3;

use crate::errors::{Result, StrataError};
use crate::image::window::PixelWindow;
use crate::scene::bound::Bound3;
use crate::scene::globals::RenderGlobals;
use crate::scene::object::SceneObject;

/// The kind of value a plug carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    StringList,
    Matrix,
    Bound,
    Window,
    Coord,
    Samples,
    Object,
    Globals,
}

/// A plug value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    String(Arc<str>),
    StringList(Arc<[String]>),
    Matrix(Mat4),
    Bound(Bound3),
    Window(PixelWindow),
    Coord(IVec2),
    Samples(Arc<[f32]>),
    Object(Option<Arc<SceneObject>>),
    Globals(Arc<RenderGlobals>),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::StringList(_) => ValueKind::StringList,
            Value::Matrix(_) => ValueKind::Matrix,
            Value::Bound(_) => ValueKind::Bound,
            Value::Window(_) => ValueKind::Window,
            Value::Coord(_) => ValueKind::Coord,
            Value::Samples(_) => ValueKind::Samples,
            Value::Object(_) => ValueKind::Object,
            Value::Globals(_) => ValueKind::Globals,
        }
    }

    /// The default value of a kind: zero, empty or identity.
    #[must_use]
    pub fn default_of(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::String => Value::string(""),
            ValueKind::StringList => Value::StringList(Arc::from([])),
            ValueKind::Matrix => Value::Matrix(Mat4::IDENTITY),
            ValueKind::Bound => Value::Bound(Bound3::EMPTY),
            ValueKind::Window => Value::Window(PixelWindow::EMPTY),
            ValueKind::Coord => Value::Coord(IVec2::ZERO),
            ValueKind::Samples => Value::Samples(Arc::from([])),
            ValueKind::Object => Value::Object(None),
            ValueKind::Globals => Value::Globals(Arc::new(RenderGlobals::new())),
        }
    }

    #[must_use]
    pub fn string(s: &str) -> Value {
        Value::String(Arc::from(s))
    }

    #[must_use]
    pub fn string_list<I, S>(items: I) -> Value
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::StringList(items.into_iter().map(Into::into).collect())
    }

    // ── Typed accessors ──────────────────────────────────────────────────────

    pub fn expect_bool(&self, context: &str) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(context, ValueKind::Bool)),
        }
    }

    pub fn expect_int(&self, context: &str) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => Err(self.mismatch(context, ValueKind::Int)),
        }
    }

    pub fn expect_float(&self, context: &str) -> Result<f32> {
        match self {
            Value::Float(f) => Ok(*f),
            _ => Err(self.mismatch(context, ValueKind::Float)),
        }
    }

    pub fn expect_string(&self, context: &str) -> Result<Arc<str>> {
        match self {
            Value::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch(context, ValueKind::String)),
        }
    }

    pub fn expect_string_list(&self, context: &str) -> Result<Arc<[String]>> {
        match self {
            Value::StringList(l) => Ok(l.clone()),
            _ => Err(self.mismatch(context, ValueKind::StringList)),
        }
    }

    pub fn expect_matrix(&self, context: &str) -> Result<Mat4> {
        match self {
            Value::Matrix(m) => Ok(*m),
            _ => Err(self.mismatch(context, ValueKind::Matrix)),
        }
    }

    pub fn expect_bound(&self, context: &str) -> Result<Bound3> {
        match self {
            Value::Bound(b) => Ok(*b),
            _ => Err(self.mismatch(context, ValueKind::Bound)),
        }
    }

    pub fn expect_window(&self, context: &str) -> Result<PixelWindow> {
        match self {
            Value::Window(w) => Ok(*w),
            _ => Err(self.mismatch(context, ValueKind::Window)),
        }
    }

    pub fn expect_coord(&self, context: &str) -> Result<IVec2> {
        match self {
            Value::Coord(c) => Ok(*c),
            _ => Err(self.mismatch(context, ValueKind::Coord)),
        }
    }

    pub fn expect_samples(&self, context: &str) -> Result<Arc<[f32]>> {
        match self {
            Value::Samples(s) => Ok(s.clone()),
            _ => Err(self.mismatch(context, ValueKind::Samples)),
        }
    }

    pub fn expect_object(&self, context: &str) -> Result<Option<Arc<SceneObject>>> {
        match self {
            Value::Object(o) => Ok(o.clone()),
            _ => Err(self.mismatch(context, ValueKind::Object)),
        }
    }

    pub fn expect_globals(&self, context: &str) -> Result<Arc<RenderGlobals>> {
        match self {
            Value::Globals(g) => Ok(g.clone()),
            _ => Err(self.mismatch(context, ValueKind::Globals)),
        }
    }

    fn mismatch(&self, context: &str, expected: ValueKind) -> StrataError {
        StrataError::TypeMismatch {
            context: context.to_owned(),
            expected,
            found: self.kind(),
        }
    }

    // ── Hashing and accounting ───────────────────────────────────────────────

    /// Stable content hash. Floats hash by bit pattern, so two values hash
    /// equal iff they compare equal (NaN payloads included).
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.feed_hash(&mut hasher);
        hasher.digest()
    }

    pub(crate) fn feed_hash(&self, hasher: &mut Xxh3) {
        fn feed_f32(hasher: &mut Xxh3, f: f32) {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        fn feed_i32(hasher: &mut Xxh3, i: i32) {
            hasher.update(&i.to_le_bytes());
        }

        hasher.update(&[discriminant_tag(self)]);
        match self {
            Value::Bool(b) => hasher.update(&[u8::from(*b)]),
            Value::Int(i) => hasher.update(&i.to_le_bytes()),
            Value::Float(f) => feed_f32(hasher, *f),
            Value::String(s) => hasher.update(s.as_bytes()),
            Value::StringList(list) => {
                for s in list.iter() {
                    hasher.update(s.as_bytes());
                    hasher.update(&[0xff]);
                }
            }
            Value::Matrix(m) => {
                for f in m.to_cols_array() {
                    feed_f32(hasher, f);
                }
            }
            Value::Bound(b) => {
                for v in [b.min, b.max] {
                    feed_f32(hasher, v.x);
                    feed_f32(hasher, v.y);
                    feed_f32(hasher, v.z);
                }
            }
            Value::Window(w) => {
                feed_i32(hasher, w.min.x);
                feed_i32(hasher, w.min.y);
                feed_i32(hasher, w.max.x);
                feed_i32(hasher, w.max.y);
            }
            Value::Coord(c) => {
                feed_i32(hasher, c.x);
                feed_i32(hasher, c.y);
            }
            Value::Samples(samples) => {
                for s in samples.iter() {
                    feed_f32(hasher, *s);
                }
            }
            Value::Object(object) => {
                if let Some(object) = object {
                    object.feed_hash(hasher);
                }
            }
            Value::Globals(globals) => globals.feed_hash(hasher),
        }
    }

    /// Approximate heap footprint, used by the value cache for eviction
    /// accounting. Inline payloads count a fixed baseline.
    #[must_use]
    pub fn heap_cost(&self) -> usize {
        const BASE: usize = 64;
        BASE + match self {
            Value::String(s) => s.len(),
            Value::StringList(list) => list.iter().map(|s| s.len() + 24).sum(),
            Value::Samples(samples) => samples.len() * 4,
            Value::Object(Some(object)) => {
                object.type_name.len()
                    + object
                        .params
                        .iter()
                        .map(|(k, v)| k.len() + v.heap_cost())
                        .sum::<usize>()
            }
            Value::Globals(globals) => globals
                .outputs
                .iter()
                .map(|o| o.name.len() + o.driver.len() + o.data.len() + 48)
                .sum(),
            _ => 0,
        }
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// JSON representation for graph persistence.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => json!({ "bool": b }),
            Value::Int(i) => json!({ "int": i }),
            Value::Float(f) => json!({ "float": f }),
            Value::String(s) => json!({ "string": &**s }),
            Value::StringList(l) => json!({ "stringList": l.iter().collect::<Vec<_>>() }),
            Value::Matrix(m) => json!({ "matrix": m.to_cols_array().to_vec() }),
            Value::Bound(b) => json!({ "bound": {
                "min": [b.min.x, b.min.y, b.min.z],
                "max": [b.max.x, b.max.y, b.max.z],
            }}),
            Value::Window(w) => json!({ "window": {
                "min": [w.min.x, w.min.y],
                "max": [w.max.x, w.max.y],
            }}),
            Value::Coord(c) => json!({ "coord": [c.x, c.y] }),
            Value::Samples(s) => json!({ "samples": s.iter().collect::<Vec<_>>() }),
            Value::Object(o) => json!({ "object": o.as_ref().map(|o| object_to_json(o)) }),
            Value::Globals(g) => json!({ "globals": globals_to_json(g) }),
        }
    }

    /// Parses the representation produced by [`to_json`](Self::to_json).
    pub fn from_json(doc: &serde_json::Value) -> Result<Value> {
        let object = doc
            .as_object()
            .ok_or_else(|| StrataError::Serialization("value must be an object".into()))?;
        let (tag, body) = object
            .iter()
            .next()
            .ok_or_else(|| StrataError::Serialization("empty value object".into()))?;
        match tag.as_str() {
            "bool" => Ok(Value::Bool(as_bool(body)?)),
            "int" => Ok(Value::Int(as_i64(body)?)),
            "float" => Ok(Value::Float(as_f32(body)?)),
            "string" => Ok(Value::string(as_str(body)?)),
            "stringList" => {
                let items = as_array(body)?
                    .iter()
                    .map(|v| as_str(v).map(str::to_owned))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::StringList(items.into()))
            }
            "matrix" => {
                let cols = as_array(body)?
                    .iter()
                    .map(as_f32)
                    .collect::<Result<Vec<_>>>()?;
                let cols: [f32; 16] = cols
                    .try_into()
                    .map_err(|_| StrataError::Serialization("matrix needs 16 floats".into()))?;
                Ok(Value::Matrix(Mat4::from_cols_array(&cols)))
            }
            "bound" => {
                let min = as_vec3(&body["min"])?;
                let max = as_vec3(&body["max"])?;
                Ok(Value::Bound(Bound3::new(min, max)))
            }
            "window" => {
                let min = as_ivec2(&body["min"])?;
                let max = as_ivec2(&body["max"])?;
                Ok(Value::Window(PixelWindow::new(min, max)))
            }
            "coord" => Ok(Value::Coord(as_ivec2(body)?)),
            "samples" => {
                let samples = as_array(body)?
                    .iter()
                    .map(as_f32)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Samples(samples.into()))
            }
            "object" => {
                if body.is_null() {
                    Ok(Value::Object(None))
                } else {
                    Ok(Value::Object(Some(Arc::new(object_from_json(body)?))))
                }
            }
            "globals" => Ok(Value::Globals(Arc::new(globals_from_json(body)?))),
            other => Err(StrataError::Serialization(format!(
                "unknown value tag '{other}'"
            ))),
        }
    }
}

fn discriminant_tag(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Int(_) => 1,
        Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::StringList(_) => 4,
        Value::Matrix(_) => 5,
        Value::Bound(_) => 6,
        Value::Window(_) => 7,
        Value::Coord(_) => 8,
        Value::Samples(_) => 9,
        Value::Object(_) => 10,
        Value::Globals(_) => 11,
    }
}

fn object_to_json(object: &SceneObject) -> serde_json::Value {
    json!({
        "typeName": &*object.type_name,
        "bound": {
            "min": [object.bound.min.x, object.bound.min.y, object.bound.min.z],
            "max": [object.bound.max.x, object.bound.max.y, object.bound.max.z],
        },
        "params": object
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>(),
    })
}

fn object_from_json(doc: &serde_json::Value) -> Result<SceneObject> {
    let bound = Bound3::new(as_vec3(&doc["bound"]["min"])?, as_vec3(&doc["bound"]["max"])?);
    let mut object = SceneObject::new(as_str(&doc["typeName"])?, bound);
    if let Some(params) = doc["params"].as_object() {
        for (name, value) in params {
            object.params.insert(name.clone(), Value::from_json(value)?);
        }
    }
    Ok(object)
}

fn globals_to_json(globals: &RenderGlobals) -> serde_json::Value {
    json!({
        "outputs": globals.outputs.iter().map(|o| json!({
            "name": o.name,
            "driver": o.driver,
            "data": o.data,
            "params": o
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<serde_json::Map<_, _>>(),
        })).collect::<Vec<_>>(),
    })
}

fn globals_from_json(doc: &serde_json::Value) -> Result<RenderGlobals> {
    let mut globals = RenderGlobals::new();
    for entry in as_array(&doc["outputs"])? {
        let mut output = crate::scene::globals::RenderOutput::new(
            as_str(&entry["name"])?,
            as_str(&entry["driver"])?,
            as_str(&entry["data"])?,
        );
        if let Some(params) = entry["params"].as_object() {
            for (name, value) in params {
                output.params.insert(name.clone(), Value::from_json(value)?);
            }
        }
        globals.outputs.push(output);
    }
    Ok(globals)
}

// ── JSON field helpers ───────────────────────────────────────────────────────

fn as_bool(v: &serde_json::Value) -> Result<bool> {
    v.as_bool()
        .ok_or_else(|| StrataError::Serialization("expected bool".into()))
}

fn as_i64(v: &serde_json::Value) -> Result<i64> {
    v.as_i64()
        .ok_or_else(|| StrataError::Serialization("expected integer".into()))
}

fn as_f32(v: &serde_json::Value) -> Result<f32> {
    v.as_f64()
        .map(|f| f as f32)
        .ok_or_else(|| StrataError::Serialization("expected number".into()))
}

fn as_str(v: &serde_json::Value) -> Result<&str> {
    v.as_str()
        .ok_or_else(|| StrataError::Serialization("expected string".into()))
}

fn as_array(v: &serde_json::Value) -> Result<&Vec<serde_json::Value>> {
    v.as_array()
        .ok_or_else(|| StrataError::Serialization("expected array".into()))
}

fn as_vec3(v: &serde_json::Value) -> Result<glam::Vec3> {
    let items = as_array(v)?;
    if items.len() != 3 {
        return Err(StrataError::Serialization("expected 3 floats".into()));
    }
    Ok(glam::Vec3::new(
        as_f32(&items[0])?,
        as_f32(&items[1])?,
        as_f32(&items[2])?,
    ))
}

fn as_ivec2(v: &serde_json::Value) -> Result<IVec2> {
    let items = as_array(v)?;
    if items.len() != 2 {
        return Err(StrataError::Serialization("expected 2 integers".into()));
    }
    Ok(IVec2::new(as_i64(&items[0])? as i32, as_i64(&items[1])? as i32))
}
