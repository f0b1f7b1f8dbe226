use std::collections::BTreeMap;
use std::sync::Arc;

use crate::graph::value::Value;
use crate::scene::bound::Bound3;

/// Geometric or light payload attached to one scene location.
///
/// The engine treats the payload as opaque apart from its type name, its
/// local-space bound and an ordered parameter dictionary. The render driver
/// classifies edits with exactly this information: a changed parameter is a
/// cheap live edit, a changed type name is a structural remove/recreate.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Kind tag, e.g. `"mesh:plane"` or `"light:point"`.
    pub type_name: Arc<str>,
    /// Local-space bound of the payload.
    pub bound: Bound3,
    /// Shader/light/geometry parameters, ordered by name.
    pub params: BTreeMap<String, Value>,
}

impl SceneObject {
    #[must_use]
    pub fn new(type_name: &str, bound: Bound3) -> Self {
        Self {
            type_name: Arc::from(type_name),
            bound,
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_owned(), value);
        self
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// True for light payloads (`"light:*"` type names).
    #[must_use]
    pub fn is_light(&self) -> bool {
        self.type_name.starts_with("light:")
    }

    pub(crate) fn feed_hash(&self, hasher: &mut xxhash_rust::xxh3::Xxh3) {
        hasher.update(self.type_name.as_bytes());
        hasher.update(&self.bound.min.x.to_bits().to_le_bytes());
        hasher.update(&self.bound.min.y.to_bits().to_le_bytes());
        hasher.update(&self.bound.min.z.to_bits().to_le_bytes());
        hasher.update(&self.bound.max.x.to_bits().to_le_bytes());
        hasher.update(&self.bound.max.y.to_bits().to_le_bytes());
        hasher.update(&self.bound.max.z.to_bits().to_le_bytes());
        for (name, value) in &self.params {
            hasher.update(name.as_bytes());
            value.feed_hash(hasher);
        }
    }
}
