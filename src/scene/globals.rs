use std::collections::BTreeMap;

use crate::graph::value::Value;

/// One render-output declaration in the scene globals, e.g. a beauty pass
/// written to `"beauty.exr"` with an `"exr"` driver and `"rgba"` data.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// Output name, typically the target file name.
    pub name: String,
    /// Driver identifier, e.g. `"exr"`.
    pub driver: String,
    /// Data specification, e.g. `"rgba"` or `"color aov_diffuse"`.
    pub data: String,
    /// Driver parameters, ordered by name.
    pub params: BTreeMap<String, Value>,
}

impl RenderOutput {
    #[must_use]
    pub fn new(name: &str, driver: &str, data: &str) -> Self {
        Self {
            name: name.to_owned(),
            driver: driver.to_owned(),
            data: data.to_owned(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_owned(), value);
        self
    }
}

/// Scene-wide declarations, accumulated additively along the node chain.
///
/// Declaration order is preserved: a node appending outputs never discards
/// or reorders declarations already present in its input's globals, unless
/// it replaces one of the same name (which keeps the original slot).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderGlobals {
    pub outputs: Vec<RenderOutput>,
}

impl RenderGlobals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an output, replacing any existing declaration of the same
    /// name in place.
    pub fn push_replace(&mut self, output: RenderOutput) {
        if let Some(existing) = self.outputs.iter_mut().find(|o| o.name == output.name) {
            *existing = output;
        } else {
            self.outputs.push(output);
        }
    }

    /// This globals record with every declaration of `other` appended
    /// additively (same-name declarations from `other` win).
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for output in &other.outputs {
            merged.push_replace(output.clone());
        }
        merged
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<&RenderOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub(crate) fn feed_hash(&self, hasher: &mut xxhash_rust::xxh3::Xxh3) {
        for output in &self.outputs {
            hasher.update(output.name.as_bytes());
            hasher.update(output.driver.as_bytes());
            hasher.update(output.data.as_bytes());
            for (name, value) in &output.params {
                hasher.update(name.as_bytes());
                value.feed_hash(hasher);
            }
        }
    }
}
