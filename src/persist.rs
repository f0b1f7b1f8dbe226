//! Graph persistence.
//!
//! Saves a graph's topology and local values to a JSON document and loads
//! it back through a registry of node-type constructors. Node behaviors
//! contribute their own state via [`Computable::state`]; computed values
//! are never persisted — they are recomputed on demand after a load.
//!
//! [`Computable::state`]: crate::graph::node::Computable::state

use serde_json::json;

use rustc_hash::FxHashMap;

use crate::errors::{Result, StrataError};
use crate::graph::context::Context;
use crate::graph::graph::Graph;
use crate::graph::node::Computable;
use crate::graph::plug::PlugDirection;
use crate::graph::value::Value;
use crate::graph::NodeKey;

type NodeConstructor =
    Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn Computable>> + Send + Sync>;

/// Maps node type names to constructors.
pub struct NodeRegistry {
    constructors: FxHashMap<String, NodeConstructor>,
}

impl NodeRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: FxHashMap::default(),
        }
    }

    /// A registry knowing every built-in node type.
    ///
    /// `ImageReader` is not included: it needs a codec, so hosts register
    /// it themselves with the codec captured.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("ObjectSource", |state| {
            Ok(Box::new(crate::scene::ObjectSource::from_state(state)?))
        });
        registry.register("Group", |state| {
            Ok(Box::new(crate::scene::Group::from_state(state)?))
        });
        registry.register("Merge", |state| {
            Ok(Box::new(crate::scene::Merge::from_state(state)?))
        });
        registry.register("Outputs", |_| Ok(Box::new(crate::scene::Outputs)));
        registry.register("Constant", |_| Ok(Box::new(crate::image::Constant)));
        registry.register("Crop", |_| Ok(Box::new(crate::image::Crop)));
        registry
    }

    pub fn register(
        &mut self,
        type_name: &str,
        constructor: impl Fn(&serde_json::Value) -> Result<Box<dyn Computable>> + Send + Sync + 'static,
    ) {
        self.constructors
            .insert(type_name.to_owned(), Box::new(constructor));
    }

    fn construct(&self, type_name: &str, state: &serde_json::Value) -> Result<Box<dyn Computable>> {
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| StrataError::UnknownNodeType(type_name.to_owned()))?;
        constructor(state)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Serializes topology, per-node state and unconnected local values.
pub fn save_graph(graph: &Graph) -> serde_json::Value {
    let indices: FxHashMap<NodeKey, usize> = graph
        .nodes_in_order()
        .enumerate()
        .map(|(i, (key, _))| (key, i))
        .collect();

    let mut nodes = Vec::new();
    let mut connections = Vec::new();
    for (key, entry) in graph.nodes_in_order() {
        let mut plug_names: Vec<&str> = entry.plug_names().collect();
        plug_names.sort_unstable();

        let mut values = serde_json::Map::new();
        for name in &plug_names {
            let plug_key = match graph.plug(key, name) {
                Ok(k) => k,
                Err(_) => continue,
            };
            let Some(plug) = graph.plug_info(plug_key) else {
                continue;
            };
            if plug.direction == PlugDirection::In && !plug.is_compound() {
                if let Some(source) = plug.input() {
                    if let Some(source_plug) = graph.plug_info(source) {
                        connections.push(json!({
                            "fromNode": indices[&source_plug.node],
                            "fromPlug": source_plug.name,
                            "toNode": indices[&key],
                            "toPlug": plug.name,
                        }));
                    }
                } else if let Ok(local) = graph.get_value(plug_key, &Context::new()) {
                    values.insert((*name).to_owned(), local.to_json());
                }
            }
        }

        nodes.push(json!({
            "name": entry.name,
            "type": entry.behavior().type_name(),
            "parent": entry.parent().map(|p| indices[&p]),
            "state": entry.behavior().state(),
            "values": values,
        }));
    }

    json!({ "nodes": nodes, "connections": connections })
}

/// Rebuilds a graph from a document produced by [`save_graph`].
pub fn load_graph(doc: &serde_json::Value, registry: &NodeRegistry) -> Result<Graph> {
    let mut graph = Graph::new();
    let nodes = doc["nodes"]
        .as_array()
        .ok_or_else(|| StrataError::Serialization("document needs a 'nodes' array".into()))?;

    let mut keys: Vec<NodeKey> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let name = node["name"]
            .as_str()
            .ok_or_else(|| StrataError::Serialization("node needs a 'name'".into()))?;
        let type_name = node["type"]
            .as_str()
            .ok_or_else(|| StrataError::Serialization("node needs a 'type'".into()))?;
        let behavior = registry.construct(type_name, &node["state"])?;

        let key = match node["parent"].as_u64() {
            Some(parent) => {
                let parent_key = *keys.get(parent as usize).ok_or_else(|| {
                    StrataError::Serialization("parent precedes child in document order".into())
                })?;
                graph.add_child_node(parent_key, name, behavior)
            }
            None => graph.add_node(name, behavior),
        };
        keys.push(key);

        if let Some(values) = node["values"].as_object() {
            for (plug_name, value) in values {
                let plug = graph.plug(key, plug_name)?;
                graph.set_value(plug, Value::from_json(value)?)?;
            }
        }
    }

    if let Some(connections) = doc["connections"].as_array() {
        for connection in connections {
            let from_node = index_field(connection, "fromNode", keys.len())?;
            let to_node = index_field(connection, "toNode", keys.len())?;
            let from_plug = connection["fromPlug"]
                .as_str()
                .ok_or_else(|| StrataError::Serialization("connection needs 'fromPlug'".into()))?;
            let to_plug = connection["toPlug"]
                .as_str()
                .ok_or_else(|| StrataError::Serialization("connection needs 'toPlug'".into()))?;
            let source = graph.plug(keys[from_node], from_plug)?;
            let dest = graph.plug(keys[to_node], to_plug)?;
            graph.set_input(dest, source)?;
        }
    }

    Ok(graph)
}

fn index_field(doc: &serde_json::Value, field: &str, len: usize) -> Result<usize> {
    let index = doc[field]
        .as_u64()
        .ok_or_else(|| StrataError::Serialization(format!("connection needs '{field}'")))?
        as usize;
    if index >= len {
        return Err(StrataError::Serialization(format!(
            "'{field}' out of range"
        )));
    }
    Ok(index)
}
