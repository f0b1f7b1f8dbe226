//! The node/plug dependency graph and its evaluation algorithm.
//!
//! # Evaluation
//!
//! Computation is strictly demand-driven: nothing is computed until a
//! value is requested for a plug *and* a context. `get_value` follows
//! connections upstream, returns local values for unconnected inputs, and
//! memoizes computed outputs in the [`ValueCache`] keyed by
//! (plug, narrowed context hash).
//!
//! # Dirtying
//!
//! When a local value or a connection changes, the affected plug and every
//! transitively downstream plug (following connections and node-declared
//! `affects` relationships) are marked dirty in a single mark-once pass,
//! their cache entries are invalidated under the cache's write gate, and
//! one [`DirtyEvent`] is delivered to every subscriber.
//!
//! # Structure
//!
//! Nodes are owned arena-style: a parent node exclusively owns its
//! children, and removing a node recursively disconnects every plug
//! connection referencing the subtree before destruction. Connections that
//! would close a cycle are rejected at connection time, so the evaluator
//! never has to detect cycles at runtime.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use crate::errors::{Result, StrataError};
use crate::graph::cache::{CacheKey, ValueCache};
use crate::graph::context::Context;
use crate::graph::node::{Computable, ContextScope, Upstream};
use crate::graph::plug::{Plug, PlugDecl, PlugDirection, PlugSpec};
use crate::graph::value::Value;
use crate::graph::{NodeKey, PlugKey};
use crate::settings::CacheSettings;

/// One batch of plugs invalidated by a single dirty-propagation pass.
#[derive(Debug, Clone)]
pub struct DirtyEvent {
    pub plugs: Arc<[PlugKey]>,
}

/// A named unit of computation owning typed plugs, possibly containing
/// child nodes.
pub struct NodeEntry {
    pub name: String,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) top_plugs: Vec<PlugKey>,
    /// Dotted plug name -> key, for every nesting level.
    pub(crate) plug_index: FxHashMap<String, PlugKey>,
    pub(crate) behavior: Box<dyn Computable>,
}

impl NodeEntry {
    #[must_use]
    pub fn behavior(&self) -> &dyn Computable {
        self.behavior.as_ref()
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn plug_names(&self) -> impl Iterator<Item = &str> {
        self.plug_index.keys().map(String::as_str)
    }
}

/// The dependency graph: nodes, plugs, connections and the value cache.
pub struct Graph {
    nodes: SlotMap<NodeKey, NodeEntry>,
    plugs: SlotMap<PlugKey, Plug>,
    /// Node insertion order, for deterministic iteration and persistence.
    order: Vec<NodeKey>,
    roots: Vec<NodeKey>,
    cache: ValueCache,
    subscribers: Vec<flume::Sender<DirtyEvent>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(&CacheSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: &CacheSettings) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            plugs: SlotMap::with_key(),
            order: Vec::new(),
            roots: Vec::new(),
            cache: ValueCache::new(settings),
            subscribers: Vec::new(),
        }
    }

    // ========================================================================
    // Node lifecycle
    // ========================================================================

    /// Adds a root-level node with the given behavior.
    pub fn add_node(&mut self, name: &str, behavior: Box<dyn Computable>) -> NodeKey {
        let key = self.insert_node(name, behavior, None);
        self.roots.push(key);
        key
    }

    /// Adds a node owned by `parent`. The child is destroyed with its
    /// parent.
    pub fn add_child_node(
        &mut self,
        parent: NodeKey,
        name: &str,
        behavior: Box<dyn Computable>,
    ) -> NodeKey {
        let key = self.insert_node(name, behavior, Some(parent));
        self.nodes[parent].children.push(key);
        key
    }

    fn insert_node(
        &mut self,
        name: &str,
        behavior: Box<dyn Computable>,
        parent: Option<NodeKey>,
    ) -> NodeKey {
        let specs = behavior.plugs();
        let key = self.nodes.insert(NodeEntry {
            name: name.to_owned(),
            parent,
            children: Vec::new(),
            top_plugs: Vec::new(),
            plug_index: FxHashMap::default(),
            behavior,
        });
        for spec in specs {
            let plug = self.instantiate_plug(key, &spec, None, "", spec.direction);
            self.nodes[key].top_plugs.push(plug);
        }
        self.order.push(key);
        key
    }

    /// Children of a compound inherit the compound's direction.
    fn instantiate_plug(
        &mut self,
        node: NodeKey,
        spec: &PlugSpec,
        parent: Option<PlugKey>,
        prefix: &str,
        direction: PlugDirection,
    ) -> PlugKey {
        let name = if prefix.is_empty() {
            spec.name.to_owned()
        } else {
            format!("{prefix}.{}", spec.name)
        };
        let (kind, local, children_specs) = match &spec.decl {
            PlugDecl::Leaf { kind, default } => (Some(*kind), default.clone(), Vec::new()),
            PlugDecl::Compound(children) => (None, Value::Bool(false), children.clone()),
        };
        let key = self.plugs.insert(Plug {
            name: name.clone(),
            node,
            direction,
            kind,
            input: None,
            outputs: Vec::new(),
            parent,
            children: Vec::new(),
            local,
        });
        for child_spec in &children_specs {
            let child = self.instantiate_plug(node, child_spec, Some(key), &name, direction);
            self.plugs[key].children.push(child);
        }
        self.nodes[node].plug_index.insert(name, key);
        key
    }

    /// Removes a node and every child node it owns, disconnecting all plug
    /// connections referencing the subtree first.
    pub fn remove_node(&mut self, node: NodeKey) {
        let mut dirtied = Vec::new();
        self.remove_node_inner(node, &mut dirtied);
        if !dirtied.is_empty() {
            self.propagate_dirty(dirtied);
        }
    }

    fn remove_node_inner(&mut self, node: NodeKey, dirtied: &mut Vec<PlugKey>) {
        let Some(entry) = self.nodes.get(node) else {
            return;
        };
        for child in entry.children.clone() {
            self.remove_node_inner(child, dirtied);
        }

        let entry = &self.nodes[node];
        let plug_keys: Vec<PlugKey> = entry.plug_index.values().copied().collect();
        let parent = entry.parent;

        for key in &plug_keys {
            let (input, outputs) = {
                let plug = &self.plugs[*key];
                (plug.input, plug.outputs.clone())
            };
            if let Some(src) = input
                && let Some(src_plug) = self.plugs.get_mut(src)
            {
                src_plug.outputs.retain(|o| o != key);
            }
            for downstream in outputs {
                if let Some(d) = self.plugs.get_mut(downstream) {
                    d.input = None;
                    dirtied.push(downstream);
                }
            }
        }
        self.cache.invalidate_plugs(plug_keys.iter());
        for key in plug_keys {
            self.plugs.remove(key);
        }

        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != node);
            }
        } else {
            self.roots.retain(|r| *r != node);
        }
        self.order.retain(|n| *n != node);
        self.nodes.remove(node);
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[must_use]
    pub fn node(&self, key: NodeKey) -> &NodeEntry {
        &self.nodes[key]
    }

    #[must_use]
    pub fn get_node(&self, key: NodeKey) -> Option<&NodeEntry> {
        self.nodes.get(key)
    }

    /// Root-level node lookup by name.
    #[must_use]
    pub fn node_named(&self, name: &str) -> Option<NodeKey> {
        self.roots
            .iter()
            .copied()
            .find(|k| self.nodes[*k].name == name)
    }

    /// Nodes in insertion order.
    pub fn nodes_in_order(&self) -> impl Iterator<Item = (NodeKey, &NodeEntry)> {
        self.order.iter().map(|k| (*k, &self.nodes[*k]))
    }

    /// Resolves a dotted plug name on a node.
    pub fn plug(&self, node: NodeKey, name: &str) -> Result<PlugKey> {
        let entry = self
            .nodes
            .get(node)
            .ok_or_else(|| StrataError::NodeNotFound("<removed node>".to_owned()))?;
        entry
            .plug_index
            .get(name)
            .copied()
            .ok_or_else(|| StrataError::PlugNotFound(format!("{}.{name}", entry.name)))
    }

    #[must_use]
    pub fn plug_info(&self, key: PlugKey) -> Option<&Plug> {
        self.plugs.get(key)
    }

    #[must_use]
    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Connects `source` into `dest` so that `dest`'s effective value is
    /// `source`'s value, propagated unchanged.
    ///
    /// Compound plugs connect child-wise by leaf name. Fails with
    /// [`StrataError::TypeMismatch`] for incompatible kinds and
    /// [`StrataError::CycleDetected`] if the connection would close a
    /// cycle; on failure the graph is unchanged.
    pub fn set_input(&mut self, dest: PlugKey, source: PlugKey) -> Result<()> {
        let mut pairs = Vec::new();
        self.collect_connection_pairs(dest, source, &mut pairs)?;

        // Validate every pair before mutating anything.
        for (d, s) in &pairs {
            if self.upstream_reaches(*s, *d) {
                return Err(StrataError::CycleDetected {
                    upstream: self.plug_display_name(*s),
                    dest: self.plug_display_name(*d),
                });
            }
        }

        let mut dirtied = Vec::with_capacity(pairs.len());
        for (d, s) in pairs {
            if let Some(old) = self.plugs[d].input {
                if old == s {
                    continue;
                }
                self.plugs[old].outputs.retain(|o| *o != d);
            }
            self.plugs[d].input = Some(s);
            self.plugs[s].outputs.push(d);
            dirtied.push(d);
        }
        if !dirtied.is_empty() {
            self.propagate_dirty(dirtied);
        }
        Ok(())
    }

    /// Removes `dest`'s input connection (recursively for compounds). The
    /// plug reverts to its local value.
    pub fn disconnect(&mut self, dest: PlugKey) {
        let mut dirtied = Vec::new();
        self.disconnect_inner(dest, &mut dirtied);
        if !dirtied.is_empty() {
            self.propagate_dirty(dirtied);
        }
    }

    fn disconnect_inner(&mut self, dest: PlugKey, dirtied: &mut Vec<PlugKey>) {
        let children = self.plugs[dest].children.clone();
        for child in children {
            self.disconnect_inner(child, dirtied);
        }
        if let Some(src) = self.plugs[dest].input.take() {
            self.plugs[src].outputs.retain(|o| *o != dest);
            dirtied.push(dest);
        }
    }

    fn collect_connection_pairs(
        &self,
        dest: PlugKey,
        source: PlugKey,
        pairs: &mut Vec<(PlugKey, PlugKey)>,
    ) -> Result<()> {
        let d = &self.plugs[dest];
        let s = &self.plugs[source];
        match (d.kind, s.kind) {
            (Some(dk), Some(sk)) => {
                if dk != sk {
                    return Err(StrataError::TypeMismatch {
                        context: self.plug_display_name(dest),
                        expected: dk,
                        found: sk,
                    });
                }
                pairs.push((dest, source));
                Ok(())
            }
            (None, None) => {
                for &dest_child in &d.children {
                    let leaf = self.plugs[dest_child].leaf_name().to_owned();
                    let source_child = s
                        .children
                        .iter()
                        .copied()
                        .find(|c| self.plugs[*c].leaf_name() == leaf)
                        .ok_or_else(|| {
                            StrataError::PlugNotFound(format!(
                                "{}.{leaf}",
                                self.plug_display_name(source)
                            ))
                        })?;
                    self.collect_connection_pairs(dest_child, source_child, pairs)?;
                }
                Ok(())
            }
            // Compound-to-leaf connections have no counterpart structure.
            _ => Err(StrataError::PlugNotFound(format!(
                "no plug on '{}' matching the shape of '{}'",
                self.plug_display_name(source),
                self.plug_display_name(dest)
            ))),
        }
    }

    /// True if `target` is reachable walking upstream from `from`,
    /// following input connections and (conservatively) every input plug
    /// of a computed output's node.
    fn upstream_reaches(&self, from: PlugKey, target: PlugKey) -> bool {
        let mut visited: FxHashSet<PlugKey> = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(key) = stack.pop() {
            if key == target {
                return true;
            }
            if !visited.insert(key) {
                continue;
            }
            let Some(plug) = self.plugs.get(key) else {
                continue;
            };
            if let Some(input) = plug.input {
                stack.push(input);
            }
            if plug.direction == PlugDirection::Out {
                let entry = &self.nodes[plug.node];
                stack.extend(
                    entry
                        .plug_index
                        .values()
                        .copied()
                        .filter(|k| self.plugs[*k].direction == PlugDirection::In),
                );
            }
        }
        false
    }

    fn plug_display_name(&self, key: PlugKey) -> String {
        match self.plugs.get(key) {
            Some(plug) => match self.nodes.get(plug.node) {
                Some(node) => format!("{}.{}", node.name, plug.name),
                None => plug.name.clone(),
            },
            None => "<removed plug>".to_owned(),
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Sets the local value of an unconnected leaf input plug.
    ///
    /// Fails with [`StrataError::PlugIsConnected`] while the plug has an
    /// input; local values are only meaningful on unconnected plugs.
    /// Setting the value the plug already holds is a no-op.
    pub fn set_value(&mut self, plug: PlugKey, value: Value) -> Result<()> {
        let p = self
            .plugs
            .get(plug)
            .ok_or_else(|| StrataError::PlugNotFound("<removed plug>".to_owned()))?;
        let Some(kind) = p.kind else {
            return Err(StrataError::PlugNotWritable(self.plug_display_name(plug)));
        };
        if p.direction != PlugDirection::In {
            return Err(StrataError::PlugNotWritable(self.plug_display_name(plug)));
        }
        if p.input.is_some() {
            return Err(StrataError::PlugIsConnected(self.plug_display_name(plug)));
        }
        if value.kind() != kind {
            return Err(StrataError::TypeMismatch {
                context: self.plug_display_name(plug),
                expected: kind,
                found: value.kind(),
            });
        }
        if self.plugs[plug].local == value {
            return Ok(());
        }
        self.plugs[plug].local = value;
        self.propagate_dirty([plug]);
        Ok(())
    }

    /// The effective value of `plug` under `ctx`.
    ///
    /// Connected plugs recurse into their source under the same context.
    /// Unconnected inputs yield their local value. Computed outputs go
    /// through the value cache, keyed by the context entries the node
    /// declared relevant to that output.
    pub fn get_value(&self, plug: PlugKey, ctx: &Context) -> Result<Value> {
        let p = self
            .plugs
            .get(plug)
            .ok_or_else(|| StrataError::PlugNotFound("<removed plug>".to_owned()))?;
        if p.is_compound() {
            return Err(StrataError::PlugNotFound(format!(
                "compound plug '{}' has no value of its own",
                self.plug_display_name(plug)
            )));
        }
        if let Some(source) = p.input {
            return self.get_value(source, ctx);
        }
        match p.direction {
            PlugDirection::In => Ok(p.local.clone()),
            PlugDirection::Out => {
                let entry = &self.nodes[p.node];
                let context_hash = match entry.behavior.context_scope(&p.name) {
                    ContextScope::All => ctx.hash(),
                    ContextScope::Only(names) => ctx.narrowed_hash(names),
                };
                let key = CacheKey { plug, context_hash };
                self.cache.get_or_compute(key, || {
                    ctx.check_cancelled()?;
                    let up = Upstream {
                        graph: self,
                        node: p.node,
                    };
                    entry.behavior.compute(&p.name, ctx, &up)
                })
            }
        }
    }

    // ========================================================================
    // Dirty propagation
    // ========================================================================

    /// Subscribes to dirty events. Each propagation pass delivers one
    /// event listing every plug it invalidated.
    pub fn subscribe(&mut self) -> flume::Receiver<DirtyEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Marks the origins and everything transitively downstream dirty.
    ///
    /// A single mark-once pass over a visited set: diamond dependency
    /// shapes terminate and produce no duplicate invalidations.
    fn propagate_dirty(&mut self, origins: impl IntoIterator<Item = PlugKey>) {
        let mut visited: FxHashSet<PlugKey> = FxHashSet::default();
        let mut queue: Vec<PlugKey> = origins.into_iter().collect();
        while let Some(key) = queue.pop() {
            if !visited.insert(key) {
                continue;
            }
            let Some(plug) = self.plugs.get(key) else {
                continue;
            };
            queue.extend(plug.outputs.iter().copied());
            if plug.direction == PlugDirection::In {
                let entry = &self.nodes[plug.node];
                for affected in entry.behavior.affects(&plug.name) {
                    if let Some(out_key) = entry.plug_index.get(affected) {
                        queue.push(*out_key);
                    }
                }
            }
        }

        self.cache.invalidate_plugs(visited.iter());
        log::trace!("dirty propagation visited {} plugs", visited.len());

        if !self.subscribers.is_empty() {
            let event = DirtyEvent {
                plugs: visited.into_iter().collect::<Vec<_>>().into(),
            };
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}
