//! Dependency-graph evaluation engine.
//!
//! Nodes own typed plugs; plugs connect acyclically; values are computed
//! on demand and memoized per (plug, context) in a process-wide cache:
//! - Graph: structure, connections, dirty propagation
//! - Plug / PlugSpec: typed slots, compound nesting
//! - Computable: per-node-variant compute/affects behavior
//! - Context: immutable evaluation environment
//! - ValueCache: hash-keyed memoization with bounded memory

pub mod cache;
pub mod context;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod node;
pub mod plug;
pub mod value;

pub use cache::{CacheKey, ValueCache};
pub use context::{Canceller, Context, vars};
pub use graph::{DirtyEvent, Graph, NodeEntry};
pub use node::{Computable, ContextScope, Upstream};
pub use plug::{Plug, PlugDecl, PlugDirection, PlugSpec};
pub use value::{Value, ValueKind};

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a node in a [`Graph`].
    pub struct NodeKey;
    /// Handle to a plug in a [`Graph`].
    pub struct PlugKey;
}
