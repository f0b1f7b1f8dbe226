//! Node behaviors.
//!
//! A node's semantics live in a [`Computable`]: it declares the node's
//! plugs, how inputs affect outputs for dirty propagation, which context
//! variables each output depends on, and how to compute an output value on
//! demand. Dispatch is a virtual call through the boxed behavior.

use crate::errors::Result;
use crate::graph::context::Context;
use crate::graph::graph::Graph;
use crate::graph::plug::PlugSpec;
use crate::graph::value::Value;
use crate::graph::NodeKey;

/// Which context variables an output plug's value depends on.
///
/// Declaring the scope too wide under-shares (cache entries that could be
/// reused are not); declaring it too narrow over-shares (stale results for
/// queries that should differ). Nodes must declare exactly the variables
/// their compute reads.
#[derive(Debug, Clone, Copy)]
pub enum ContextScope {
    /// Every context entry is relevant.
    All,
    /// Only the named entries are relevant. `Only(&[])` makes the output
    /// context-independent.
    Only(&'static [&'static str]),
}

/// The computation behavior of one node variant.
pub trait Computable: Send + Sync {
    /// Stable type name, used by persistence and diagnostics.
    fn type_name(&self) -> &'static str;

    /// Plug declarations, instantiated when the node is added to a graph.
    fn plugs(&self) -> Vec<PlugSpec>;

    /// Output plugs (dotted leaf names) whose values depend on the given
    /// input plug. Drives dirty propagation through the node.
    fn affects(&self, input: &str) -> Vec<&'static str>;

    /// Context variables relevant to the given output plug.
    fn context_scope(&self, _output: &str) -> ContextScope {
        ContextScope::All
    }

    /// Computes the value of `output` (a dotted leaf name) under `ctx`,
    /// pulling whatever inputs it needs through `up`.
    fn compute(&self, output: &str, ctx: &Context, up: &Upstream<'_>) -> Result<Value>;

    /// Node-local state for persistence. The default has none.
    fn state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Handle through which a compute pulls its own upstream values.
///
/// Pulls go through the graph's normal evaluation path, so upstream
/// results are memoized recursively.
pub struct Upstream<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) node: NodeKey,
}

impl Upstream<'_> {
    /// The effective value of the named plug on this node. If the plug is
    /// connected the pull recurses upstream under the same context;
    /// otherwise it yields the local value.
    pub fn pull(&self, plug: &str, ctx: &Context) -> Result<Value> {
        let key = self.graph.plug(self.node, plug)?;
        self.graph.get_value(key, ctx)
    }

    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.graph.node(self.node).name
    }
}
