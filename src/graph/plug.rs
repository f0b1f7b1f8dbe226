//! Plugs: typed slots on nodes.
//!
//! A plug is either a leaf carrying values of one [`ValueKind`], or a
//! compound grouping named child plugs (a scene output, for example, is a
//! compound with `object`, `transform`, `bound`, `childNames` and
//! `globals` children). Connections made at the compound level expand to
//! per-leaf connections at connection time.

use crate::graph::value::{Value, ValueKind};
use crate::graph::{NodeKey, PlugKey};

/// Whether a plug is an input (holds a local value when unconnected) or a
/// computed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugDirection {
    In,
    Out,
}

/// A typed slot on a node.
///
/// Invariants maintained by the graph:
/// - at most one input connection; `input` is the upstream source
/// - `outputs` lists every downstream plug connected to this one
/// - the connection graph stays acyclic
pub struct Plug {
    /// Dotted name within the owning node, e.g. `"out.object"`.
    pub name: String,
    pub node: NodeKey,
    pub direction: PlugDirection,
    /// Leaf kind; `None` for compound plugs.
    pub kind: Option<ValueKind>,
    pub(crate) input: Option<PlugKey>,
    pub(crate) outputs: Vec<PlugKey>,
    pub(crate) parent: Option<PlugKey>,
    pub(crate) children: Vec<PlugKey>,
    /// Local value; meaningful only on unconnected leaf inputs.
    pub(crate) local: Value,
}

impl Plug {
    #[inline]
    #[must_use]
    pub fn is_compound(&self) -> bool {
        self.kind.is_none()
    }

    /// The current input connection, if any.
    #[inline]
    #[must_use]
    pub fn input(&self) -> Option<PlugKey> {
        self.input
    }

    /// Downstream plugs driven by this one.
    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &[PlugKey] {
        &self.outputs
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[PlugKey] {
        &self.children
    }

    /// The last segment of the dotted name.
    #[must_use]
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Declaration of one plug, nested for compounds.
///
/// Node behaviors return these from [`Computable::plugs`]; the graph
/// instantiates them when the node is added.
///
/// [`Computable::plugs`]: crate::graph::node::Computable::plugs
#[derive(Debug, Clone)]
pub struct PlugSpec {
    pub name: &'static str,
    pub direction: PlugDirection,
    pub decl: PlugDecl,
}

#[derive(Debug, Clone)]
pub enum PlugDecl {
    Leaf { kind: ValueKind, default: Value },
    Compound(Vec<PlugSpec>),
}

impl PlugSpec {
    /// A leaf input with a default local value.
    #[must_use]
    pub fn leaf_in(name: &'static str, default: Value) -> Self {
        Self {
            name,
            direction: PlugDirection::In,
            decl: PlugDecl::Leaf {
                kind: default.kind(),
                default,
            },
        }
    }

    /// A computed leaf output.
    #[must_use]
    pub fn leaf_out(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            direction: PlugDirection::Out,
            decl: PlugDecl::Leaf {
                kind,
                default: Value::default_of(kind),
            },
        }
    }

    #[must_use]
    pub fn compound_in(name: &'static str, children: Vec<PlugSpec>) -> Self {
        Self {
            name,
            direction: PlugDirection::In,
            decl: PlugDecl::Compound(children),
        }
    }

    #[must_use]
    pub fn compound_out(name: &'static str, children: Vec<PlugSpec>) -> Self {
        Self {
            name,
            direction: PlugDirection::Out,
            decl: PlugDecl::Compound(children),
        }
    }
}
