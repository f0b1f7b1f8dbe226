//! Graph Engine Integration Tests
//!
//! Tests for:
//! - Connections: value propagation, replacement, disconnection
//! - Structural errors: TypeMismatch, CycleDetected, PlugIsConnected
//! - Demand-driven evaluation and memoization (idempotence)
//! - Context narrowing in both directions
//! - Dirty propagation through diamonds, affects relationships
//! - Node removal, cancellation, error transparency
//! - Per-key compute serialization across threads

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use strata::graph::plug::PlugSpec;
use strata::{
    Canceller, Computable, Context, ContextScope, Graph, NodeKey, StrataError, Upstream, Value,
    ValueKind,
};

// ============================================================================
// Test node behaviors
// ============================================================================

/// Sums its two float inputs; counts compute invocations.
struct Add {
    computes: Arc<AtomicU64>,
}

impl Add {
    fn new() -> (Self, Arc<AtomicU64>) {
        let computes = Arc::new(AtomicU64::new(0));
        (
            Self {
                computes: computes.clone(),
            },
            computes,
        )
    }
}

impl Computable for Add {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![
            PlugSpec::leaf_in("a", Value::Float(0.0)),
            PlugSpec::leaf_in("b", Value::Float(0.0)),
            PlugSpec::leaf_out("sum", ValueKind::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        match input {
            "a" | "b" => vec!["sum"],
            _ => vec![],
        }
    }

    fn context_scope(&self, _output: &str) -> ContextScope {
        ContextScope::Only(&[])
    }

    fn compute(&self, _output: &str, ctx: &Context, up: &Upstream<'_>) -> strata::Result<Value> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        let a = up.pull("a", ctx)?.expect_float("a")?;
        let b = up.pull("b", ctx)?.expect_float("b")?;
        Ok(Value::Float(a + b))
    }
}

/// Scales its base input by the `frame` context variable.
struct FrameScaled {
    computes: Arc<AtomicU64>,
}

impl Computable for FrameScaled {
    fn type_name(&self) -> &'static str {
        "FrameScaled"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![
            PlugSpec::leaf_in("base", Value::Float(1.0)),
            PlugSpec::leaf_out("value", ValueKind::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        if input == "base" { vec!["value"] } else { vec![] }
    }

    fn context_scope(&self, _output: &str) -> ContextScope {
        ContextScope::Only(&["frame"])
    }

    fn compute(&self, _output: &str, ctx: &Context, up: &Upstream<'_>) -> strata::Result<Value> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        let base = up.pull("base", ctx)?.expect_float("base")?;
        let frame = match ctx.get("frame") {
            Some(value) => value.expect_int("frame")? as f32,
            None => 1.0,
        };
        Ok(Value::Float(base * frame))
    }
}

/// Fails on the first compute, succeeds afterwards.
struct FailOnce {
    failed: AtomicBool,
}

impl Computable for FailOnce {
    fn type_name(&self) -> &'static str {
        "FailOnce"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![PlugSpec::leaf_out("value", ValueKind::Float)]
    }

    fn affects(&self, _input: &str) -> Vec<&'static str> {
        vec![]
    }

    fn context_scope(&self, _output: &str) -> ContextScope {
        ContextScope::Only(&[])
    }

    fn compute(&self, _output: &str, _ctx: &Context, _up: &Upstream<'_>) -> strata::Result<Value> {
        if self.failed.swap(true, Ordering::SeqCst) {
            Ok(Value::Float(7.0))
        } else {
            Err(StrataError::SourceUnavailable("transient".to_owned()))
        }
    }
}

/// Passes its input through after a short delay, counting computes.
struct SlowIdentity {
    computes: Arc<AtomicU64>,
}

impl Computable for SlowIdentity {
    fn type_name(&self) -> &'static str {
        "SlowIdentity"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![
            PlugSpec::leaf_in("in", Value::Float(5.0)),
            PlugSpec::leaf_out("out", ValueKind::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<&'static str> {
        if input == "in" { vec!["out"] } else { vec![] }
    }

    fn context_scope(&self, _output: &str) -> ContextScope {
        ContextScope::Only(&[])
    }

    fn compute(&self, _output: &str, ctx: &Context, up: &Upstream<'_>) -> strata::Result<Value> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(30));
        up.pull("in", ctx)
    }
}

fn add_node(graph: &mut Graph, name: &str) -> (NodeKey, Arc<AtomicU64>) {
    let (behavior, computes) = Add::new();
    let key = graph.add_node(name, Box::new(behavior));
    (key, computes)
}

// ============================================================================
// Local values and connections
// ============================================================================

#[test]
fn local_value_roundtrip() {
    let mut graph = Graph::new();
    let (node, _) = add_node(&mut graph, "add");
    let a = graph.plug(node, "a").unwrap();

    graph.set_value(a, Value::Float(2.5)).unwrap();
    assert_eq!(
        graph.get_value(a, &Context::new()).unwrap(),
        Value::Float(2.5)
    );
}

#[test]
fn connection_propagates_source_value_unchanged() {
    let mut graph = Graph::new();
    let (up, _) = add_node(&mut graph, "up");
    let (down, _) = add_node(&mut graph, "down");

    let sum = graph.plug(up, "sum").unwrap();
    let a = graph.plug(down, "a").unwrap();
    graph.set_input(a, sum).unwrap();

    graph
        .set_value(graph.plug(up, "a").unwrap(), Value::Float(1.0))
        .unwrap();
    graph
        .set_value(graph.plug(up, "b").unwrap(), Value::Float(2.0))
        .unwrap();

    assert_eq!(
        graph.get_value(a, &Context::new()).unwrap(),
        Value::Float(3.0)
    );
}

#[test]
fn disconnect_reverts_to_local_value() {
    let mut graph = Graph::new();
    let (up, _) = add_node(&mut graph, "up");
    let (down, _) = add_node(&mut graph, "down");

    let a = graph.plug(down, "a").unwrap();
    graph.set_value(a, Value::Float(9.0)).unwrap();
    graph.set_input(a, graph.plug(up, "sum").unwrap()).unwrap();
    assert_eq!(
        graph.get_value(a, &Context::new()).unwrap(),
        Value::Float(0.0)
    );

    graph.disconnect(a);
    assert_eq!(
        graph.get_value(a, &Context::new()).unwrap(),
        Value::Float(9.0)
    );
}

// ============================================================================
// Structural errors (rejected synchronously, graph unchanged)
// ============================================================================

/// A node with a string output, for type-mismatch tests.
struct Name;

impl Computable for Name {
    fn type_name(&self) -> &'static str {
        "Name"
    }

    fn plugs(&self) -> Vec<PlugSpec> {
        vec![PlugSpec::leaf_out("text", ValueKind::String)]
    }

    fn affects(&self, _input: &str) -> Vec<&'static str> {
        vec![]
    }

    fn compute(&self, _output: &str, _ctx: &Context, _up: &Upstream<'_>) -> strata::Result<Value> {
        Ok(Value::string("name"))
    }
}

#[test]
fn incompatible_connection_is_rejected() {
    let mut graph = Graph::new();
    let name = graph.add_node("name", Box::new(Name));
    let (add, _) = add_node(&mut graph, "add");

    let a = graph.plug(add, "a").unwrap();
    graph.set_value(a, Value::Float(4.0)).unwrap();

    let err = graph.set_input(a, graph.plug(name, "text").unwrap());
    assert!(matches!(err, Err(StrataError::TypeMismatch { .. })));

    // The failed call left the graph untouched.
    assert_eq!(
        graph.get_value(a, &Context::new()).unwrap(),
        Value::Float(4.0)
    );
}

#[test]
fn cycle_is_rejected_at_connection_time() {
    let mut graph = Graph::new();
    let (first, _) = add_node(&mut graph, "first");
    let (second, _) = add_node(&mut graph, "second");

    graph
        .set_input(
            graph.plug(second, "a").unwrap(),
            graph.plug(first, "sum").unwrap(),
        )
        .unwrap();

    let err = graph.set_input(
        graph.plug(first, "b").unwrap(),
        graph.plug(second, "sum").unwrap(),
    );
    assert!(matches!(err, Err(StrataError::CycleDetected { .. })));

    // Evaluation still terminates.
    graph
        .get_value(graph.plug(second, "sum").unwrap(), &Context::new())
        .unwrap();
}

#[test]
fn self_cycle_is_rejected() {
    let mut graph = Graph::new();
    let (node, _) = add_node(&mut graph, "add");
    let err = graph.set_input(
        graph.plug(node, "a").unwrap(),
        graph.plug(node, "sum").unwrap(),
    );
    assert!(matches!(err, Err(StrataError::CycleDetected { .. })));
}

#[test]
fn set_value_on_connected_plug_is_rejected() {
    let mut graph = Graph::new();
    let (up, _) = add_node(&mut graph, "up");
    let (down, _) = add_node(&mut graph, "down");

    let a = graph.plug(down, "a").unwrap();
    graph.set_input(a, graph.plug(up, "sum").unwrap()).unwrap();

    let err = graph.set_value(a, Value::Float(1.0));
    assert!(matches!(err, Err(StrataError::PlugIsConnected(_))));
}

#[test]
fn set_value_of_wrong_kind_is_rejected() {
    let mut graph = Graph::new();
    let (node, _) = add_node(&mut graph, "add");
    let a = graph.plug(node, "a").unwrap();
    let err = graph.set_value(a, Value::string("nope"));
    assert!(matches!(err, Err(StrataError::TypeMismatch { .. })));
}

// ============================================================================
// Memoization and dirtying
// ============================================================================

#[test]
fn second_get_value_is_a_cache_hit() {
    let mut graph = Graph::new();
    let (node, computes) = add_node(&mut graph, "add");
    graph
        .set_value(graph.plug(node, "a").unwrap(), Value::Float(1.0))
        .unwrap();

    let sum = graph.plug(node, "sum").unwrap();
    let ctx = Context::new();
    let first = graph.get_value(sum, &ctx).unwrap();
    let second = graph.get_value(sum, &ctx).unwrap();

    assert_eq!(first, second);
    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert_eq!(graph.cache().hit_count(), 1);
}

#[test]
fn set_value_invalidates_downstream() {
    let mut graph = Graph::new();
    let (node, computes) = add_node(&mut graph, "add");
    let a = graph.plug(node, "a").unwrap();
    let sum = graph.plug(node, "sum").unwrap();
    let ctx = Context::new();

    graph.set_value(a, Value::Float(1.0)).unwrap();
    assert_eq!(graph.get_value(sum, &ctx).unwrap(), Value::Float(1.0));

    graph.set_value(a, Value::Float(2.0)).unwrap();
    assert_eq!(graph.get_value(sum, &ctx).unwrap(), Value::Float(2.0));
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}

#[test]
fn redundant_set_value_does_not_invalidate() {
    let mut graph = Graph::new();
    let (node, computes) = add_node(&mut graph, "add");
    let a = graph.plug(node, "a").unwrap();
    let sum = graph.plug(node, "sum").unwrap();
    let ctx = Context::new();

    graph.set_value(a, Value::Float(1.0)).unwrap();
    graph.get_value(sum, &ctx).unwrap();
    graph.set_value(a, Value::Float(1.0)).unwrap();
    graph.get_value(sum, &ctx).unwrap();
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

#[test]
fn diamond_dependencies_recompute_once_after_dirty() {
    // source feeds left and right, both feed final: a diamond.
    let mut graph = Graph::new();
    let (source, _) = add_node(&mut graph, "source");
    let (left, left_computes) = add_node(&mut graph, "left");
    let (right, right_computes) = add_node(&mut graph, "right");
    let (last, last_computes) = add_node(&mut graph, "final");

    let source_sum = graph.plug(source, "sum").unwrap();
    graph
        .set_input(graph.plug(left, "a").unwrap(), source_sum)
        .unwrap();
    graph
        .set_input(graph.plug(right, "a").unwrap(), source_sum)
        .unwrap();
    graph
        .set_input(
            graph.plug(last, "a").unwrap(),
            graph.plug(left, "sum").unwrap(),
        )
        .unwrap();
    graph
        .set_input(
            graph.plug(last, "b").unwrap(),
            graph.plug(right, "sum").unwrap(),
        )
        .unwrap();

    let ctx = Context::new();
    let final_sum = graph.plug(last, "sum").unwrap();

    graph
        .set_value(graph.plug(source, "a").unwrap(), Value::Float(1.0))
        .unwrap();
    assert_eq!(graph.get_value(final_sum, &ctx).unwrap(), Value::Float(2.0));

    graph
        .set_value(graph.plug(source, "a").unwrap(), Value::Float(3.0))
        .unwrap();
    assert_eq!(graph.get_value(final_sum, &ctx).unwrap(), Value::Float(6.0));

    // Each node computed exactly twice: once per evaluation pass, with no
    // duplicate invalidation from the diamond.
    assert_eq!(left_computes.load(Ordering::SeqCst), 2);
    assert_eq!(right_computes.load(Ordering::SeqCst), 2);
    assert_eq!(last_computes.load(Ordering::SeqCst), 2);
}

#[test]
fn dirty_events_reach_subscribers_once_per_pass() {
    let mut graph = Graph::new();
    let (node, _) = add_node(&mut graph, "add");
    let events = graph.subscribe();

    graph
        .set_value(graph.plug(node, "a").unwrap(), Value::Float(1.0))
        .unwrap();

    let event = events.try_recv().unwrap();
    // "a" and the affected "sum".
    assert_eq!(event.plugs.len(), 2);
    assert!(events.try_recv().is_err());
}

// ============================================================================
// Context narrowing
// ============================================================================

#[test]
fn irrelevant_context_entries_share_cache_entries() {
    let mut graph = Graph::new();
    let (node, computes) = add_node(&mut graph, "add");
    let sum = graph.plug(node, "sum").unwrap();

    let ctx_a = Context::new().with("scene:path", Value::string("/a"));
    let ctx_b = Context::new().with("scene:path", Value::string("/b"));

    graph.get_value(sum, &ctx_a).unwrap();
    graph.get_value(sum, &ctx_b).unwrap();

    // The node declared no relevant context entries, so both queries hit
    // one cache entry.
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

#[test]
fn relevant_context_entries_never_share_cache_entries() {
    let mut graph = Graph::new();
    let computes = Arc::new(AtomicU64::new(0));
    let node = graph.add_node(
        "scaled",
        Box::new(FrameScaled {
            computes: computes.clone(),
        }),
    );
    let value = graph.plug(node, "value").unwrap();
    graph
        .set_value(graph.plug(node, "base").unwrap(), Value::Float(2.0))
        .unwrap();

    let frame2 = Context::new().with("frame", Value::Int(2));
    let frame3 = Context::new().with("frame", Value::Int(3));

    assert_eq!(graph.get_value(value, &frame2).unwrap(), Value::Float(4.0));
    assert_eq!(graph.get_value(value, &frame3).unwrap(), Value::Float(6.0));
    assert_eq!(computes.load(Ordering::SeqCst), 2);

    // Differing only in an irrelevant entry shares the frame-2 entry.
    let frame2_other = frame2.with("scene:path", Value::string("/x"));
    assert_eq!(
        graph.get_value(value, &frame2_other).unwrap(),
        Value::Float(4.0)
    );
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Node removal
// ============================================================================

#[test]
fn removing_a_node_disconnects_downstream() {
    let mut graph = Graph::new();
    let (up, _) = add_node(&mut graph, "up");
    let (down, _) = add_node(&mut graph, "down");

    let a = graph.plug(down, "a").unwrap();
    graph.set_input(a, graph.plug(up, "sum").unwrap()).unwrap();

    graph.remove_node(up);

    // The downstream plug reverted to its (default) local value and the
    // graph still evaluates.
    assert!(graph.plug_info(a).unwrap().input().is_none());
    assert_eq!(
        graph.get_value(a, &Context::new()).unwrap(),
        Value::Float(0.0)
    );
}

#[test]
fn removing_a_parent_removes_owned_children() {
    let mut graph = Graph::new();
    let (parent, _) = add_node(&mut graph, "parent");
    let (child_behavior, _) = Add::new();
    let child = graph.add_child_node(parent, "child", Box::new(child_behavior));

    graph.remove_node(parent);
    assert!(graph.get_node(parent).is_none());
    assert!(graph.get_node(child).is_none());
}

// ============================================================================
// Errors and cancellation
// ============================================================================

#[test]
fn compute_errors_are_not_cached() {
    let mut graph = Graph::new();
    let node = graph.add_node(
        "flaky",
        Box::new(FailOnce {
            failed: AtomicBool::new(false),
        }),
    );
    let value = graph.plug(node, "value").unwrap();
    let ctx = Context::new();

    assert!(matches!(
        graph.get_value(value, &ctx),
        Err(StrataError::SourceUnavailable(_))
    ));
    // The transient failure did not poison the cache.
    assert_eq!(graph.get_value(value, &ctx).unwrap(), Value::Float(7.0));
}

#[test]
fn cancelled_compute_is_not_published() {
    let mut graph = Graph::new();
    let (node, computes) = add_node(&mut graph, "add");
    let sum = graph.plug(node, "sum").unwrap();

    let canceller = Canceller::new();
    canceller.cancel();
    let cancelled_ctx = Context::new().with_canceller(canceller);

    assert!(matches!(
        graph.get_value(sum, &cancelled_ctx),
        Err(StrataError::Cancelled)
    ));
    assert_eq!(computes.load(Ordering::SeqCst), 0);

    // Same cache key, fresh query: computes normally.
    assert_eq!(
        graph.get_value(sum, &Context::new()).unwrap(),
        Value::Float(0.0)
    );
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Concurrency: at most one compute per cache key
// ============================================================================

#[test]
fn concurrent_same_key_queries_compute_once() {
    let mut graph = Graph::new();
    let computes = Arc::new(AtomicU64::new(0));
    let node = graph.add_node(
        "slow",
        Box::new(SlowIdentity {
            computes: computes.clone(),
        }),
    );
    let out = graph.plug(node, "out").unwrap();

    let graph = &graph;
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(move || {
                let value = graph.get_value(out, &Context::new()).unwrap();
                assert_eq!(value, Value::Float(5.0));
            });
        }
    });

    // First caller computed; the rest blocked on the in-flight entry and
    // reused the result.
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}
